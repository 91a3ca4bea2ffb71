// Image upload handler
// `POST /api/image?name=<slot>` with a multipart body whose file field is `image`

use futures::{future, TryStreamExt};
use http_body_util::{BodyStream, Full};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use multer::{Constraints, Multipart, SizeLimit};
use thiserror::Error;

use super::response::{failure, ok, rejected};
use crate::config::AppState;
use crate::http::{declared_length, BoxError};
use crate::logger;
use crate::store::{SlotManager, StoreError, UploadedFile};

/// Multipart field carrying the picture
const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Error)]
enum UploadFailure {
    #[error("upload exceeds the size limit")]
    TooLarge,
    #[error("malformed multipart body: {0}")]
    Malformed(multer::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<multer::Error> for UploadFailure {
    fn from(e: multer::Error) -> Self {
        match e {
            multer::Error::StreamSizeExceeded { .. } => Self::TooLarge,
            other => Self::Malformed(other),
        }
    }
}

/// `POST /api/image`
pub async fn handle_upload<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send + 'static,
{
    let name = slot_name_from_query(req.uri().query());
    let limit = state.config.http.max_upload_size;
    if declared_length(req.headers()).is_some_and(|len| len > limit) {
        return rejected(StatusCode::PAYLOAD_TOO_LARGE, "Upload too large");
    }

    // Anything but multipart carries no file
    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok());

    let upload = match boundary {
        Some(boundary) => {
            match receive_upload(req.into_body(), boundary, limit, &state.slots).await {
                Ok(upload) => upload,
                Err(UploadFailure::TooLarge) => {
                    return rejected(StatusCode::PAYLOAD_TOO_LARGE, "Upload too large");
                }
                Err(UploadFailure::Malformed(e)) => {
                    logger::log_warning(&format!("Rejected image upload: {e}"));
                    return rejected(StatusCode::BAD_REQUEST, "Malformed upload");
                }
                Err(UploadFailure::Store(e)) => {
                    logger::log_error(&format!("Error spooling image upload: {e}"));
                    return failure(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        }
        None => None,
    };

    let size = upload.as_ref().map_or(0, UploadedFile::size);
    match state.slots.replace_slot(name.as_deref(), upload).await {
        Ok(path) => {
            logger::log_info(&format!(
                "[Image] Replaced slot {} ({size} bytes)",
                path.display()
            ));
            ok()
        }
        Err(e) if e.is_validation() => rejected(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            logger::log_error(&format!("Error saving image: {e}"));
            failure(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Percent-decoded `name` query parameter
fn slot_name_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.into_owned())
}

/// Spool the first `image` field into the temp directory
///
/// Other fields are skipped. Returns `None` when no `image` field was sent.
async fn receive_upload<B>(
    body: B,
    boundary: String,
    limit: u64,
    slots: &SlotManager,
) -> Result<Option<UploadedFile>, UploadFailure>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send + 'static,
{
    let stream = BodyStream::new(body)
        .try_filter_map(|frame| future::ready(Ok::<_, B::Error>(frame.into_data().ok())));
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut upload = None;
    while let Some(mut field) = multipart.next_field().await? {
        if upload.is_some() || field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let mut writer = slots.begin_upload().await?;
        while let Some(chunk) = field.chunk().await? {
            writer.write_chunk(&chunk).await?;
        }
        upload = Some(writer.finish().await?);
    }
    Ok(upload)
}
