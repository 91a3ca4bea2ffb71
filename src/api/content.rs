// Content document handlers
// GET returns the whole mapping, POST replaces it wholesale

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CACHE_CONTROL, ETAG, IF_MATCH};
use hyper::{Request, Response, StatusCode};

use super::response::{failure, json_response, ok, rejected};
use crate::config::AppState;
use crate::http::{declared_length, BoxError};
use crate::logger;
use crate::store::{content_tag, ContentMap, StoreError};

/// `GET /api/content`
pub async fn handle_get(state: &AppState) -> Response<Full<Bytes>> {
    let content = state.content.get_content().await;
    let mut resp = json_response(StatusCode::OK, &content);
    set_tag(&mut resp, &content);
    resp
}

/// `POST /api/content`
pub async fn handle_post<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit = state.config.http.max_json_body;
    if declared_length(req.headers()).is_some_and(|len| len > limit) {
        return rejected(StatusCode::PAYLOAD_TOO_LARGE, "Content too large");
    }

    let if_match = req
        .headers()
        .get(IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let body = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return rejected(StatusCode::PAYLOAD_TOO_LARGE, "Content too large");
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read content body: {e}"));
            return rejected(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let payload = match parse_payload(&body) {
        Ok(p) => p,
        Err(e) => {
            logger::log_debug(&format!("Rejected content payload: {e}"));
            return rejected(
                StatusCode::BAD_REQUEST,
                "Content must be a JSON object of strings",
            );
        }
    };

    let saved = match if_match.as_deref() {
        Some(tag) => state.content.save_content_if(&payload, Some(tag)).await,
        None => state.content.save_content(&payload).await,
    };
    match saved {
        Ok(()) => {
            let mut resp = ok();
            set_tag(&mut resp, &payload);
            resp
        }
        Err(StoreError::Conflict) => rejected(
            StatusCode::CONFLICT,
            "Content changed since it was loaded",
        ),
        Err(e) => {
            logger::log_error(&format!("Error writing content file: {e}"));
            failure(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// An empty body saves an empty mapping
fn parse_payload(body: &[u8]) -> Result<ContentMap, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ContentMap::new());
    }
    serde_json::from_slice(body)
}

fn set_tag(resp: &mut Response<Full<Bytes>>, content: &ContentMap) {
    if let Ok(tag) = HeaderValue::from_str(&content_tag(content)) {
        resp.headers_mut().insert(ETAG, tag);
    }
    resp.headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
}
