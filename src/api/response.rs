// API response utility functions module
// Every API answer carries an `ok` flag and, for client errors, a message

use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

#[derive(Serialize)]
struct Outcome<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Build JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from_static(br#"{"ok":false}"#)))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Error"))));
        }
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(Full::new(Bytes::from("Error")))
        })
}

/// 200 `{"ok":true}`
pub fn ok() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &Outcome { ok: true, error: None })
}

/// `{"ok":false}` for server-side failures
pub fn failure(status: StatusCode) -> Response<Full<Bytes>> {
    json_response(status, &Outcome { ok: false, error: None })
}

/// `{"ok":false,"error":...}` for requests the client must fix
pub fn rejected(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &Outcome {
            ok: false,
            error: Some(message),
        },
    )
}

/// 404 Not Found response
pub fn not_found() -> Response<Full<Bytes>> {
    rejected(StatusCode::NOT_FOUND, "Not Found")
}

/// 405 Method Not Allowed response
pub fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut resp = rejected(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    resp.headers_mut()
        .insert(hyper::header::ALLOW, hyper::header::HeaderValue::from_static(allow));
    resp
}
