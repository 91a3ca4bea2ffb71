// API module entry
// JSON endpoints used by the in-page editor

mod content;
mod image;
mod response;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};

use crate::config::AppState;
use crate::http::{build_options_response, BoxError};
use crate::logger;

/// Every path under this prefix is answered here
pub const API_PREFIX: &str = "/api/";

const CONTENT_PATH: &str = "/api/content";
const IMAGE_PATH: &str = "/api/image";

const CONTENT_ALLOW: &str = "GET, HEAD, POST, OPTIONS";
const IMAGE_ALLOW: &str = "POST, OPTIONS";

/// API route handler
///
/// Dispatches to handler functions based on request path and method
pub async fn handle_api<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let enable_cors = state.config.http.enable_cors;

    let resp = match (&method, path.as_str()) {
        (&Method::GET | &Method::HEAD, CONTENT_PATH) => content::handle_get(state).await,
        (&Method::POST, CONTENT_PATH) => content::handle_post(req, state).await,
        (&Method::OPTIONS, CONTENT_PATH) => build_options_response(CONTENT_ALLOW, enable_cors),
        (_, CONTENT_PATH) => response::method_not_allowed(CONTENT_ALLOW),

        (&Method::POST, IMAGE_PATH) => image::handle_upload(req, state).await,
        (&Method::OPTIONS, IMAGE_PATH) => build_options_response(IMAGE_ALLOW, enable_cors),
        (_, IMAGE_PATH) => response::method_not_allowed(IMAGE_ALLOW),

        _ => response::not_found(),
    };

    logger::log_debug(&format!("[API] {method} {path} - {}", resp.status().as_u16()));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_state;
    use http_body_util::BodyExt;
    use hyper::StatusCode;

    const BOUNDARY: &str = "XyZboundary42";

    fn request(method: Method, uri: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(body.into()))
            .unwrap()
    }

    fn multipart_request(uri: &str, field: &str, data: &[u8]) -> Request<Full<Bytes>> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"caption\"\r\n\r\n");
        body.extend_from_slice(b"ignored text\r\n");
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"pic.png\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Full::new(Bytes::from(body)))
            .unwrap()
    }

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_content_is_empty_object() {
        let (_dir, state) = test_state();
        let resp = handle_api(request(Method::GET, CONTENT_PATH, ""), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_post_then_get_content() {
        let (_dir, state) = test_state();
        let payload = r#"{"intro":"<p>Hi</p>"}"#;

        let resp = handle_api(request(Method::POST, CONTENT_PATH, payload), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"ok": true}));

        let resp = handle_api(request(Method::GET, CONTENT_PATH, ""), &state).await;
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"intro": "<p>Hi</p>"})
        );
    }

    #[tokio::test]
    async fn test_post_rejects_non_string_values() {
        let (_dir, state) = test_state();
        let resp = handle_api(request(Method::POST, CONTENT_PATH, r#"{"n":1}"#), &state).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_post_over_limit_is_413() {
        let (_dir, state) = test_state();
        let big = format!(r#"{{"k":"{}"}}"#, "x".repeat(2 * 1024 * 1024));
        let resp = handle_api(request(Method::POST, CONTENT_PATH, big), &state).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(state.content.get_content().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_if_match_is_conflict() {
        let (_dir, state) = test_state();
        let resp = handle_api(request(Method::GET, CONTENT_PATH, ""), &state).await;
        let loaded_tag = resp.headers()["etag"].to_str().unwrap().to_string();

        handle_api(request(Method::POST, CONTENT_PATH, r#"{"a":"1"}"#), &state).await;

        let mut stale = request(Method::POST, CONTENT_PATH, r#"{"a":"2"}"#);
        stale
            .headers_mut()
            .insert("if-match", loaded_tag.parse().unwrap());
        let resp = handle_api(stale, &state).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.content.get_content().await["a"], "1");
    }

    #[tokio::test]
    async fn test_upload_replaces_slot() {
        let (dir, state) = test_state();
        let dest = dir.path().join("content/pictures/homepage.png");

        let resp = handle_api(
            multipart_request("/api/image?name=homepage.png", "image", b"\x89PNG first"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"ok": true}));
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x89PNG first");

        let resp = handle_api(
            multipart_request("/api/image?name=homepage.png", "image", b"second"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_upload_with_unknown_name() {
        let (dir, state) = test_state();
        let resp = handle_api(
            multipart_request("/api/image?name=evil.png", "image", b"data"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"ok": false, "error": "Invalid image name"})
        );
        assert!(!dir.path().join("content/pictures/evil.png").exists());
        let spooled = std::fs::read_dir(dir.path().join("content/tmp")).unwrap().count();
        assert_eq!(spooled, 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (dir, state) = test_state();
        let dest = dir.path().join("content/pictures/healthpage.png");
        std::fs::write(&dest, b"keep me").unwrap();

        let resp = handle_api(
            multipart_request("/api/image?name=healthpage.png", "photo", b"data"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"ok": false, "error": "No file uploaded"})
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_upload_without_multipart_body() {
        let (_dir, state) = test_state();
        let resp = handle_api(
            request(Method::POST, "/api/image?name=homepage.png", "{}"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_content_write_failure_is_500() {
        let (dir, state) = test_state();
        let document = dir.path().join("content/text/content.json");
        std::fs::remove_file(&document).unwrap();
        std::fs::create_dir(&document).unwrap();
        std::fs::write(document.join("blocker"), b"x").unwrap();

        let resp = handle_api(request(Method::POST, CONTENT_PATH, r#"{"a":"1"}"#), &state).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, serde_json::json!({"ok": false}));

        let resp = handle_api(request(Method::GET, CONTENT_PATH, ""), &state).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_image_persist_failure_is_500() {
        let (dir, state) = test_state();
        let slot = dir.path().join("content/pictures/homepage.png");
        std::fs::create_dir(&slot).unwrap();
        std::fs::write(slot.join("blocker"), b"x").unwrap();

        let resp = handle_api(
            multipart_request("/api/image?name=homepage.png", "image", b"data"),
            &state,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, serde_json::json!({"ok": false}));
        assert!(slot.is_dir());
        let spooled = std::fs::read_dir(dir.path().join("content/tmp")).unwrap().count();
        assert_eq!(spooled, 0);
    }

    #[tokio::test]
    async fn test_unknown_routes_and_methods() {
        let (_dir, state) = test_state();
        let resp = handle_api(request(Method::GET, "/api/unknown", ""), &state).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = handle_api(request(Method::GET, IMAGE_PATH, ""), &state).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = handle_api(request(Method::DELETE, CONTENT_PATH, ""), &state).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
