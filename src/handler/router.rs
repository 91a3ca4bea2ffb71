//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: API paths go to the JSON
//! handlers, everything else is a static file lookup.

use crate::api;
use crate::config::AppState;
use crate::handler::static_files;
use crate::http::{self, BoxError, STATIC_ALLOW};
use crate::logger;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, SERVER};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

/// URL prefix of the slot images
const IMAGES_PREFIX: &str = "/images/";

/// Tried in order when a directory is requested
const INDEX_FILES: &[&str] = &["index.html"];

/// Request context encapsulating information needed for static serving
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + Send + 'static,
{
    let mut response = if req.uri().path().starts_with(api::API_PREFIX) {
        api::handle_api(req, &state).await
    } else {
        serve_static(&req, &state).await
    };

    let headers = response.headers_mut();
    if let Ok(name) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, name);
    }
    if state.config.http.enable_cors {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
    Ok(response)
}

/// Serve the client bundle and the slot images
async fn serve_static<B>(req: &Request<B>, state: &AppState) -> Response<Full<Bytes>> {
    let method = req.method();
    match *method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => {
            return http::build_options_response(STATIC_ALLOW, state.config.http.enable_cors);
        }
        _ => {
            logger::log_warning(&format!("Method not allowed: {method} {}", req.uri().path()));
            return http::build_405_response(STATIC_ALLOW);
        }
    }

    let ctx = RequestContext {
        path: req.uri().path(),
        is_head: *method == Method::HEAD,
        if_none_match: header_string(req, "if-none-match"),
        if_modified_since: header_string(req, "if-modified-since"),
    };

    match ctx.path.strip_prefix(IMAGES_PREFIX) {
        Some(name) => {
            static_files::serve_directory(&ctx, state.slots.pictures_dir(), name, &[]).await
        }
        None => {
            static_files::serve_directory(&ctx, &state.layout.public_dir, ctx.path, INDEX_FILES)
                .await
        }
    }
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
