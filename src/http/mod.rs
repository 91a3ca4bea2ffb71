//! HTTP protocol layer module
//!
//! Protocol helpers shared by static file serving and the content API,
//! decoupled from storage.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_304_response, build_404_response, build_405_response, build_file_response,
    build_options_response, FileValidators, STATIC_ALLOW,
};

/// Boxed error accepted from request bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Declared `Content-Length` of a request, if present and numeric
pub fn declared_length(headers: &hyper::HeaderMap) -> Option<u64> {
    headers
        .get(hyper::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
