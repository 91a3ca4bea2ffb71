//! Static file serving module
//!
//! Serves the client bundle and the slot images straight from disk, with
//! `ETag` / `Last-Modified` revalidation.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, FileValidators};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::path::{Component, Path};
use std::time::SystemTime;
use tokio::fs;

/// A file read from one of the served directories
pub struct StaticFile {
    pub data: Bytes,
    pub content_type: &'static str,
    pub modified: Option<SystemTime>,
}

/// Serve `relative` from `dir`, falling back to index files for directories
pub async fn serve_directory(
    ctx: &RequestContext<'_>,
    dir: &Path,
    relative: &str,
    index_files: &[&str],
) -> Response<Full<Bytes>> {
    match load_from_directory(dir, relative, index_files).await {
        Some(file) => build_static_file_response(ctx, file),
        None => http::build_404_response(),
    }
}

/// Load a file below `dir`
///
/// Returns `None` for missing files, directories without an index file and
/// any path resolving outside `dir`.
pub async fn load_from_directory(
    dir: &Path,
    relative: &str,
    index_files: &[&str],
) -> Option<StaticFile> {
    let Some(relative) = decode_path(relative.trim_start_matches('/')) else {
        logger::log_warning(&format!("Rejected undecodable path: {relative}"));
        return None;
    };
    let relative = relative.as_str();
    if Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        logger::log_warning(&format!("Path traversal attempt blocked: {relative}"));
        return None;
    }

    let dir_canonical = match fs::canonicalize(dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                dir.display()
            ));
            return None;
        }
    };

    let mut file_path = dir.join(relative);
    if fs::metadata(&file_path).await.is_ok_and(|m| m.is_dir()) {
        let mut index = None;
        for name in index_files {
            let candidate = file_path.join(name);
            if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                index = Some(candidate);
                break;
            }
        }
        file_path = index?;
    }

    // Missing files are common (404), no need to log
    let file_canonical = fs::canonicalize(&file_path).await.ok()?;
    if !file_canonical.starts_with(&dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative} -> {}",
            file_canonical.display()
        ));
        return None;
    }

    let metadata = fs::metadata(&file_canonical).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    let data = match fs::read(&file_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_canonical.display()
            ));
            return None;
        }
    };

    Some(StaticFile {
        data: Bytes::from(data),
        content_type: mime::get_content_type(file_canonical.extension().and_then(|e| e.to_str())),
        modified: metadata.modified().ok(),
    })
}

/// Percent-decode each `/`-separated segment of a URL path
///
/// Segments that decode to a separator, a NUL byte or invalid UTF-8 are
/// refused.
fn decode_path(raw: &str) -> Option<String> {
    raw.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8().ok()?;
            (!decoded.contains(['/', '\\', '\0'])).then(|| decoded.into_owned())
        })
        .collect::<Option<Vec<_>>>()
        .map(|segments| segments.join("/"))
}

/// Build the 200 or 304 response for a loaded file
fn build_static_file_response(ctx: &RequestContext<'_>, file: StaticFile) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&file.data);
    let last_modified = file.modified.map(cache::format_http_date);
    let validators = FileValidators {
        etag: &etag,
        last_modified: last_modified.as_deref(),
    };

    // If-None-Match takes precedence over If-Modified-Since
    let unchanged = if ctx.if_none_match.is_some() {
        cache::check_etag_match(ctx.if_none_match.as_deref(), &etag)
    } else {
        file.modified
            .is_some_and(|m| cache::not_modified_since(ctx.if_modified_since.as_deref(), m))
    };
    if unchanged {
        return http::build_304_response(&validators);
    }

    http::build_file_response(file.data, file.content_type, &validators, ctx.is_head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(path: &str) -> RequestContext<'_> {
        RequestContext {
            path,
            is_head: false,
            if_none_match: None,
            if_modified_since: None,
        }
    }

    #[tokio::test]
    async fn test_directory_serves_index_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();

        let file = load_from_directory(dir.path(), "/", &["index.html"])
            .await
            .unwrap();
        assert_eq!(file.data, Bytes::from_static(b"<h1>home</h1>"));
        assert_eq!(file.content_type, "text/html; charset=utf-8");
        assert!(file.modified.is_some());

        assert!(load_from_directory(dir.path(), "", &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir(&public).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        assert!(load_from_directory(&public, "../secret.txt", &[]).await.is_none());
        assert!(load_from_directory(&public, "/etc/passwd", &[]).await.is_none());
        assert!(load_from_directory(&public, "missing.js", &[]).await.is_none());
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("crisis%20page.png").as_deref(), Some("crisis page.png"));
        assert_eq!(decode_path("css/site%2Bmain.css").as_deref(), Some("css/site+main.css"));
        assert_eq!(decode_path("a+b.png").as_deref(), Some("a+b.png"));
        assert_eq!(decode_path("..%2Fsecret.txt"), None);
        assert_eq!(decode_path("..%5Csecret.txt"), None);
        assert_eq!(decode_path("nul%00.png"), None);
        assert_eq!(decode_path("bad%FF.png"), None);
    }

    #[tokio::test]
    async fn test_encoded_names_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crisis page.png"), "png").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope").unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir(&public).unwrap();

        let file = load_from_directory(dir.path(), "crisis%20page.png", &[])
            .await
            .unwrap();
        assert_eq!(file.data, Bytes::from_static(b"png"));
        assert_eq!(file.content_type, "image/png");

        assert!(load_from_directory(&public, "%2E%2E/secret.txt", &[]).await.is_none());
        assert!(load_from_directory(&public, "..%2Fsecret.txt", &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_revalidation_returns_304() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let resp = serve_directory(&ctx("/app.js"), dir.path(), "app.js", &[]).await;
        assert_eq!(resp.status(), 200);
        let etag = resp.headers()["ETag"].to_str().unwrap().to_string();
        let modified = resp.headers()["Last-Modified"].to_str().unwrap().to_string();

        let mut cached = ctx("/app.js");
        cached.if_none_match = Some(etag);
        let resp = serve_directory(&cached, dir.path(), "app.js", &[]).await;
        assert_eq!(resp.status(), 304);

        let mut dated = ctx("/app.js");
        dated.if_modified_since = Some(modified);
        let resp = serve_directory(&dated, dir.path(), "app.js", &[]).await;
        assert_eq!(resp.status(), 304);

        let mut stale = ctx("/app.js");
        stale.if_none_match = Some("\"other\"".to_string());
        let resp = serve_directory(&stale, dir.path(), "app.js", &[]).await;
        assert_eq!(resp.status(), 200);
    }
}
