//! HTTP cache validation module
//!
//! Entity tags and `Last-Modified` handling for conditional requests.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::SystemTime;

/// IMF-fixdate, the only date format servers may generate
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generate `ETag` using fast hashing
///
/// Returns a quoted tag, e.g. `"abc123def"`.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check a client `If-None-Match` / `If-Match` list against the server `ETag`
///
/// Supports a single tag, comma separated tags, weak tags (`W/"..."`) and `*`.
pub fn check_etag_match(header: Option<&str>, etag: &str) -> bool {
    header.is_some_and(|client_etag| {
        client_etag.split(',').map(str::trim).any(|e| {
            e == "*" || e.strip_prefix("W/").unwrap_or(e) == etag
        })
    })
}

/// Format a file timestamp for `Last-Modified`
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// True when `If-Modified-Since` is at or after `modified` (second precision)
pub fn not_modified_since(if_modified_since: Option<&str>, modified: SystemTime) -> bool {
    let Some(since) = if_modified_since
        .and_then(|v| NaiveDateTime::parse_from_str(v.trim(), HTTP_DATE_FORMAT).ok())
    else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.and_utc().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generate_etag() {
        let etag = generate_etag(b"hello world");
        assert!(etag.starts_with('"'));
        assert!(etag.ends_with('"'));
        assert_eq!(etag, generate_etag(b"hello world"));
        assert_ne!(etag, generate_etag(b"hello there"));
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_http_date_round_trip() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(784_111_777);
        let formatted = format_http_date(t);
        assert_eq!(formatted, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert!(not_modified_since(Some(&formatted), t));
        assert!(!not_modified_since(
            Some(&formatted),
            t + Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_malformed_if_modified_since() {
        assert!(!not_modified_since(Some("yesterday"), SystemTime::now()));
        assert!(!not_modified_since(None, SystemTime::now()));
    }
}
