//! Content document store
//!
//! Persists the whole key -> text mapping as one pretty-printed JSON file.
//! Reads fail open to an empty mapping; writes replace the file wholesale
//! through a same-directory temp file and rename.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::StoreError;
use crate::http::cache;
use crate::logger;

/// Editable text fragments and URLs keyed by client-chosen identifiers
pub type ContentMap = BTreeMap<String, String>;

const CONTENT_FILE: &str = "content.json";

pub struct ContentStore {
    dir: PathBuf,
    path: PathBuf,
    /// Serializes saves issued by this process
    write_lock: Mutex<()>,
}

impl ContentStore {
    /// Open the store, seeding `{}` if the document does not exist yet
    pub fn open(text_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(text_dir).map_err(|e| StoreError::io(text_dir, e))?;

        let path = text_dir.join(CONTENT_FILE);
        if !path.exists() {
            let empty = serde_json::to_vec_pretty(&ContentMap::new())?;
            write_atomic(text_dir, &path, &empty)?;
            logger::log_info(&format!("[Store] Created empty content document {}", path.display()));
        }

        Ok(Self {
            dir: text_dir.to_path_buf(),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted mapping
    ///
    /// Any read or parse failure yields an empty mapping.
    pub async fn get_content(&self) -> ContentMap {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) => {
                logger::log_error(&format!(
                    "Error reading content file '{}': {e}",
                    self.path.display()
                ));
                return ContentMap::new();
            }
        };

        parse_document(&bytes).unwrap_or_else(|e| {
            logger::log_error(&format!(
                "Error parsing content file '{}': {e}",
                self.path.display()
            ));
            ContentMap::new()
        })
    }

    /// Replace the persisted mapping (last writer wins)
    pub async fn save_content(&self, payload: &ContentMap) -> Result<(), StoreError> {
        self.save_content_if(payload, None).await
    }

    /// Replace the persisted mapping unless it changed since `expected_tag`
    ///
    /// `expected_tag` uses `If-Match` syntax: one or more quoted tags or `*`.
    pub async fn save_content_if(
        &self,
        payload: &ContentMap,
        expected_tag: Option<&str>,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if expected_tag.is_some() {
            let current = content_tag(&self.get_content().await);
            if !cache::check_etag_match(expected_tag, &current) {
                return Err(StoreError::Conflict);
            }
        }

        let bytes = serde_json::to_vec_pretty(payload)?;
        let dir = self.dir.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| StoreError::io(&self.path, io::Error::other(e)))?
    }
}

/// Entity tag of a mapping, stable for equal mappings
pub fn content_tag(map: &ContentMap) -> String {
    // BTreeMap serializes in key order, so equal maps give equal bytes
    cache::generate_etag(&serde_json::to_vec(map).unwrap_or_default())
}

fn parse_document(bytes: &[u8]) -> Result<ContentMap, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ContentMap::new());
    }
    serde_json::from_slice(bytes)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
