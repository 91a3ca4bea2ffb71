//! Storage module
//!
//! Filesystem-backed persistence for the site:
//! - `content`: the single JSON document of editable text fragments
//! - `slots`: the fixed set of named image files
//!
//! Nothing is cached in memory; every read goes to disk.

pub mod content;
mod error;
pub mod slots;

pub use content::{content_tag, ContentMap, ContentStore};
pub use error::{SlotError, StoreError};
pub use slots::{SlotManager, UploadedFile};

use std::path::{Path, PathBuf};

/// Directory layout under the content root
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub root: PathBuf,
    /// Holds `content.json`
    pub text_dir: PathBuf,
    /// Holds one file per image slot
    pub pictures_dir: PathBuf,
    /// Spool for in-flight uploads, same volume as `pictures_dir`
    pub tmp_dir: PathBuf,
    /// Client bundle served at `/`
    pub public_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(root: PathBuf, public_dir: &str) -> Self {
        Self {
            text_dir: root.join("text"),
            pictures_dir: root.join("pictures"),
            tmp_dir: root.join("tmp"),
            public_dir: PathBuf::from(public_dir),
            root,
        }
    }
}

/// A name usable as a single path component inside a directory
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !Path::new(name).is_absolute()
}
