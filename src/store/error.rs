use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize content: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Content changed since it was loaded")]
    Conflict,
    #[error("Invalid image slot name '{0}'")]
    InvalidSlotName(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a rejected slot replacement
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("Invalid image name")]
    InvalidName,
    #[error("No file uploaded")]
    NoFile,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SlotError {
    /// Client mistakes as opposed to storage failures
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidName | Self::NoFile)
    }
}
