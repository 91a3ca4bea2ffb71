//! Image slot manager
//!
//! A slot is a fixed file name under `pictures/`. Uploads are spooled into
//! `tmp/` first and renamed onto the slot path once the name is accepted.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::{is_plain_file_name, SlotError, StoreError};
use crate::logger;

pub struct SlotManager {
    allowed: BTreeSet<String>,
    pictures_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl SlotManager {
    /// Prepare the slot directories and take ownership of the allow-list
    ///
    /// Leftover spool files from a previous process are removed.
    pub fn open(
        pictures_dir: &Path,
        tmp_dir: &Path,
        allowed: impl IntoIterator<Item = String>,
    ) -> Result<Self, StoreError> {
        let allowed: BTreeSet<String> = allowed.into_iter().collect();
        if let Some(bad) = allowed.iter().find(|name| !is_plain_file_name(name)) {
            return Err(StoreError::InvalidSlotName(bad.clone()));
        }

        for dir in [pictures_dir, tmp_dir] {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        sweep_spool(tmp_dir);

        Ok(Self {
            allowed,
            pictures_dir: pictures_dir.to_path_buf(),
            tmp_dir: tmp_dir.to_path_buf(),
        })
    }

    pub const fn allowed_slots(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    pub fn pictures_dir(&self) -> &Path {
        &self.pictures_dir
    }

    /// Destination file of an allowed slot
    pub fn slot_path(&self, name: &str) -> Option<PathBuf> {
        self.is_allowed(name).then(|| self.pictures_dir.join(name))
    }

    /// Start spooling an upload into the temp directory
    pub async fn begin_upload(&self) -> Result<UploadWriter, StoreError> {
        let dir = self.tmp_dir.clone();
        let (temp, handle) = tokio::task::spawn_blocking(move || {
            let temp = tempfile::Builder::new()
                .prefix("upload-")
                .tempfile_in(&dir)?;
            let handle = temp.reopen()?;
            Ok::<_, io::Error>((temp, handle))
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r)
        .map_err(|e| StoreError::io(&self.tmp_dir, e))?;

        Ok(UploadWriter {
            temp,
            file: tokio::fs::File::from_std(handle),
            len: 0,
        })
    }

    /// Move an uploaded file onto the slot `name`
    ///
    /// The name is checked before the upload: a rejected name deletes the
    /// spooled file even when one was supplied. On success the previous slot
    /// file, if any, is fully replaced.
    pub async fn replace_slot(
        &self,
        name: Option<&str>,
        upload: Option<UploadedFile>,
    ) -> Result<PathBuf, SlotError> {
        let Some(dest) = name.and_then(|n| self.slot_path(n)) else {
            if let Some(upload) = upload {
                upload.discard();
            }
            return Err(SlotError::InvalidName);
        };
        let Some(upload) = upload else {
            return Err(SlotError::NoFile);
        };

        let target = dest.clone();
        tokio::task::spawn_blocking(move || {
            // A failed rename drops the temp file, which removes it
            upload.temp.persist(&target).map(|_| ()).map_err(|e| e.error)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r)
        .map_err(|e| StoreError::io(&dest, e))?;

        Ok(dest)
    }
}

/// Spool file receiving upload chunks
pub struct UploadWriter {
    temp: NamedTempFile,
    file: tokio::fs::File,
    len: u64,
}

impl UploadWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| StoreError::io(self.temp.path(), e))?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Flush pending writes and hand over the finished upload
    pub async fn finish(mut self) -> Result<UploadedFile, StoreError> {
        self.file
            .flush()
            .await
            .map_err(|e| StoreError::io(self.temp.path(), e))?;
        drop(self.file);
        Ok(UploadedFile {
            temp: self.temp,
            len: self.len,
        })
    }
}

/// A completely received upload, deleted on drop unless moved onto a slot
pub struct UploadedFile {
    temp: NamedTempFile,
    len: u64,
}

impl UploadedFile {
    /// Bytes received
    pub const fn size(&self) -> u64 {
        self.len
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Delete the spooled file now
    pub fn discard(self) {
        let path = self.temp.path().to_path_buf();
        if let Err(e) = self.temp.close() {
            logger::log_warning(&format!(
                "Failed to remove rejected upload '{}': {e}",
                path.display()
            ));
        }
    }
}

fn sweep_spool(tmp_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(tmp_dir) else {
        return;
    };
    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        logger::log_warning(&format!(
            "Removed {removed} orphaned upload(s) from {}",
            tmp_dir.display()
        ));
    }
}
