// Application state module
// Immutable configuration plus the filesystem-backed stores

use super::types::Config;
use crate::store::{ContentStore, SlotManager, StorageLayout, StoreError};

/// Application state shared by every connection
///
/// Nothing here changes between requests; the filesystem is the only
/// source of truth for content and slot images.
pub struct AppState {
    pub config: Config,
    pub content: ContentStore,
    pub slots: SlotManager,
    pub layout: StorageLayout,
}

impl AppState {
    /// Create `AppState`, preparing the storage root on disk
    ///
    /// Creates `text/`, `pictures/` and `tmp/` under the content root and
    /// seeds an empty content document before any request is served.
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let layout = StorageLayout::new(config.storage_root(), &config.storage.public_dir);
        let content = ContentStore::open(&layout.text_dir)?;
        let slots = SlotManager::open(
            &layout.pictures_dir,
            &layout.tmp_dir,
            config.images.allowed.iter().cloned(),
        )?;

        Ok(Self {
            config: config.clone(),
            content,
            slots,
            layout,
        })
    }
}

/// State rooted in a fresh temporary directory
///
/// Content lives under `<tmp>/content`, the client bundle under `<tmp>/public`.
#[cfg(test)]
pub fn test_state() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::load_from("tests/no-such-config").unwrap();
    cfg.storage.root = Some(dir.path().join("content").to_string_lossy().into_owned());
    cfg.storage.public_dir = dir.path().join("public").to_string_lossy().into_owned();
    let state = AppState::new(&cfg).unwrap();
    (dir, state)
}
