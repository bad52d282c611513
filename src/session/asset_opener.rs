//! Asset opening gate for session construction.
//!
//! Before a reading session is handed out, the underlying publication asset
//! must still be locatable and of a media type the renderer can handle. This
//! stands in for the renderer's own opening step; no publication internals
//! are parsed.

use std::path::PathBuf;

use crate::catalog_store::BookRecord;
use crate::fetcher::RENDERABLE_MEDIA_TYPES;

use super::repository::OpenError;

/// Resolves a catalog record to a renderable asset path.
pub trait AssetOpener: Send + Sync {
    /// Returns the absolute path of the record's asset, or why it cannot be
    /// opened.
    fn open(&self, record: &BookRecord) -> Result<PathBuf, OpenError>;
}

/// Filesystem-backed opener rooted at the library directory.
pub struct FsAssetOpener {
    library_dir: PathBuf,
}

impl FsAssetOpener {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
        }
    }
}

impl AssetOpener for FsAssetOpener {
    fn open(&self, record: &BookRecord) -> Result<PathBuf, OpenError> {
        if !RENDERABLE_MEDIA_TYPES.contains(&record.media_type.as_str()) {
            return Err(OpenError::RenderIncompatible(record.media_type.clone()));
        }

        let path = self.library_dir.join(&record.href);
        let readable_file = std::fs::metadata(&path)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !readable_file {
            return Err(OpenError::AssetUnavailable(path.display().to_string()));
        }
        Ok(path)
    }
}
