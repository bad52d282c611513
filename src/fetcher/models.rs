//! Data models and errors for publication fetching.

use std::fmt;
use std::path::PathBuf;

use reqwest::Url;
use thiserror::Error;

/// Media type of an EPUB container.
pub const MEDIA_TYPE_EPUB: &str = "application/epub+zip";
/// Media type of a PDF document.
pub const MEDIA_TYPE_PDF: &str = "application/pdf";
/// Fallback when sniffing and extension mapping both fail.
pub const MEDIA_TYPE_BINARY: &str = "application/octet-stream";

/// Media types the renderer collaborator can handle.
pub const RENDERABLE_MEDIA_TYPES: &[&str] = &[MEDIA_TYPE_EPUB, MEDIA_TYPE_PDF];

/// Where a publication comes from.
#[derive(Debug, Clone)]
pub enum SourceDescriptor {
    /// A readable file on the local filesystem.
    Local(PathBuf),
    /// An absolute http(s) URL.
    Remote(Url),
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Local(path) => write!(f, "{}", path.display()),
            SourceDescriptor::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// A fetched publication placed inside the library directory.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    /// Absolute path of the asset inside the library directory.
    pub path: PathBuf,
    /// Detected media type (best-effort magic-byte sniff with extension
    /// fallback; [`MEDIA_TYPE_BINARY`] when neither matched).
    pub media_type: String,
}

/// Errors produced by fetcher implementations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    BadStatus(u16),
}
