//! Fetcher module.
//!
//! Turns a source descriptor (local path or URL) into a validated asset
//! inside the library directory.

mod models;
mod retriever;

pub use models::{
    FetchError, LocalAsset, SourceDescriptor, MEDIA_TYPE_BINARY, MEDIA_TYPE_EPUB, MEDIA_TYPE_PDF,
    RENDERABLE_MEDIA_TYPES,
};
pub use retriever::{Fetcher, PublicationRetriever};
