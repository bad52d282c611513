//! Folio Reader Host Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod bookshelf;
pub mod catalog_store;
pub mod config;
pub mod fetcher;
pub mod host;
pub mod import;
pub mod session;

// Re-export commonly used types for convenience
pub use bookshelf::Bookshelf;
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use fetcher::{Fetcher, PublicationRetriever};
pub use host::{HostCommand, HostError, HostReply, ReaderHost};
pub use session::{FsAssetOpener, ReadingSession, SessionRepository};
