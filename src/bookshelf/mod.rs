//! Bookshelf module.
//!
//! Import entry points guarded by source-key deduplication.

#[allow(clippy::module_inception)]
mod bookshelf;

pub use bookshelf::{
    local_source_key, remote_source_key, Bookshelf, ImportEvents, InvalidSourceError,
};
