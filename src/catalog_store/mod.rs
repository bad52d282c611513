//! Catalog store module.
//!
//! The durable table of imported publications plus their reading state
//! (progression, highlights, bookmarks).

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{
    BookRecord, Bookmark, Highlight, HighlightStyle, Locator, NewBook, NewBookmark, NewHighlight,
};
pub use store::SqliteCatalogStore;
pub use trait_def::{CatalogStore, StoreError};
