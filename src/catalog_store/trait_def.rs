//! The `CatalogStore` trait and its error type.
//!
//! The catalog is the single source of truth for imported publications.
//! Reads are safe to issue concurrently; writes to a given book's reading
//! state are serialized by whoever owns the book at the time (the open
//! `ReadingSession`, or the import pipeline while no session exists).

use thiserror::Error;

use super::models::{
    BookRecord, Bookmark, Highlight, HighlightStyle, Locator, NewBook, NewBookmark, NewHighlight,
};

/// Errors surfaced by catalog store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same source key already exists. Benign under
    /// concurrent imports; callers resolve it by re-looking-up the record.
    #[error("duplicate source key: {0}")]
    DuplicateSource(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored locator column failed to parse back.
    #[error("corrupt catalog row: {0}")]
    Corrupt(String),
}

/// Trait for catalog storage operations.
///
/// Methods are synchronous; implementations are expected to complete quickly
/// (single local SQLite statements) and are called directly from async code.
pub trait CatalogStore: Send + Sync {
    // === Books ===

    /// Insert a new catalog record. Returns the assigned surrogate id.
    ///
    /// Fails with [`StoreError::DuplicateSource`] if a record with the same
    /// source key already exists.
    fn insert_book(&self, book: &NewBook) -> Result<i64, StoreError>;

    /// Look up a record id by its source key.
    fn find_book_id_by_source_key(&self, source_key: &str) -> Result<Option<i64>, StoreError>;

    /// Get the most recently assigned book id, if any.
    fn latest_book_id(&self) -> Result<Option<i64>, StoreError>;

    /// Load a full catalog record.
    fn get_book(&self, id: i64) -> Result<Option<BookRecord>, StoreError>;

    /// Overwrite the saved reading position. `None` clears it.
    fn update_progression(&self, id: i64, locator: Option<&Locator>) -> Result<(), StoreError>;

    /// Overwrite the saved speech playback position. `None` clears it.
    fn update_speech_position(&self, id: i64, locator: Option<&Locator>) -> Result<(), StoreError>;

    /// Update the cover reference. `None` clears it.
    fn update_cover(&self, id: i64, cover_ref: Option<&str>) -> Result<(), StoreError>;

    /// Delete a record and its highlights/bookmarks. Returns true if a row
    /// was deleted.
    fn delete_book(&self, id: i64) -> Result<bool, StoreError>;

    // === Highlights ===

    /// Insert a highlight. Returns the assigned id.
    fn insert_highlight(&self, highlight: &NewHighlight) -> Result<i64, StoreError>;

    /// Update style and tint. Returns true if a row was updated.
    fn update_highlight_style(
        &self,
        id: i64,
        style: HighlightStyle,
        tint: u32,
    ) -> Result<bool, StoreError>;

    /// Update the annotation text. Returns true if a row was updated.
    fn update_highlight_annotation(
        &self,
        id: i64,
        annotation: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Delete a highlight. Returns true if a row was deleted.
    fn delete_highlight(&self, id: i64) -> Result<bool, StoreError>;

    /// Load a single highlight.
    fn get_highlight(&self, id: i64) -> Result<Option<Highlight>, StoreError>;

    /// List all highlights for a book, ordered by id.
    fn highlights_for_book(&self, book_id: i64) -> Result<Vec<Highlight>, StoreError>;

    // === Bookmarks ===

    /// Insert a bookmark. Returns the assigned id.
    fn insert_bookmark(&self, bookmark: &NewBookmark) -> Result<i64, StoreError>;

    /// Delete a bookmark. Returns true if a row was deleted.
    fn delete_bookmark(&self, id: i64) -> Result<bool, StoreError>;

    /// List all bookmarks for a book, ordered by creation time.
    fn bookmarks_for_book(&self, book_id: i64) -> Result<Vec<Bookmark>, StoreError>;
}
