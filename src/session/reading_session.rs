//! Per-book runtime reading state.
//!
//! A `ReadingSession` caches the current locator, highlights, and bookmarks
//! in memory and writes them back to the catalog store. Mutations are meant
//! to be issued by exactly one renderer at a time; the internal mutex makes
//! stray concurrent calls safe, not ordered.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::catalog_store::{
    Bookmark, CatalogStore, Highlight, HighlightStyle, Locator, NewBookmark, NewHighlight,
    StoreError,
};

struct SessionState {
    locator: Option<Locator>,
    progression_dirty: bool,
    last_progression_write: Option<Instant>,
    speech_position: Option<Locator>,
    speech_dirty: bool,
    highlights: Vec<Highlight>,
    bookmarks: Vec<Bookmark>,
}

/// Mutable runtime state for one open catalog entry.
pub struct ReadingSession {
    book_id: i64,
    asset_path: PathBuf,
    media_type: String,
    store: Arc<dyn CatalogStore>,
    /// Minimum spacing between progression writes; writes in between are
    /// coalesced (last-write-wins) and flushed on close.
    flush_interval: Duration,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for ReadingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingSession")
            .field("book_id", &self.book_id)
            .field("asset_path", &self.asset_path)
            .field("media_type", &self.media_type)
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}

impl ReadingSession {
    pub(crate) fn new(
        book_id: i64,
        asset_path: PathBuf,
        media_type: String,
        initial_locator: Option<Locator>,
        speech_position: Option<Locator>,
        highlights: Vec<Highlight>,
        bookmarks: Vec<Bookmark>,
        store: Arc<dyn CatalogStore>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            book_id,
            asset_path,
            media_type,
            store,
            flush_interval,
            state: Mutex::new(SessionState {
                locator: initial_locator,
                progression_dirty: false,
                last_progression_write: None,
                speech_position,
                speech_dirty: false,
                highlights,
                bookmarks,
            }),
        }
    }

    pub fn book_id(&self) -> i64 {
        self.book_id
    }

    /// Absolute path of the publication asset, for the renderer.
    pub fn asset_path(&self) -> &PathBuf {
        &self.asset_path
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// The last position set through [`ReadingSession::save_progression`],
    /// or the persisted position the session was opened with.
    pub fn current_locator(&self) -> Option<Locator> {
        self.state.lock().unwrap().locator.clone()
    }

    // === Progression ===

    /// Overwrite the current reading position.
    ///
    /// The in-memory position always updates; the store write is coalesced to
    /// at most one per flush interval. [`ReadingSession::flush`] (run by the
    /// repository on close) persists whatever is still pending.
    pub fn save_progression(&self, locator: Locator) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.locator = Some(locator);

        let due = match state.last_progression_write {
            None => true,
            Some(at) => at.elapsed() >= self.flush_interval,
        };
        if due {
            self.store
                .update_progression(self.book_id, state.locator.as_ref())?;
            state.last_progression_write = Some(Instant::now());
            state.progression_dirty = false;
        } else {
            state.progression_dirty = true;
        }
        Ok(())
    }

    // === Highlights ===

    /// Append a highlight and return its assigned id.
    pub fn add_highlight(
        &self,
        locator: Locator,
        style: HighlightStyle,
        tint: u32,
        annotation: Option<String>,
    ) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = self.store.insert_highlight(&NewHighlight {
            book_id: self.book_id,
            style,
            tint,
            locator: locator.clone(),
            annotation: annotation.clone(),
        })?;
        state.highlights.push(Highlight {
            id,
            book_id: self.book_id,
            style,
            tint,
            locator,
            annotation,
        });
        Ok(id)
    }

    /// Change a highlight's style and tint. Unknown ids are a no-op; the
    /// renderer UI races deletions against edits routinely.
    pub fn update_highlight_style(
        &self,
        id: i64,
        style: HighlightStyle,
        tint: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(highlight) = state.highlights.iter_mut().find(|h| h.id == id) else {
            debug!("Ignoring style update for unknown highlight {}", id);
            return Ok(());
        };
        highlight.style = style;
        highlight.tint = tint;
        self.store.update_highlight_style(id, style, tint)?;
        Ok(())
    }

    /// Change a highlight's annotation text. Unknown ids are a no-op.
    pub fn update_highlight_annotation(
        &self,
        id: i64,
        annotation: Option<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(highlight) = state.highlights.iter_mut().find(|h| h.id == id) else {
            debug!("Ignoring annotation update for unknown highlight {}", id);
            return Ok(());
        };
        highlight.annotation = annotation.clone();
        self.store
            .update_highlight_annotation(id, annotation.as_deref())?;
        Ok(())
    }

    /// Delete a highlight. Unknown ids are a no-op.
    pub fn delete_highlight(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.highlights.iter().position(|h| h.id == id) else {
            debug!("Ignoring delete for unknown highlight {}", id);
            return Ok(());
        };
        state.highlights.remove(index);
        self.store.delete_highlight(id)?;
        Ok(())
    }

    /// Snapshot of the highlight set, ordered by id.
    pub fn highlights(&self) -> Vec<Highlight> {
        self.state.lock().unwrap().highlights.clone()
    }

    // === Bookmarks ===

    /// Add a bookmark at the given location and return its assigned id.
    pub fn add_bookmark(&self, locator: Locator) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = self.store.insert_bookmark(&NewBookmark {
            book_id: self.book_id,
            locator: locator.clone(),
        })?;
        state.bookmarks.push(Bookmark {
            id,
            book_id: self.book_id,
            locator,
            created_at: chrono::Utc::now().timestamp_millis(),
        });
        Ok(id)
    }

    /// Delete a bookmark. Unknown ids are a no-op.
    pub fn delete_bookmark(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.bookmarks.iter().position(|b| b.id == id) else {
            debug!("Ignoring delete for unknown bookmark {}", id);
            return Ok(());
        };
        state.bookmarks.remove(index);
        self.store.delete_bookmark(id)?;
        Ok(())
    }

    /// Snapshot of the bookmark set, in creation order.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.state.lock().unwrap().bookmarks.clone()
    }

    // === Speech ===

    /// Record the speech engine's playback position; `None` clears active
    /// speech tracking. Persisted on close.
    pub fn set_speech_position(&self, locator: Option<Locator>) {
        let mut state = self.state.lock().unwrap();
        state.speech_position = locator;
        state.speech_dirty = true;
    }

    pub fn speech_position(&self) -> Option<Locator> {
        self.state.lock().unwrap().speech_position.clone()
    }

    // === Flush ===

    /// Write any coalesced mutations (progression, speech position) to the
    /// store. Called by the repository before eviction.
    pub(crate) fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.progression_dirty {
            self.store
                .update_progression(self.book_id, state.locator.as_ref())?;
            state.progression_dirty = false;
            state.last_progression_write = Some(Instant::now());
        }
        if state.speech_dirty {
            self.store
                .update_speech_position(self.book_id, state.speech_position.as_ref())?;
            state.speech_dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{NewBook, SqliteCatalogStore};
    use crate::fetcher::MEDIA_TYPE_EPUB;

    fn session_with_interval(
        flush_interval: Duration,
    ) -> (Arc<SqliteCatalogStore>, ReadingSession) {
        let store = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let book_id = store
            .insert_book(&NewBook {
                source_key: "local:/tmp/book.epub".to_string(),
                title: "book".to_string(),
                href: "book.epub".to_string(),
                media_type: MEDIA_TYPE_EPUB.to_string(),
                cover_ref: None,
            })
            .unwrap();
        let session = ReadingSession::new(
            book_id,
            PathBuf::from("/library/book.epub"),
            MEDIA_TYPE_EPUB.to_string(),
            None,
            None,
            Vec::new(),
            Vec::new(),
            store.clone(),
            flush_interval,
        );
        (store, session)
    }

    fn locator_at(progression: f64) -> Locator {
        Locator {
            href: "ch1.xhtml".to_string(),
            media_type: "application/xhtml+xml".to_string(),
            progression,
            position: None,
            total_progression: Some(progression),
            fragment: None,
        }
    }

    #[test]
    fn test_first_progression_write_is_immediate() {
        let (store, session) = session_with_interval(Duration::from_secs(3600));
        session.save_progression(locator_at(0.1)).unwrap();

        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.progression, Some(locator_at(0.1)));
    }

    #[test]
    fn test_progression_writes_are_coalesced_until_flush() {
        let (store, session) = session_with_interval(Duration::from_secs(3600));
        session.save_progression(locator_at(0.1)).unwrap();
        session.save_progression(locator_at(0.2)).unwrap();
        session.save_progression(locator_at(0.3)).unwrap();

        // Within the interval: the store still has the first write
        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.progression, Some(locator_at(0.1)));
        assert_eq!(session.current_locator(), Some(locator_at(0.3)));

        // Flush persists the last write
        session.flush().unwrap();
        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.progression, Some(locator_at(0.3)));
    }

    #[test]
    fn test_zero_interval_writes_every_time() {
        let (store, session) = session_with_interval(Duration::ZERO);
        session.save_progression(locator_at(0.1)).unwrap();
        session.save_progression(locator_at(0.2)).unwrap();

        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.progression, Some(locator_at(0.2)));
    }

    #[test]
    fn test_highlight_lifecycle() {
        let (store, session) = session_with_interval(Duration::ZERO);
        let id = session
            .add_highlight(locator_at(0.4), HighlightStyle::Highlight, 0xFFFF_FF00, None)
            .unwrap();

        session
            .update_highlight_style(id, HighlightStyle::Underline, 0xFF00_00FF)
            .unwrap();
        session
            .update_highlight_annotation(id, Some("note".to_string()))
            .unwrap();

        let highlights = session.highlights();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].style, HighlightStyle::Underline);
        assert_eq!(highlights[0].annotation.as_deref(), Some("note"));

        // Cache and store agree
        let stored = store.get_highlight(id).unwrap().unwrap();
        assert_eq!(stored.style, HighlightStyle::Underline);

        session.delete_highlight(id).unwrap();
        assert!(session.highlights().is_empty());
        assert_eq!(store.get_highlight(id).unwrap(), None);
    }

    #[test]
    fn test_unknown_highlight_id_is_noop_and_store_untouched() {
        let (store, session) = session_with_interval(Duration::ZERO);
        let id = session
            .add_highlight(locator_at(0.4), HighlightStyle::Highlight, 1, None)
            .unwrap();

        session
            .update_highlight_style(id + 100, HighlightStyle::Underline, 2)
            .unwrap();
        session
            .update_highlight_annotation(id + 100, Some("x".to_string()))
            .unwrap();
        session.delete_highlight(id + 100).unwrap();

        assert_eq!(session.highlights().len(), 1);
        assert_eq!(store.highlights_for_book(session.book_id()).unwrap().len(), 1);
        let stored = store.get_highlight(id).unwrap().unwrap();
        assert_eq!(stored.style, HighlightStyle::Highlight);
    }

    #[test]
    fn test_bookmarks() {
        let (store, session) = session_with_interval(Duration::ZERO);
        let id = session.add_bookmark(locator_at(0.6)).unwrap();
        assert_eq!(session.bookmarks().len(), 1);

        // Unknown id no-op
        session.delete_bookmark(id + 5).unwrap();
        assert_eq!(session.bookmarks().len(), 1);

        session.delete_bookmark(id).unwrap();
        assert!(session.bookmarks().is_empty());
        assert!(store.bookmarks_for_book(session.book_id()).unwrap().is_empty());
    }

    #[test]
    fn test_speech_position_persisted_on_flush() {
        let (store, session) = session_with_interval(Duration::ZERO);
        session.set_speech_position(Some(locator_at(0.7)));
        assert_eq!(session.speech_position(), Some(locator_at(0.7)));

        session.flush().unwrap();
        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.speech_position, Some(locator_at(0.7)));

        session.set_speech_position(None);
        session.flush().unwrap();
        let record = store.get_book(session.book_id()).unwrap().unwrap();
        assert_eq!(record.speech_position, None);
    }
}
