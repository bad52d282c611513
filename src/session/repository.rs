//! The session repository: single-flight session lifecycle per catalog entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::catalog_store::{CatalogStore, StoreError};

use super::asset_opener::AssetOpener;
use super::reading_session::ReadingSession;

/// Why a session could not be opened. None of these are auto-retried.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("no catalog record for book {0}")]
    NotFound(i64),

    #[error("publication asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("cannot render media type: {0}")]
    RenderIncompatible(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Aggregated flush failures from [`SessionRepository::close_all`].
#[derive(Debug, Error)]
#[error("failed to close {} reading session(s)", .failures.len())]
pub struct CloseAllError {
    pub failures: Vec<(i64, StoreError)>,
}

/// Owns every open reading session, at most one per book id.
///
/// Session existence is independent of any particular UI instance: any caller
/// may `open` at any time (including after a UI teardown) and gets the cached
/// session if one is live. Eviction happens only on explicit
/// `close`/`close_all`.
pub struct SessionRepository {
    store: Arc<dyn CatalogStore>,
    opener: Arc<dyn AssetOpener>,
    progression_flush_interval: Duration,
    sessions: Mutex<HashMap<i64, Arc<ReadingSession>>>,
}

impl SessionRepository {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        opener: Arc<dyn AssetOpener>,
        progression_flush_interval: Duration,
    ) -> Self {
        Self {
            store,
            opener,
            progression_flush_interval,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or return the cached) session for a book.
    ///
    /// Single-flight: the cache lock is held across construction, so two
    /// concurrent opens of the same id always resolve to the same session.
    pub async fn open(&self, book_id: i64) -> Result<Arc<ReadingSession>, OpenError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&book_id) {
            return Ok(session.clone());
        }

        let record = self
            .store
            .get_book(book_id)?
            .ok_or(OpenError::NotFound(book_id))?;
        let asset_path = self.opener.open(&record)?;
        let highlights = self.store.highlights_for_book(book_id)?;
        let bookmarks = self.store.bookmarks_for_book(book_id)?;

        info!("Opening reading session for book {} ('{}')", book_id, record.title);
        let session = Arc::new(ReadingSession::new(
            book_id,
            asset_path,
            record.media_type,
            record.progression,
            record.speech_position,
            highlights,
            bookmarks,
            self.store.clone(),
            self.progression_flush_interval,
        ));
        sessions.insert(book_id, session.clone());
        Ok(session)
    }

    /// Flush and evict the session for a book. No-op when none is open.
    ///
    /// The cache lock is held across the flush: a concurrent `open` of the
    /// same id waits for the close to finish and reads the flushed row,
    /// never a stale one. A flush failure still evicts (the session is
    /// unusable either way) but is returned, never swallowed.
    pub async fn close(&self, book_id: i64) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get(&book_id).cloned() else {
            return Ok(());
        };
        info!("Closing reading session for book {}", book_id);
        let result = session.flush();
        sessions.remove(&book_id);
        result
    }

    /// Close every open session, attempting all of them before reporting any
    /// failures. Used on process-wide teardown. Holds the cache lock across
    /// the flushes, like [`SessionRepository::close`].
    pub async fn close_all(&self) -> Result<(), CloseAllError> {
        let mut sessions = self.sessions.lock().await;

        let mut failures = Vec::new();
        for (book_id, session) in sessions.iter() {
            if let Err(e) = session.flush() {
                warn!("Flush failed while closing session for book {}: {}", book_id, e);
                failures.push((*book_id, e));
            }
        }
        sessions.clear();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseAllError { failures })
        }
    }

    /// Number of currently open sessions.
    pub async fn open_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
