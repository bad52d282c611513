//! The reader host: dedup-check → import-if-needed → bounded event wait →
//! open-session, behind one typed entry point per source kind.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::bookshelf::{local_source_key, remote_source_key, Bookshelf, InvalidSourceError};
use crate::catalog_store::{CatalogStore, StoreError};
use crate::import::{ImportError, ImportEvent};
use crate::session::{CloseAllError, OpenError, ReadingSession, SessionRepository};

/// Default upper bound on waiting for an import to complete.
pub const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(180);

/// Typed failure of a host entry point.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid source: {0}")]
    InvalidSource(#[from] InvalidSourceError),

    #[error(transparent)]
    ImportFailed(#[from] ImportError),

    /// The import may still be in flight; a later catalog lookup by source
    /// key will find the record once (and if) the job completes.
    #[error("timed out waiting for the import to complete")]
    Timeout,

    #[error("could not open reading session: {0}")]
    OpenFailed(#[from] OpenError),

    #[error("catalog store failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    CloseFailed(#[from] CloseAllError),
}

impl HostError {
    /// Stable code for transport boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::InvalidSource(_) => "INVALID_SOURCE",
            HostError::ImportFailed(_) => "IMPORT_FAILED",
            HostError::Timeout => "TIMEOUT",
            HostError::OpenFailed(_) => "OPEN_FAILED",
            HostError::Store(_) => "STORE_ERROR",
            HostError::CloseFailed(_) => "CLOSE_FAILED",
        }
    }
}

enum Source<'a> {
    Local(&'a Path),
    Remote(&'a str),
}

/// Ties the bookshelf and the session repository together behind the two
/// operations external callers actually issue. All collaborators are
/// injected; the host holds no global state and may be rebuilt at any time
/// without touching live sessions (which belong to the repository).
pub struct ReaderHost {
    store: Arc<dyn CatalogStore>,
    bookshelf: Arc<Bookshelf>,
    sessions: Arc<SessionRepository>,
    import_timeout: Duration,
}

impl ReaderHost {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        bookshelf: Arc<Bookshelf>,
        sessions: Arc<SessionRepository>,
        import_timeout: Duration,
    ) -> Self {
        Self {
            store,
            bookshelf,
            sessions,
            import_timeout,
        }
    }

    /// Import (unless already cataloged) and open a local publication.
    /// Returns the book id; the session is left open in the repository.
    pub async fn open_local(
        &self,
        path: &Path,
        source_key: Option<&str>,
    ) -> Result<i64, HostError> {
        let key = source_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| local_source_key(path));
        self.open_source(Source::Local(path), &key).await
    }

    /// Import (unless already cataloged) and open a remote publication.
    pub async fn open_remote(
        &self,
        url: &str,
        source_key: Option<&str>,
    ) -> Result<i64, HostError> {
        let key = source_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| remote_source_key(url));
        self.open_source(Source::Remote(url), &key).await
    }

    /// Session accessor for the renderer collaborator. Opens (or returns the
    /// cached) session; the handle must not be retained past `close_book`.
    pub async fn session(&self, book_id: i64) -> Result<Arc<ReadingSession>, HostError> {
        Ok(self.sessions.open(book_id).await?)
    }

    /// Flush and close one book's session.
    pub async fn close_book(&self, book_id: i64) -> Result<(), HostError> {
        Ok(self.sessions.close(book_id).await?)
    }

    /// Flush and close every open session. Part of explicit teardown.
    pub async fn close_all(&self) -> Result<(), HostError> {
        Ok(self.sessions.close_all().await?)
    }

    async fn open_source(&self, source: Source<'_>, source_key: &str) -> Result<i64, HostError> {
        // Dedup before importing. Not atomic with the import on purpose: the
        // store's uniqueness constraint backstops the race.
        if let Some(book_id) = self.store.find_book_id_by_source_key(source_key)? {
            debug!("Source {} already cataloged as book {}", source_key, book_id);
            self.sessions.open(book_id).await?;
            return Ok(book_id);
        }

        match source {
            Source::Local(path) => self.bookshelf.import_from_local(path, source_key)?,
            Source::Remote(url) => self.bookshelf.import_from_remote(url, source_key)?,
        }

        let book_id = self.await_import(source_key).await?;
        self.sessions.open(book_id).await?;
        Ok(book_id)
    }

    /// Wait (bounded) for our job's terminal event on the shared channel.
    ///
    /// Events for other jobs may arrive first and are discarded; each event
    /// is consumed at most once, and their submitters reconcile through the
    /// catalog exactly like we do on timeout.
    async fn await_import(&self, source_key: &str) -> Result<i64, HostError> {
        let events = self.bookshelf.events();
        let mut events = events.lock().await;
        let deadline = Instant::now() + self.import_timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match timeout(deadline - now, events.recv()).await {
                // Timed out, or the channel was torn down under us.
                Err(_) => break,
                Ok(None) => break,
                Ok(Some(event)) if event.source_key() != source_key => {
                    warn!(
                        "Discarding import event for {} while waiting for {}",
                        event.source_key(),
                        source_key
                    );
                }
                Ok(Some(ImportEvent::Success { record })) => return Ok(record.id),
                Ok(Some(ImportEvent::Error { error, .. })) => return Err(error.into()),
            }
        }

        // The job may have completed without us consuming its event (e.g. a
        // concurrent caller drained it). Reconcile through the catalog before
        // reporting a timeout.
        if let Some(book_id) = self.store.find_book_id_by_source_key(source_key)? {
            debug!("Import of {} completed without an observed event", source_key);
            return Ok(book_id);
        }
        Err(HostError::Timeout)
    }
}
