//! The bookshelf façade: dedup lookup plus import entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::catalog_store::{CatalogStore, StoreError};
use crate::fetcher::{Fetcher, SourceDescriptor};
use crate::import::{ImportEvent, ImportJob, ImportPipeline};

/// Shared handle to the bookshelf's event channel. A single logical
/// subscriber: whoever holds the lock and awaits consumes the next event.
pub type ImportEvents = Arc<Mutex<mpsc::UnboundedReceiver<ImportEvent>>>;

/// A source that fails fast, before any import job is created.
#[derive(Debug, Error)]
pub enum InvalidSourceError {
    #[error("not a readable file: {0}")]
    NotAFile(PathBuf),

    #[error("invalid url: {0}")]
    BadUrl(String),
}

/// Derive the default source key for a local publication.
pub fn local_source_key(path: &Path) -> String {
    format!("local:{}", path.display())
}

/// Derive the default source key for a remote publication.
pub fn remote_source_key(url: &str) -> String {
    format!("remote:{}", url)
}

/// Import deduplication and catalog-facing façade.
///
/// The dedup check and the import are deliberately not atomic with respect to
/// concurrent callers of the same source key; the catalog's uniqueness
/// constraint is the backstop, and the pipeline resolves the loser of the
/// race to the existing record.
pub struct Bookshelf {
    store: Arc<dyn CatalogStore>,
    pipeline: ImportPipeline,
    events: ImportEvents,
}

impl Bookshelf {
    pub fn new(store: Arc<dyn CatalogStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pipeline = ImportPipeline::new(store.clone(), fetcher, events_tx);
        Self {
            store,
            pipeline,
            events: Arc::new(Mutex::new(events_rx)),
        }
    }

    /// The shared import-event channel. One event per job, eventually, unless
    /// the job never completes; submission order is not guaranteed.
    pub fn events(&self) -> ImportEvents {
        self.events.clone()
    }

    /// Synchronous dedup lookup, issued by importers before any import.
    pub fn find_book_id_by_source_key(
        &self,
        source_key: &str,
    ) -> Result<Option<i64>, StoreError> {
        self.store.find_book_id_by_source_key(source_key)
    }

    /// Enqueue an import of a local publication file. Does not block; the
    /// terminal event arrives on [`Bookshelf::events`].
    pub fn import_from_local(
        &self,
        path: &Path,
        source_key: &str,
    ) -> Result<(), InvalidSourceError> {
        let readable_file = std::fs::metadata(path)
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !readable_file {
            return Err(InvalidSourceError::NotAFile(path.to_path_buf()));
        }

        debug!("Importing local publication {:?} as {}", path, source_key);
        self.pipeline.submit(ImportJob::new(
            SourceDescriptor::Local(path.to_path_buf()),
            source_key,
        ));
        Ok(())
    }

    /// Enqueue an import of a remote publication. Does not block.
    pub fn import_from_remote(
        &self,
        url: &str,
        source_key: &str,
    ) -> Result<(), InvalidSourceError> {
        let parsed = Url::parse(url).map_err(|_| InvalidSourceError::BadUrl(url.to_string()))?;
        let is_http = matches!(parsed.scheme(), "http" | "https");
        if !is_http || parsed.host().is_none() {
            return Err(InvalidSourceError::BadUrl(url.to_string()));
        }

        debug!("Importing remote publication {} as {}", parsed, source_key);
        self.pipeline
            .submit(ImportJob::new(SourceDescriptor::Remote(parsed), source_key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SqliteCatalogStore;
    use crate::fetcher::{PublicationRetriever, MEDIA_TYPE_PDF};
    use tempfile::tempdir;

    fn bookshelf_in(dir: &Path) -> Bookshelf {
        let store = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let fetcher = PublicationRetriever::new(
            reqwest::Client::new(),
            dir.join("library"),
            dir.join("downloads"),
        );
        std::fs::create_dir_all(dir.join("library")).unwrap();
        std::fs::create_dir_all(dir.join("downloads")).unwrap();
        Bookshelf::new(store, Arc::new(fetcher))
    }

    #[tokio::test]
    async fn test_import_missing_local_path_fails_fast() {
        let dir = tempdir().unwrap();
        let bookshelf = bookshelf_in(dir.path());

        let err = bookshelf
            .import_from_local(&dir.path().join("missing.epub"), "local:missing")
            .unwrap_err();
        assert!(matches!(err, InvalidSourceError::NotAFile(_)));

        // No job was created, so no event may ever arrive
        assert!(bookshelf.events().lock().await.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_import_directory_fails_fast() {
        let dir = tempdir().unwrap();
        let bookshelf = bookshelf_in(dir.path());

        let err = bookshelf
            .import_from_local(dir.path(), "local:dir")
            .unwrap_err();
        assert!(matches!(err, InvalidSourceError::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_import_bad_urls_fail_fast() {
        let dir = tempdir().unwrap();
        let bookshelf = bookshelf_in(dir.path());

        for url in ["not a url", "ftp://example.com/book.epub", "/relative/path"] {
            let err = bookshelf
                .import_from_remote(url, "remote:bad")
                .unwrap_err();
            assert!(matches!(err, InvalidSourceError::BadUrl(_)), "url: {}", url);
        }
        assert!(bookshelf.events().lock().await.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_local_import_delivers_event() {
        let dir = tempdir().unwrap();
        let bookshelf = bookshelf_in(dir.path());

        let source = dir.path().join("paper.pdf");
        std::fs::write(&source, b"%PDF-1.7 body").unwrap();

        bookshelf
            .import_from_local(&source, "local:paper")
            .unwrap();

        let events = bookshelf.events();
        let mut rx = events.lock().await;
        let event = rx.recv().await.unwrap();
        match event {
            ImportEvent::Success { record } => {
                assert_eq!(record.source_key, "local:paper");
                assert_eq!(record.media_type, MEDIA_TYPE_PDF);
                assert_eq!(
                    bookshelf.find_book_id_by_source_key("local:paper").unwrap(),
                    Some(record.id)
                );
            }
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[test]
    fn test_source_key_helpers() {
        assert_eq!(
            local_source_key(Path::new("/tmp/book.epub")),
            "local:/tmp/book.epub"
        );
        assert_eq!(
            remote_source_key("https://example.com/b.epub"),
            "remote:https://example.com/b.epub"
        );
    }
}
