//! Import pipeline orchestration.
//!
//! Each submitted job runs through `Pending → Fetching → Validating →
//! Inserting` on its own task and emits exactly one terminal [`ImportEvent`].
//! Failure at any stage is terminal; there are no retries here, callers
//! retry by reissuing a new import. A failed fetch or validation never
//! inserts a catalog record.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog_store::{BookRecord, CatalogStore, NewBook, StoreError};
use crate::fetcher::{Fetcher, LocalAsset, SourceDescriptor, RENDERABLE_MEDIA_TYPES};

use super::models::{ImportError, ImportErrorKind, ImportEvent, ImportJob, ImportStage};

/// Spawns one async task per import job and reports terminal events on the
/// shared channel.
pub struct ImportPipeline {
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn Fetcher>,
    events_tx: mpsc::UnboundedSender<ImportEvent>,
}

impl ImportPipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn Fetcher>,
        events_tx: mpsc::UnboundedSender<ImportEvent>,
    ) -> Self {
        Self {
            store,
            fetcher,
            events_tx,
        }
    }

    /// Enqueue a job. Returns immediately; the terminal event arrives on the
    /// shared channel. Jobs are not cancellable mid-flight.
    pub fn submit(&self, job: ImportJob) {
        debug!("Import job {} submitted for {}", job.id, job.source_key);
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let job_id = job.id;
            let event = run_job(store, fetcher, job).await;
            if events_tx.send(event).is_err() {
                // Channel discarded during teardown; the import itself
                // already took effect (or not), nothing left to report to.
                warn!("Dropping import event for job {}: channel closed", job_id);
            }
        });
    }
}

async fn run_job(
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn Fetcher>,
    job: ImportJob,
) -> ImportEvent {
    let source_key = job.source_key.clone();
    match run_job_inner(store, fetcher, job).await {
        Ok(record) => {
            info!("Imported '{}' as book {}", record.title, record.id);
            ImportEvent::Success { record }
        }
        Err(error) => {
            warn!("Import of {} failed: {}", source_key, error);
            ImportEvent::Error { source_key, error }
        }
    }
}

async fn run_job_inner(
    store: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn Fetcher>,
    job: ImportJob,
) -> Result<BookRecord, ImportError> {
    debug!("Import job {}: fetching {}", job.id, job.source);
    let asset = fetcher
        .fetch(&job.source)
        .await
        .map_err(|e| ImportError::new(ImportStage::Fetching, e))?;

    debug!("Import job {}: validating {:?}", job.id, asset.path);
    if !RENDERABLE_MEDIA_TYPES.contains(&asset.media_type.as_str()) {
        discard_asset(&asset).await;
        return Err(ImportError {
            stage: ImportStage::Validating,
            kind: ImportErrorKind::UnsupportedFormat(asset.media_type),
        });
    }

    debug!("Import job {}: inserting catalog record", job.id);
    let book = NewBook {
        source_key: job.source_key.clone(),
        title: title_for_source(&job.source),
        href: asset
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        media_type: asset.media_type.clone(),
        cover_ref: None,
    };

    let book_id = match store.insert_book(&book) {
        Ok(id) => id,
        Err(StoreError::DuplicateSource(key)) => {
            // A concurrent import of the same source key won the race. The
            // existing record is the answer; drop our duplicate asset.
            info!("Source {} already imported, reusing existing record", key);
            discard_asset(&asset).await;
            store
                .find_book_id_by_source_key(&key)
                .map_err(|e| ImportError::new(ImportStage::Inserting, e))?
                .ok_or_else(|| {
                    ImportError::new(
                        ImportStage::Inserting,
                        StoreError::Corrupt(format!(
                            "duplicate source key {} has no record",
                            key
                        )),
                    )
                })?
        }
        Err(e) => return Err(ImportError::new(ImportStage::Inserting, e)),
    };

    store
        .get_book(book_id)
        .map_err(|e| ImportError::new(ImportStage::Inserting, e))?
        .ok_or_else(|| {
            ImportError::new(
                ImportStage::Inserting,
                StoreError::Corrupt(format!("book {} vanished after insert", book_id)),
            )
        })
}

/// Best-effort removal of an asset that will never be cataloged.
async fn discard_asset(asset: &LocalAsset) {
    if let Err(e) = tokio::fs::remove_file(&asset.path).await {
        warn!("Could not remove discarded asset {:?}: {}", asset.path, e);
    }
}

fn title_for_source(source: &SourceDescriptor) -> String {
    let stem = match source {
        SourceDescriptor::Local(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned()),
        SourceDescriptor::Remote(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|name| {
                Path::new(name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.to_string())
            }),
    };
    stem.filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}
