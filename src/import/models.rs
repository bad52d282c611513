//! Data models for the import pipeline.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::catalog_store::{BookRecord, StoreError};
use crate::fetcher::{FetchError, SourceDescriptor};

/// Pipeline stage a job was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Pending,
    Fetching,
    Validating,
    Inserting,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStage::Pending => "pending",
            ImportStage::Fetching => "fetching",
            ImportStage::Validating => "validating",
            ImportStage::Inserting => "inserting",
        };
        f.write_str(s)
    }
}

/// Cause of an import failure.
#[derive(Debug, Error)]
pub enum ImportErrorKind {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unsupported media type: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Terminal failure of one import job, carrying the originating stage.
#[derive(Debug, Error)]
#[error("import failed while {stage}: {kind}")]
pub struct ImportError {
    pub stage: ImportStage,
    pub kind: ImportErrorKind,
}

impl ImportError {
    pub fn new(stage: ImportStage, kind: impl Into<ImportErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}

/// One transient import request. Exists only for the duration of the job that
/// consumes it; never persisted.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub id: Uuid,
    pub source: SourceDescriptor,
    pub source_key: String,
}

impl ImportJob {
    pub fn new(source: SourceDescriptor, source_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            source_key: source_key.into(),
        }
    }
}

/// Terminal event of one import job. Delivered exactly once per job over the
/// bookshelf's shared channel, consumed at most once by the first awaiting
/// receiver.
#[derive(Debug)]
pub enum ImportEvent {
    Success {
        record: BookRecord,
    },
    Error {
        source_key: String,
        error: ImportError,
    },
}

impl ImportEvent {
    /// Source key of the job this event belongs to.
    pub fn source_key(&self) -> &str {
        match self {
            ImportEvent::Success { record } => &record.source_key,
            ImportEvent::Error { source_key, .. } => source_key,
        }
    }
}
