//! Import pipeline module.
//!
//! Fetch → validate → insert, one terminal event per job.

mod models;
mod pipeline;

pub use models::{ImportError, ImportErrorKind, ImportEvent, ImportJob, ImportStage};
pub use pipeline::ImportPipeline;
