//! Host module.
//!
//! The top-level façade external callers talk to, plus its command boundary.

#[allow(clippy::module_inception)]
mod host;

mod commands;

pub use commands::{HostCommand, HostReply};
pub use host::{HostError, ReaderHost, DEFAULT_IMPORT_TIMEOUT};
