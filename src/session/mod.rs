//! Session module.
//!
//! Reading sessions and their single-flight repository.

mod asset_opener;
mod reading_session;
mod repository;

pub use asset_opener::{AssetOpener, FsAssetOpener};
pub use reading_session::ReadingSession;
pub use repository::{CloseAllError, OpenError, SessionRepository};
