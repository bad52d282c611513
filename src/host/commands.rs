//! Transport-agnostic command boundary.
//!
//! An RPC layer (method channel, socket, CLI) decodes a [`HostCommand`],
//! hands it to [`ReaderHost::handle`], and encodes the [`HostReply`]. No core
//! logic depends on the transport.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::host::{HostError, ReaderHost};

/// A command issued by the external caller surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    OpenLocal {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_key: Option<String>,
    },
    OpenRemote {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_key: Option<String>,
    },
    CloseBook {
        book_id: i64,
    },
    CloseAll,
}

/// Result of one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HostReply {
    Opened { book_id: i64 },
    Closed,
    Error { code: String, message: String },
}

impl From<HostError> for HostReply {
    fn from(error: HostError) -> Self {
        HostReply::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl ReaderHost {
    /// Execute one command, mapping every failure to a coded error reply.
    pub async fn handle(&self, command: HostCommand) -> HostReply {
        let result = match command {
            HostCommand::OpenLocal { path, source_key } => self
                .open_local(&path, source_key.as_deref())
                .await
                .map(|book_id| HostReply::Opened { book_id }),
            HostCommand::OpenRemote { url, source_key } => self
                .open_remote(&url, source_key.as_deref())
                .await
                .map(|book_id| HostReply::Opened { book_id }),
            HostCommand::CloseBook { book_id } => self
                .close_book(book_id)
                .await
                .map(|_| HostReply::Closed),
            HostCommand::CloseAll => self.close_all().await.map(|_| HostReply::Closed),
        };
        result.unwrap_or_else(HostReply::from)
    }
}
