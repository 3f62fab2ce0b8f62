//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{ResolveError, StoreError};

/// Errors of the per-connection ingestion step
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed frame; the caller drops it and keeps reading.
    #[error("failed to decode inbound frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0} queue is closed")]
    QueueClosed(&'static str),
}

/// Errors of dispatching one relayed event
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to resolve recipients: {0}")]
    Resolve(#[from] ResolveError),

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl DispatchError {
    /// Recipient lookup failed; only this event is skipped.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, DispatchError::Resolve(_))
    }
}

/// Errors of the message history query
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("user is not a member of the project")]
    Forbidden,

    #[error("invalid range: since is after until")]
    InvalidRange,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
