//! Domain error types

use std::time::Duration;

use thiserror::Error;

use super::value_object::UserId;

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no connection registered for user {0}")]
    NotFound(UserId),
}

/// Errors writing a frame to a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("outbound buffer is full")]
    Backpressure,

    #[error("connection is closed")]
    Closed,
}

/// Durable store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode document: {0}")]
    Encode(String),

    #[error("failed to decode document: {0}")]
    Decode(String),
}

/// Pub/sub relay errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("subscriber lagged behind, {0} envelopes skipped")]
    Lagged(u64),

    #[error("relay channel closed")]
    Closed,
}

/// Recipient resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("membership store unavailable: {0}")]
    Unavailable(String),

    #[error("membership lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token")]
    InvalidToken,
}
