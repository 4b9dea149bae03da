//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A required stream-entry field is absent.
    #[error("missing entry field: {0}")]
    MissingField(&'static str),

    /// Body failed to parse as JSON.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Control-channel body is not part of the vocabulary.
    #[error("unknown control message: {0:?}")]
    UnknownControl(String),

    /// Control reply body is not part of the vocabulary.
    #[error("unknown control reply: {0:?}")]
    UnknownControlReply(String),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
