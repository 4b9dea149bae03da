//! Error types for the server.

use crate::registry::RegistryError;
use thiserror::Error;

/// Server error type.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Protocol error (malformed stream entries, unexpected response shapes)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Registry assembly error (duplicate command bindings)
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
