//! Error types for the client stub.

use std::time::Duration;
use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Protocol error (malformed replies, unexpected control bodies)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The deadline expired before a matching reply arrived
    #[error("timed out waiting for a reply after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// True for errors worth retrying with a fresh call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

impl From<gantry_protocol::ProtocolError> for ClientError {
    fn from(e: gantry_protocol::ProtocolError) -> Self {
        ClientError::Protocol(e.to_string())
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ClientError::Protocol("x".into()).is_retryable());
    }
}
