//! Command/data request body.

use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON body of a command or data request.
///
/// `args` is subsystem-defined and opaque to the broker core: an object for
/// named arguments, an array for positional ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name, unique per subsystem and channel.
    pub command: String,
    /// Handler arguments, passed through untouched.
    #[serde(default)]
    pub args: Value,
}

impl CommandRequest {
    /// Create a new request.
    pub fn new(command: impl Into<String>, args: Value) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
