//! Fixed status strings returned on the command/data channels.
//!
//! These are delivered as JSON-encoded strings in the reply body; callers
//! inspect the payload rather than relying on an error channel.

use std::fmt::Display;

/// A handler ran and produced no data.
pub const COMMAND_EXECUTED: &str = "Command executed";

/// The command name is absent from the bound registry.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// The request did not carry the active session's token.
pub const UNAUTHORIZED_CLIENT: &str = "Unauthorized Client";

/// Render a handler failure as a response string.
pub fn handler_failure(reason: impl Display) -> String {
    format!("Handler failure: {reason}")
}

/// Render a body that failed to parse as a response string.
pub fn malformed_request(reason: impl Display) -> String {
    format!("Malformed request: {reason}")
}
