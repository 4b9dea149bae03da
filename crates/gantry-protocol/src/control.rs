//! Control-channel vocabulary.
//!
//! Control traffic bypasses JSON entirely: bodies are the raw strings below,
//! matching what the hardware-side gatekeeper consumes.

use crate::error::{ProtocolError, ProtocolResult};

/// Control message body: `Connect`.
pub const CONTROL_CONNECT: &str = "Connect";

/// Control message body: `Release`.
pub const CONTROL_RELEASE: &str = "Release";

/// A control message from a client to the gatekeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Request the active session, or a place in the wait queue.
    Connect,
    /// Give up the active session, promoting the next waiter.
    Release,
}

impl ControlCommand {
    /// Parse from a raw body string.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        match body {
            CONTROL_CONNECT => Ok(ControlCommand::Connect),
            CONTROL_RELEASE => Ok(ControlCommand::Release),
            other => Err(ProtocolError::UnknownControl(other.to_string())),
        }
    }

    /// Render as the raw body string.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Connect => CONTROL_CONNECT,
            ControlCommand::Release => CONTROL_RELEASE,
        }
    }
}

/// A gatekeeper reply on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlReply {
    /// The caller now holds the active session. Carries a token as an entry
    /// field. Delivered unsolicited when a parked client is promoted.
    Connected,
    /// The caller already holds the active session.
    AlreadyConnected,
    /// The caller was parked at the tail of the wait queue.
    Queued,
    /// The caller's session was released.
    Released,
}

impl ControlReply {
    /// Parse from a raw body string.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        match body {
            "Connected" => Ok(ControlReply::Connected),
            "Already Connected" => Ok(ControlReply::AlreadyConnected),
            "Queued" => Ok(ControlReply::Queued),
            "Released" => Ok(ControlReply::Released),
            other => Err(ProtocolError::UnknownControlReply(other.to_string())),
        }
    }

    /// Render as the raw body string.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlReply::Connected => "Connected",
            ControlReply::AlreadyConnected => "Already Connected",
            ControlReply::Queued => "Queued",
            ControlReply::Released => "Released",
        }
    }
}
