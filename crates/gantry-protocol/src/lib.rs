//! Wire protocol for the GantryMQ broker.
//!
//! GantryMQ moves hardware commands from client stubs to per-subsystem
//! dispatch workers and replies back to each client's private reply stream.
//! This crate holds the shared message shapes and nothing else — no I/O,
//! no async, no broker types.
//!
//! # Core Invariants
//!
//! 1. **Bodies are data**: every reply body is a JSON value or one of the
//!    fixed status strings, never an executable reference
//! 2. **Metadata rides outside the body**: reply address, correlation
//!    identifier and session token are stream-entry fields, not payload
//! 3. **Control traffic is raw**: `Connect`/`Release` and their replies are
//!    plain strings, not JSON
//!
//! # Architecture
//!
//! ```text
//! Client Stub -> request stream -> Gatekeeper / Dispatcher
//!      ^                                   |
//!      |_______ reply stream <____________|
//! ```

pub mod control;
pub mod envelope;
pub mod error;
pub mod message;
pub mod status;
pub mod streams;

pub use control::{ControlCommand, ControlReply};
pub use envelope::{Envelope, Reply};
pub use error::{ProtocolError, ProtocolResult};
pub use message::CommandRequest;
