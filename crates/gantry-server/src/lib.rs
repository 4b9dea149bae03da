//! GantryMQ server: exclusive-control RPC broker for shared lab instruments.
//!
//! Several independent clients issue commands to, and read telemetry from, a
//! shared set of hardware controllers through the broker. The server grants
//! control authority to exactly one client at a time and parks contenders in
//! a FIFO wait queue.
//!
//! # Core Invariants
//!
//! 1. **Mutual Exclusion**: at most one client identity holds the active
//!    session at any instant
//! 2. **FIFO Promotion**: waiters are promoted strictly in arrival order
//! 3. **Authorization Gate**: a request without the active session's token
//!    never reaches a registry handler
//! 4. **Ack-After-Reply**: a request is acknowledged only after its reply
//!    was published, so a crash in between causes redelivery, not loss
//! 5. **One In-Flight**: each queue delivers one request at a time; requests
//!    on the same subsystem never overlap
//!
//! # Architecture
//!
//! ```text
//! control stream  -> Gatekeeper  -----+
//! commands stream -> Queue worker --> | --> reply streams
//! data stream     -> Queue worker --> +
//!                    (one per queue)
//! ```

pub mod broker;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod gatekeeper;
pub mod logging;
pub mod registry;
pub mod subsystems;

#[cfg(test)]
mod tests;

pub use config::ServerConfig;
pub use control::ControlWorker;
pub use dispatcher::{Channel, Dispatcher, QueueWorker, SharedDispatcher};
pub use error::{ServerError, ServerResult};
pub use gatekeeper::{GateState, SessionGate};
pub use registry::{CommandRegistry, HandlerError, RegistryError};
