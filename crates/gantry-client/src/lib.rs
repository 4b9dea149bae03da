//! RPC client stub for the GantryMQ broker.
//!
//! One stub per process: it owns a private reply stream for its lifetime,
//! issues one call at a time, and matches replies by correlation identifier.
//! Every wait takes an explicit deadline and resolves to a retryable timeout
//! error instead of hanging on a silent subsystem.

pub mod api;
pub mod client;
pub mod error;
mod pending;

pub use client::{ConnectStatus, RpcClient};
pub use error::{ClientError, ClientResult};
