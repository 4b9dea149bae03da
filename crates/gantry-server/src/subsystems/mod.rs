//! Hardware subsystem handler tables.
//!
//! Each subsystem contributes an operations registry (bound to its
//! `commands` queue) and a telemetry registry (bound to its `data` queue).
//! Handlers act on the subsystem's cached controller state; telemetry
//! handlers are side-effect-free. Argument shapes are per-command serde
//! structs, opaque to the broker core.

pub mod acquisition;
pub mod digio;
pub mod motion;

use crate::registry::HandlerError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a command's args payload into its typed shape.
pub(crate) fn parse_args<T: DeserializeOwned>(args: &Value) -> Result<T, HandlerError> {
    serde_json::from_value(args.clone()).map_err(|e| HandlerError::InvalidArgs(e.to_string()))
}
