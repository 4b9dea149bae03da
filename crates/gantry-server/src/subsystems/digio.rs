//! Digital I/O bank.

use super::parse_args;
use crate::registry::{CommandRegistry, HandlerResult, RegistryError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Routing key for the digital I/O queues.
pub const SUBSYSTEM: &str = "digio";

/// Cached pin levels and pulse counters.
#[derive(Debug, Clone, Default)]
pub struct GpioBank {
    levels: HashMap<u8, bool>,
    pulses: HashMap<u8, u64>,
}

#[derive(Deserialize)]
struct Pulse {
    pin: u8,
    count: u64,
}

#[derive(Deserialize)]
struct SlowWrite {
    pin: u8,
    level: bool,
}

#[derive(Deserialize)]
struct GetRead {
    pin: u8,
}

fn pulse(hw: &mut GpioBank, args: &Value) -> HandlerResult {
    let Pulse { pin, count } = parse_args(args)?;
    *hw.pulses.entry(pin).or_insert(0) += count;
    // A pulse train always parks the pin low
    hw.levels.insert(pin, false);
    Ok(None)
}

fn slow_write(hw: &mut GpioBank, args: &Value) -> HandlerResult {
    let SlowWrite { pin, level } = parse_args(args)?;
    hw.levels.insert(pin, level);
    Ok(None)
}

fn get_read(hw: &mut GpioBank, args: &Value) -> HandlerResult {
    let GetRead { pin } = parse_args(args)?;
    let level = hw.levels.get(&pin).copied().unwrap_or(false);
    Ok(Some(json!(level)))
}

/// Mutating operations, bound to the `commands` queue.
pub fn operation_registry() -> Result<CommandRegistry<GpioBank>, RegistryError> {
    Ok(CommandRegistry::builder("digio commands")
        .register("pulse", pulse)?
        .register("slow-write", slow_write)?
        .build())
}

/// Read-only telemetry, bound to the `data` queue.
pub fn telemetry_registry() -> Result<CommandRegistry<GpioBank>, RegistryError> {
    Ok(CommandRegistry::builder("digio data")
        .register("get-read", get_read)?
        .build())
}
