//! Waveform digitizer.

use super::parse_args;
use crate::registry::{CommandRegistry, HandlerError, HandlerResult, RegistryError};
use serde::Deserialize;
use serde_json::{json, Value};

/// Routing key for the acquisition queues.
pub const SUBSYSTEM: &str = "acquisition";

/// Cached digitizer settings and the last completed capture.
#[derive(Debug, Clone)]
pub struct Digitizer {
    rate_hz: u32,
    samples: u32,
    trigger: Trigger,
    last_capture: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
struct Trigger {
    channel: u8,
    level: f64,
    delay: u32,
}

impl Default for Digitizer {
    fn default() -> Self {
        Self {
            rate_hz: 1_000_000,
            samples: 1024,
            trigger: Trigger {
                channel: 0,
                level: 0.05,
                delay: 0,
            },
            last_capture: None,
        }
    }
}

#[derive(Deserialize)]
struct SetTrigger {
    channel: u8,
    level: f64,
    delay: u32,
}

#[derive(Deserialize)]
struct SetRate {
    x: u32,
}

#[derive(Deserialize)]
struct SetSamples {
    x: u32,
}

fn start_collect(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    // The capture itself is the driver's business; the dispatch model only
    // records its completed result
    hw.last_capture = Some(vec![0.0; hw.samples as usize]);
    Ok(None)
}

fn force_stop(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    hw.last_capture = None;
    Ok(None)
}

fn set_trigger(hw: &mut Digitizer, args: &Value) -> HandlerResult {
    let SetTrigger {
        channel,
        level,
        delay,
    } = parse_args(args)?;
    hw.trigger = Trigger {
        channel,
        level,
        delay,
    };
    Ok(None)
}

fn set_rate(hw: &mut Digitizer, args: &Value) -> HandlerResult {
    let SetRate { x } = parse_args(args)?;
    if x == 0 {
        return Err(HandlerError::failed("sample rate must be nonzero"));
    }
    hw.rate_hz = x;
    Ok(None)
}

fn set_samples(hw: &mut Digitizer, args: &Value) -> HandlerResult {
    let SetSamples { x } = parse_args(args)?;
    if x == 0 {
        return Err(HandlerError::failed("sample count must be nonzero"));
    }
    hw.samples = x;
    Ok(None)
}

fn get_waveform(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    match &hw.last_capture {
        Some(capture) => Ok(Some(json!(capture))),
        None => Err(HandlerError::failed("no capture available")),
    }
}

fn get_rate(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    Ok(Some(json!(hw.rate_hz)))
}

fn get_samples(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    Ok(Some(json!(hw.samples)))
}

fn is_ready(hw: &mut Digitizer, _args: &Value) -> HandlerResult {
    Ok(Some(json!(hw.last_capture.is_some())))
}

/// Mutating operations, bound to the `commands` queue.
pub fn operation_registry() -> Result<CommandRegistry<Digitizer>, RegistryError> {
    Ok(CommandRegistry::builder("acquisition commands")
        .register("start-collect", start_collect)?
        .register("force-stop", force_stop)?
        .register("set-trigger", set_trigger)?
        .register("set-rate", set_rate)?
        .register("set-samples", set_samples)?
        .build())
}

/// Read-only telemetry, bound to the `data` queue.
pub fn telemetry_registry() -> Result<CommandRegistry<Digitizer>, RegistryError> {
    Ok(CommandRegistry::builder("acquisition data")
        .register("get-waveform", get_waveform)?
        .register("get-rate", get_rate)?
        .register("get-samples", get_samples)?
        .register("is-ready", is_ready)?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_cycle() {
        let mut hw = Digitizer::default();

        assert_eq!(is_ready(&mut hw, &Value::Null).unwrap(), Some(json!(false)));
        assert!(get_waveform(&mut hw, &Value::Null).is_err());

        set_samples(&mut hw, &json!({ "x": 4 })).unwrap();
        start_collect(&mut hw, &Value::Null).unwrap();

        assert_eq!(is_ready(&mut hw, &Value::Null).unwrap(), Some(json!(true)));
        assert_eq!(
            get_waveform(&mut hw, &Value::Null).unwrap(),
            Some(json!([0.0, 0.0, 0.0, 0.0]))
        );

        force_stop(&mut hw, &Value::Null).unwrap();
        assert_eq!(is_ready(&mut hw, &Value::Null).unwrap(), Some(json!(false)));
    }

    #[test]
    fn test_set_rate_rejects_zero() {
        let mut hw = Digitizer::default();
        assert!(set_rate(&mut hw, &json!({ "x": 0 })).is_err());

        set_rate(&mut hw, &json!({ "x": 1000 })).unwrap();
        assert_eq!(get_rate(&mut hw, &Value::Null).unwrap(), Some(json!(1000)));
    }

    #[test]
    fn test_set_trigger() {
        let mut hw = Digitizer::default();
        set_trigger(&mut hw, &json!({ "channel": 2, "level": 0.25, "delay": 16 })).unwrap();
        assert_eq!(
            hw.trigger,
            Trigger {
                channel: 2,
                level: 0.25,
                delay: 16
            }
        );
    }

    #[test]
    fn test_registries_build() {
        assert_eq!(operation_registry().unwrap().len(), 5);
        assert_eq!(telemetry_registry().unwrap().len(), 4);
    }
}
