//! Gantry motion stage.

use super::parse_args;
use crate::registry::{CommandRegistry, HandlerError, HandlerResult, RegistryError};
use serde::Deserialize;
use serde_json::{json, Value};

/// Routing key for the motion queues.
pub const SUBSYSTEM: &str = "motion";

/// Cached motion controller state. Touched only by the subsystem's single
/// dispatch task.
#[derive(Debug, Clone)]
pub struct MotionStage {
    position: [f64; 3],
    range: [f64; 3],
    speed_limit: f64,
    stepper_enabled: bool,
}

impl Default for MotionStage {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            range: [450.0, 450.0, 350.0],
            speed_limit: 20.0,
            stepper_enabled: false,
        }
    }
}

#[derive(Deserialize)]
struct MoveTo {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize)]
struct SetSpeedLimit {
    x: f64,
}

fn move_to(hw: &mut MotionStage, args: &Value) -> HandlerResult {
    let MoveTo { x, y, z } = parse_args(args)?;

    if !hw.stepper_enabled {
        return Err(HandlerError::failed("steppers are disabled"));
    }
    let target = [x, y, z];
    for (axis, (&coordinate, &limit)) in target.iter().zip(hw.range.iter()).enumerate() {
        if !(0.0..=limit).contains(&coordinate) {
            return Err(HandlerError::Failed(format!(
                "axis {axis} target {coordinate} outside stage range 0..{limit}"
            )));
        }
    }

    hw.position = target;
    Ok(None)
}

fn set_speed_limit(hw: &mut MotionStage, args: &Value) -> HandlerResult {
    let SetSpeedLimit { x } = parse_args(args)?;
    if x <= 0.0 {
        return Err(HandlerError::failed("speed limit must be positive"));
    }
    hw.speed_limit = x;
    Ok(None)
}

fn enable_stepper(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    hw.stepper_enabled = true;
    Ok(None)
}

fn disable_stepper(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    hw.stepper_enabled = false;
    Ok(None)
}

fn send_home(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    if !hw.stepper_enabled {
        return Err(HandlerError::failed("steppers are disabled"));
    }
    hw.position = [0.0, 0.0, 0.0];
    Ok(None)
}

fn get_position(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    Ok(Some(json!({
        "x": hw.position[0],
        "y": hw.position[1],
        "z": hw.position[2],
    })))
}

fn get_speed_limit(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    Ok(Some(json!(hw.speed_limit)))
}

fn get_max_x(hw: &mut MotionStage, _args: &Value) -> HandlerResult {
    Ok(Some(json!(hw.range[0])))
}

/// Mutating operations, bound to the `commands` queue.
pub fn operation_registry() -> Result<CommandRegistry<MotionStage>, RegistryError> {
    Ok(CommandRegistry::builder("motion commands")
        .register("move-to", move_to)?
        .register("set-speed-limit", set_speed_limit)?
        .register("enable-stepper", enable_stepper)?
        .register("disable-stepper", disable_stepper)?
        .register("send-home", send_home)?
        .build())
}

/// Read-only telemetry, bound to the `data` queue.
pub fn telemetry_registry() -> Result<CommandRegistry<MotionStage>, RegistryError> {
    Ok(CommandRegistry::builder("motion data")
        .register("get-position", get_position)?
        .register("get-speed-limit", get_speed_limit)?
        .register("get-max-x", get_max_x)?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_requires_enabled_steppers() {
        let mut hw = MotionStage::default();
        let args = json!({ "x": 10.0, "y": 10.0, "z": 5.0 });

        assert!(move_to(&mut hw, &args).is_err());

        enable_stepper(&mut hw, &Value::Null).unwrap();
        assert_eq!(move_to(&mut hw, &args).unwrap(), None);
        assert_eq!(hw.position, [10.0, 10.0, 5.0]);
    }

    #[test]
    fn test_move_outside_range_fails() {
        let mut hw = MotionStage::default();
        enable_stepper(&mut hw, &Value::Null).unwrap();

        let result = move_to(&mut hw, &json!({ "x": 9999.0, "y": 0.0, "z": 0.0 }));
        assert!(matches!(result, Err(HandlerError::Failed(_))));
        assert_eq!(hw.position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_move_rejects_bad_args() {
        let mut hw = MotionStage::default();
        enable_stepper(&mut hw, &Value::Null).unwrap();

        let result = move_to(&mut hw, &json!({ "x": 1.0 }));
        assert!(matches!(result, Err(HandlerError::InvalidArgs(_))));
    }

    #[test]
    fn test_send_home() {
        let mut hw = MotionStage::default();
        enable_stepper(&mut hw, &Value::Null).unwrap();
        move_to(&mut hw, &json!({ "x": 30.0, "y": 40.0, "z": 50.0 })).unwrap();

        send_home(&mut hw, &Value::Null).unwrap();
        assert_eq!(hw.position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_telemetry_values() {
        let mut hw = MotionStage::default();
        set_speed_limit(&mut hw, &json!({ "x": 12.5 })).unwrap();

        assert_eq!(
            get_speed_limit(&mut hw, &Value::Null).unwrap(),
            Some(json!(12.5))
        );
        assert_eq!(get_max_x(&mut hw, &Value::Null).unwrap(), Some(json!(450.0)));
        assert_eq!(
            get_position(&mut hw, &Value::Null).unwrap(),
            Some(json!({ "x": 0.0, "y": 0.0, "z": 0.0 }))
        );
    }

    #[test]
    fn test_registries_build() {
        assert_eq!(operation_registry().unwrap().len(), 5);
        assert_eq!(telemetry_registry().unwrap().len(), 3);
    }
}
