//! Typed wrappers for the common hardware commands.
//!
//! Each wrapper just packages a command name and argument shape; everything
//! else goes through [`RpcClient::call`]. The full per-command surface lives
//! with the subsystem owners — these cover the everyday bench workflow.

use crate::client::RpcClient;
use crate::error::ClientResult;
use gantry_protocol::streams::{EXCHANGE_COMMANDS, EXCHANGE_DATA};
use serde_json::{json, Value};
use std::time::Duration;

impl RpcClient {
    // Motion stage

    /// Move the stage to the given coordinates.
    pub async fn move_to(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        deadline: Duration,
    ) -> ClientResult<Value> {
        self.call(
            "move-to",
            json!({ "x": x, "y": y, "z": z }),
            EXCHANGE_COMMANDS,
            "motion",
            deadline,
        )
        .await
    }

    /// Drive the stage back to its home position.
    pub async fn send_home(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call("send-home", json!({}), EXCHANGE_COMMANDS, "motion", deadline)
            .await
    }

    /// Energize the stepper drivers.
    pub async fn enable_stepper(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call("enable-stepper", json!({}), EXCHANGE_COMMANDS, "motion", deadline)
            .await
    }

    /// The stage's X-axis travel limit.
    pub async fn get_max_x(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call("get-max-x", json!({}), EXCHANGE_DATA, "motion", deadline)
            .await
    }

    // Waveform digitizer

    /// Set the digitizer sample rate.
    pub async fn set_rate(&mut self, rate_hz: u32, deadline: Duration) -> ClientResult<Value> {
        self.call(
            "set-rate",
            json!({ "x": rate_hz }),
            EXCHANGE_COMMANDS,
            "acquisition",
            deadline,
        )
        .await
    }

    /// Arm a capture.
    pub async fn start_collect(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call(
            "start-collect",
            json!({}),
            EXCHANGE_COMMANDS,
            "acquisition",
            deadline,
        )
        .await
    }

    /// Whether a completed capture is available.
    pub async fn is_ready(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call("is-ready", json!({}), EXCHANGE_DATA, "acquisition", deadline)
            .await
    }

    /// The last completed capture.
    pub async fn get_waveform(&mut self, deadline: Duration) -> ClientResult<Value> {
        self.call("get-waveform", json!({}), EXCHANGE_DATA, "acquisition", deadline)
            .await
    }

    // Digital I/O

    /// Settle a pin to a level.
    pub async fn slow_write(
        &mut self,
        pin: u8,
        level: bool,
        deadline: Duration,
    ) -> ClientResult<Value> {
        self.call(
            "slow-write",
            json!({ "pin": pin, "level": level }),
            EXCHANGE_COMMANDS,
            "digio",
            deadline,
        )
        .await
    }

    /// Read a pin level.
    pub async fn get_read(&mut self, pin: u8, deadline: Duration) -> ClientResult<Value> {
        self.call(
            "get-read",
            json!({ "pin": pin }),
            EXCHANGE_DATA,
            "digio",
            deadline,
        )
        .await
    }
}
