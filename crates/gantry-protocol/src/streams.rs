//! Stream-key topology.
//!
//! Per subsystem `X` there is one `commands` stream for mutating operations
//! and one `data` stream for read-only telemetry; a dedicated control stream
//! carries `Connect`/`Release` independently of subsystem traffic. Reply
//! streams are ephemeral and private to one client.

/// Exchange carrying mutating operations.
pub const EXCHANGE_COMMANDS: &str = "commands";

/// Exchange carrying read-only telemetry.
pub const EXCHANGE_DATA: &str = "data";

/// Stream key for the control channel.
pub fn control_stream(namespace: &str) -> String {
    format!("{namespace}:control")
}

/// Stream key for a subsystem request queue.
pub fn request_stream(namespace: &str, exchange: &str, routing_key: &str) -> String {
    format!("{namespace}:{exchange}:{routing_key}")
}

/// Stream key for a client's private reply queue.
pub fn reply_stream(namespace: &str, client_id: &str) -> String {
    format!("{namespace}:reply:{client_id}")
}
