//! Configuration for the server.

use gantry_protocol::streams;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Stream-key namespace shared with the clients
    pub namespace: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Consumer name (unique per instance)
    pub consumer_name: String,

    /// XREADGROUP block timeout in milliseconds
    pub block_timeout_ms: u64,
}

impl ServerConfig {
    /// Create a new ServerConfig with defaults, overridable via environment
    /// variables.
    pub fn new() -> Self {
        let redis_url =
            std::env::var("GMQ_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let namespace = std::env::var("GMQ_NAMESPACE").unwrap_or_else(|_| "gmq".to_string());

        let block_timeout_ms: u64 = std::env::var("GMQ_BLOCK_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);

        let consumer_name = format!("gmq-{}", uuid::Uuid::new_v4());

        Self {
            redis_url,
            namespace,
            consumer_group: "gmq".to_string(),
            consumer_name,
            block_timeout_ms,
        }
    }

    /// Stream key for the control channel.
    pub fn control_stream(&self) -> String {
        streams::control_stream(&self.namespace)
    }

    /// Stream key for a subsystem's mutating-operations queue.
    pub fn commands_stream(&self, subsystem: &str) -> String {
        streams::request_stream(&self.namespace, streams::EXCHANGE_COMMANDS, subsystem)
    }

    /// Stream key for a subsystem's telemetry queue.
    pub fn data_stream(&self, subsystem: &str) -> String {
        streams::request_stream(&self.namespace, streams::EXCHANGE_DATA, subsystem)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServerConfig::new();

        assert_eq!(config.namespace, "gmq");
        assert_eq!(config.consumer_group, "gmq");
        assert!(config.consumer_name.starts_with("gmq-"));
        assert_eq!(config.block_timeout_ms, 5000);
    }

    #[test]
    fn test_stream_keys() {
        let config = ServerConfig::new();
        assert_eq!(config.control_stream(), "gmq:control");
        assert_eq!(config.commands_stream("motion"), "gmq:commands:motion");
        assert_eq!(config.data_stream("digio"), "gmq:data:digio");
    }
}
