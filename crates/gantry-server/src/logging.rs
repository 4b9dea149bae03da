//! Logging initialization for the server binary.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with the given default level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
