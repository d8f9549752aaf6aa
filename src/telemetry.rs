// telemetry.rs
// Purpose: Install the tracing subscriber used by the binaries

use crate::config::LoggingConfig;
use crate::errors::{RaftError, RaftResult};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> RaftResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| RaftError::config(format!("invalid log filter '{}': {e}", config.filter)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| RaftError::internal(format!("tracing subscriber already set: {e}")))
}
