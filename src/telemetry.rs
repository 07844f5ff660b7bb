//! Logging setup for hosts embedding the engine

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info.
/// Fails if a global subscriber is already installed.
pub fn init(verbose: bool) -> Result<()> {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_ascii_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set logging subscriber: {}", e))
}
