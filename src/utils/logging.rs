//! Structured logging setup.
//!
//! The library only emits `tracing` events. Applications and tests that want
//! them printed call [`init_logging`] once at startup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::Result;

/// Install a global fmt subscriber filtered at the configured level.
///
/// `RUST_LOG` takes precedence over `config.log_level` when set. Returns
/// `Ok(())` without changes if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let installed = if config.json_format {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    match installed {
        Ok(()) => tracing::info!(app = %config.app_name, "Logging initialized"),
        Err(_) => tracing::debug!("Global subscriber already installed"),
    }
    Ok(())
}
