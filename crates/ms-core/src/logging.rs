//! Tracing setup for driver and child.
//!
//! Logs always go to stderr: the child's stdout carries the response
//! envelope and nothing else.

use ms_config::{LogConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Install a global subscriber for `config`.
///
/// Returns `false` when a subscriber is already installed, which is the
/// normal case when a test harness or host set one up first.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.with_ansi(false).try_init().is_ok(),
    };
    if installed {
        tracing::debug!(filter = %config.filter, format = ?config.format, "logging initialized");
    }
    installed
}
