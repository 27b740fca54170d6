//! Logging configuration using tracing

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Target used for the raw, unclassified daemon output
pub const DAEMON_OUTPUT_TARGET: &str = "bwtctl::daemon_output";

/// Initialize the logging subsystem
///
/// Logs are written to `<data_local_dir>/bwtctl/logs/`.
/// Log level is controlled by the `BWTCTL_LOG` environment variable.
///
/// # Examples
/// ```bash
/// BWTCTL_LOG=debug bwtctl run --chain regtest --wallets wallets.toml
/// BWTCTL_LOG=bwtctl::daemon_output=debug,info bwtctl run ...
/// ```
pub fn init() -> Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "bwtctl.log");

    // Default to info, allow override via BWTCTL_LOG
    let env_filter = EnvFilter::try_from_env("BWTCTL_LOG")
        .unwrap_or_else(|_| EnvFilter::new("bwtctl=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("bwtctl starting");
    tracing::info!("Log directory: {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(())
}

/// Base directory for bwtctl's local data (logs, sockets)
pub fn data_directory() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("bwtctl")
}

/// Get the log directory path
fn get_log_directory() -> Result<PathBuf> {
    Ok(data_directory().join("logs"))
}

/// Get the log file path for the current day
pub fn get_current_log_file() -> Result<PathBuf> {
    let dir = get_log_directory()?;
    Ok(dir.join("bwtctl.log"))
}
