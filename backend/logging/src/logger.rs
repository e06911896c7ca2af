//! Structured Logger
//!
//! Wraps `tracing` to provide console output, a daily-rolling NDJSON file,
//! and `RUST_LOG`-style level control.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the non-blocking file writer flushing; drop it only at shutdown.
pub struct LoggerGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global structured logger.
///
/// `RUST_LOG` wins over `level` when set. Calling this twice is harmless; the
/// second subscriber is ignored.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<LoggerGuard> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level filter: {level}"))?;

    // Rolling file appender: writes NDJSON to `slackrelay.log.YYYY-MM-DD`
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "slackrelay.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggerGuard {
        _file_guard: file_guard,
    })
}
