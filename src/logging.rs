//! Process-wide logging.
//!
//! Everything goes to stderr (filtered by `RUST_LOG`, default `info`), and
//! warnings and errors are additionally appended to `errors.log` so failures
//! swallowed by the session are still on disk afterwards.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ERROR_LOG_FILE: &str = "errors.log";

/// Install the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes the error log.
pub fn init_logs(log_dir: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        let _ = tracing_subscriber::registry().with(stderr_layer).try_init();
        tracing::warn!("Cannot create log dir {}: {e}", log_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::never(log_dir, ERROR_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    if tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        // a subscriber is already installed (tests, embedding apps)
        return None;
    }

    Some(guard)
}
