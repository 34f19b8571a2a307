//! Console and dated log file output.
//!
//! Every event goes to stderr and to `logs/extract_usage_<YYYYMMDD>.log`
//! as `YYYY-MM-DD HH:MM:SS LEVEL message`, timestamps in UTC.

use crate::error::{ExtractError, ExtractResult};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";
const QUIET_DEPS: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

/// Resolve the filter from an explicit level, then `RUST_LOG`, then `info`.
pub fn log_filter(level: Option<&str>) -> EnvFilter {
    let level = level
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let combined = format!("{level},{QUIET_DEPS}");
    EnvFilter::try_new(combined)
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_FILTER},{QUIET_DEPS}")))
}

/// Appending, never-rotating writer for the run's log file.
pub fn file_appender(log_file: &Path) -> ExtractResult<RollingFileAppender> {
    let dir = log_file
        .parent()
        .ok_or_else(|| ExtractError::Logging(format!("{} has no parent", log_file.display())))?;
    let name = log_file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ExtractError::Logging(format!("bad log file name {}", log_file.display())))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|e| ExtractError::Logging(format!("cannot open {}: {e}", log_file.display())))
}

/// Subscriber writing to stderr and to `appender`.
pub fn subscriber(
    filter: EnvFilter,
    appender: RollingFileAppender,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    let timer = ChronoUtc::new("%Y-%m-%d %H:%M:%S".to_string());

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_timer(timer.clone());

    let file = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(false)
        .with_timer(timer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
}

/// Install the global subscriber for the process.
pub fn init(log_file: &Path, level: Option<&str>) -> ExtractResult<()> {
    let appender = file_appender(log_file)?;
    tracing::subscriber::set_global_default(subscriber(log_filter(level), appender))
        .map_err(|e| ExtractError::Logging(e.to_string()))
}
