//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Write one JSON-lines audit file per run
//! - Optionally mirror events to the console
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The file is named after the process start time, so runs never share one
//! - Log level configurable via config and `RUST_LOG`

use chrono::{DateTime, SecondsFormat, Utc};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("logging already initialized: {0}")]
    Init(String),
}

/// `<logs_dir>/<start time>.log`
pub fn log_file_path(logs_dir: &Path, started_at: DateTime<Utc>) -> PathBuf {
    logs_dir.join(format!(
        "{}.log",
        started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ))
}

/// Creates the logs directory if needed and opens the run's file for append.
pub fn open_log_file(logs_dir: &Path, started_at: DateTime<Utc>) -> Result<(PathBuf, File), LoggingError> {
    let path = log_file_path(logs_dir, started_at);
    let io_error = |source| LoggingError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(logs_dir).map_err(io_error)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_error)?;
    Ok((path, file))
}

/// Installs the global subscriber. Returns the path of this run's log file.
pub fn init_logging(
    config: &ObservabilityConfig,
    started_at: DateTime<Utc>,
) -> Result<PathBuf, LoggingError> {
    let (path, file) = open_log_file(Path::new(&config.logs_dir), started_at)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("balance_sweeper={}", config.log_level).into());

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_ansi(false)
        .with_current_span(true)
        .with_writer(Mutex::new(file));

    let console_layer = config
        .console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::info!(log_file = %path.display(), "Logging initialized");
    Ok(path)
}
