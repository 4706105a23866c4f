//! Tracing subscriber setup.
//!
//! Logs go to a daily-rolling file in the configured directory and, when
//! verbose, to stderr as well. `RUST_LOG` overrides the configured level.
//!
//! ```ignore
//! let _guard = probescan::logging::init(&config.logging, verbose)?;
//! tracing::info!("ready");
//! // Keep the guard alive until exit so buffered lines are flushed
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Default log level directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log file name prefix; files are named `probescan.YYYY-MM-DD.log`.
pub const LOG_FILE_PREFIX: &str = "probescan";

/// Logging errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file in {path}: {reason}")]
    Appender { path: PathBuf, reason: String },

    #[error("Invalid log level '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory of the rolling log files.
    pub directory: PathBuf,
    /// Filter directive, e.g. `info` or `probescan=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Set the log directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Set the level directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// `<data_local_dir>/probescan/logs`, or `./logs` when unknown.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("probescan").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Keeps the background log writer alive. Flushes on drop.
#[derive(Debug)]
pub struct LoggingGuard {
    _worker: WorkerGuard,
    directory: PathBuf,
}

impl LoggingGuard {
    /// Directory the log files are written to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidLevel {
        level: level.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(&config.level)?;

    std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::CreateDir {
        path: config.directory.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender {
            path: config.directory.clone(),
            reason: e.to_string(),
        })?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    let timer =
        OffsetTime::local_rfc_3339().unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(timer.clone());
    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(timer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _worker: worker,
        directory: config.directory.clone(),
    })
}
