//! CLI error type.

use std::fmt;

use probescan::config::ConfigError;
use probescan::logging::LoggingError;
use probescan::reference::ReferenceError;
use probescan::scan::ScanError;
use probescan::session::SessionError;

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file or argument problem.
    Config(String),

    /// Reference cloud could not be read or written.
    Reference(ReferenceError),

    /// Scan parameters were rejected.
    Scan(ScanError),

    /// The scan session failed to start or stop.
    Session(SessionError),

    /// A worker failed during the scan.
    ScanFailed(String),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    Runtime(String),

    /// Failed to produce output.
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Reference(e) => write!(f, "Reference model error: {}", e),
            CliError::Scan(e) => write!(f, "{}", e),
            CliError::Session(e) => write!(f, "Scan session error: {}", e),
            CliError::ScanFailed(msg) => write!(f, "Scan failed: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
            CliError::Output(msg) => write!(f, "Output error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Reference(e) => Some(e),
            CliError::Scan(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Config(_)
            | CliError::ScanFailed(_)
            | CliError::Runtime(_)
            | CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ReferenceError> for CliError {
    fn from(e: ReferenceError) -> Self {
        CliError::Reference(e)
    }
}

impl From<ScanError> for CliError {
    fn from(e: ScanError) -> Self {
        CliError::Scan(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        CliError::Session(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}
