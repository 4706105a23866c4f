//! Error types for reference cloud loading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for reference cloud operations.
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Errors that can occur while reading or writing a reference cloud.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Failed to read the cloud file.
    #[error("Failed to read reference cloud {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write the cloud file.
    #[error("Failed to write reference cloud {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Only CSV clouds are supported.
    #[error("Unsupported reference cloud format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The file has no header line.
    #[error("Reference cloud is empty")]
    Empty,

    /// The header does not name the coordinate columns.
    #[error("Reference cloud is missing coordinate columns (expected x_mm,y_mm,z_mm or x,y,z; found: {found})")]
    MissingColumns { found: String },

    /// A data row could not be parsed.
    #[error("Invalid reference point on line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    /// Generator parameters are out of range.
    #[error("Invalid generator parameter {name}: {value}")]
    InvalidGeometry { name: &'static str, value: f64 },
}
