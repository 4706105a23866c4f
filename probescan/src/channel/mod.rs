//! Append-only measurement channel between the simulator and the analysis
//! engine.
//!
//! There is exactly one writer and one reader. The writer only appends; the
//! reader keeps its own cursor and receives every record once, in write
//! order. Two backends implement the contract:
//!
//! | Backend | Writer | Reader |
//! |---------|--------|--------|
//! | Memory  | [`MemorySink`] | [`MemorySource`] |
//! | CSV log | [`CsvLogWriter`] | [`CsvLogReader`] |
//!
//! The CSV log exists for interoperability with tools that tail the log file
//! from another process.

mod file;
mod memory;
mod record;

pub use file::{CsvLogReader, CsvLogWriter};
pub use memory::{MemoryLog, MemorySink, MemorySource};
pub use record::{MeasurementRecord, LOG_HEADER};

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the measurement channel.
///
/// On the reading side every variant is transient: the caller backs off and
/// polls again.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// I/O on the log file failed.
    #[error("Measurement log I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The log file does not start with the expected header.
    #[error("Unexpected measurement log header: '{found}'")]
    InvalidHeader { found: String },

    /// The log file is shorter than what was already consumed.
    #[error("Measurement log {path} shrank to {len} bytes (already read {offset})")]
    Truncated { path: PathBuf, len: u64, offset: u64 },

    /// A complete line could not be parsed.
    #[error("Invalid measurement record '{line}': {reason}")]
    InvalidRecord { line: String, reason: String },
}

/// Writing end of the channel.
pub trait RecordSink: Send {
    /// Appends one record.
    fn append(&mut self, record: &MeasurementRecord) -> Result<(), ChannelError>;
}

/// Reading end of the channel.
pub trait RecordSource: Send {
    /// Returns records written since the previous poll, in order.
    ///
    /// An empty vector means no new data yet.
    fn poll(&mut self) -> Result<Vec<MeasurementRecord>, ChannelError>;
}

/// Which backend a session uses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelKind {
    /// In-process log.
    #[default]
    Memory,
    /// CSV log file at the given path, truncated when opened.
    File(PathBuf),
}

/// Both ends of one channel.
pub struct ChannelPair {
    pub sink: Box<dyn RecordSink>,
    pub source: Box<dyn RecordSource>,
}

impl std::fmt::Debug for ChannelPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPair").finish_non_exhaustive()
    }
}

impl ChannelKind {
    /// Opens a fresh, empty channel of this kind.
    pub fn open(&self) -> Result<ChannelPair, ChannelError> {
        match self {
            ChannelKind::Memory => {
                let log = MemoryLog::new();
                Ok(ChannelPair {
                    sink: Box::new(log.sink()),
                    source: Box::new(log.source()),
                })
            }
            ChannelKind::File(path) => {
                let writer = CsvLogWriter::create(path)?;
                Ok(ChannelPair {
                    sink: Box::new(writer),
                    source: Box::new(CsvLogReader::new(path.clone())),
                })
            }
        }
    }
}
