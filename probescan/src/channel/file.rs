//! CSV measurement log on disk.
//!
//! The file format is kept compatible with external tools that tail the log:
//! a header line followed by one record per line, each line flushed as it is
//! written. The reader keeps a byte offset and only consumes complete lines,
//! so a read that races a write simply leaves the partial line for the next
//! poll.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ChannelError, MeasurementRecord, RecordSink, RecordSource, LOG_HEADER};

/// Writes records to a CSV log file.
#[derive(Debug)]
pub struct CsvLogWriter {
    path: PathBuf,
    file: File,
}

impl CsvLogWriter {
    /// Creates (or truncates) the log file and writes the header.
    pub fn create(path: &Path) -> Result<Self, ChannelError> {
        let io_err = |source| ChannelError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(io_err)?;
        writeln!(file, "{}", LOG_HEADER).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        debug!(path = %path.display(), "Created measurement log");

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvLogWriter {
    fn append(&mut self, record: &MeasurementRecord) -> Result<(), ChannelError> {
        let line = format!("{}\n", record.to_log_line());
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|source| ChannelError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Tails a CSV log file.
#[derive(Debug)]
pub struct CsvLogReader {
    path: PathBuf,
    offset: u64,
    header_seen: bool,
}

impl CsvLogReader {
    /// Creates a reader positioned at the start of `path`.
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            header_seen: false,
        }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn io_error(&self, source: std::io::Error) -> ChannelError {
        ChannelError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordSource for CsvLogReader {
    fn poll(&mut self) -> Result<Vec<MeasurementRecord>, ChannelError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len < self.offset {
            return Err(ChannelError::Truncated {
                path: self.path.clone(),
                len,
                offset: self.offset,
            });
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.seek(SeekFrom::Start(self.offset))
            .and_then(|_| file.read_to_end(&mut buf))
            .map_err(|e| self.io_error(e))?;

        // Only whole lines; a trailing fragment waits for the next poll
        let Some(end) = buf.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = String::from_utf8_lossy(&buf[..=end]);

        let mut lines = complete.lines();
        if !self.header_seen {
            let header = lines.next().unwrap_or_default().trim();
            if header != LOG_HEADER {
                return Err(ChannelError::InvalidHeader {
                    found: header.to_string(),
                });
            }
        }

        let mut records = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match MeasurementRecord::parse_log_line(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Skipping malformed log line"),
            }
        }

        self.header_seen = true;
        self.offset += (end + 1) as u64;
        Ok(records)
    }
}
