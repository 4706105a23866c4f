//! In-process measurement log.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{ChannelError, MeasurementRecord, RecordSink, RecordSource};

/// Shared append-only record log held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    records: Arc<RwLock<Vec<MeasurementRecord>>>,
}

impl MemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// The writing end of the log.
    pub fn sink(&self) -> MemorySink {
        MemorySink { log: self.clone() }
    }

    /// A reading end with its own cursor at the start of the log.
    pub fn source(&self) -> MemorySource {
        MemorySource {
            log: self.clone(),
            cursor: 0,
        }
    }
}

/// Appends records to a [`MemoryLog`].
#[derive(Debug)]
pub struct MemorySink {
    log: MemoryLog,
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &MeasurementRecord) -> Result<(), ChannelError> {
        self.log.records.write().push(*record);
        Ok(())
    }
}

/// Reads a [`MemoryLog`] from its own cursor.
#[derive(Debug)]
pub struct MemorySource {
    log: MemoryLog,
    cursor: usize,
}

impl RecordSource for MemorySource {
    fn poll(&mut self) -> Result<Vec<MeasurementRecord>, ChannelError> {
        let records = self.log.records.read();
        let fresh = records.get(self.cursor..).unwrap_or_default().to_vec();
        self.cursor += fresh.len();
        Ok(fresh)
    }
}
