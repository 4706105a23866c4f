//! The analysis worker.
//!
//! Tails the measurement channel, matches each reading to its theoretical
//! point and feeds the error statistics.
//!
//! # Per-record pipeline
//!
//! ```text
//! MeasurementRecord
//!   ├── SurfaceIndex::find(x_pos, angle) ──► miss ──► warn, skipped += 1
//!   ├── coord::to_cartesian ──► measured point
//!   ├── ErrorAnalysis::compute
//!   ├── RunningStatistics::record
//!   └── emit Result + Statistics
//! ```
//!
//! After each non-empty batch the engine emits the history window and a
//! `Batch` progress event.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::metrics::{AnalysisResult, ErrorAnalysis, DEFAULT_TOLERANCE};
use super::statistics::{RunningStatistics, StatisticsSnapshot, DEFAULT_HISTORY_CAPACITY};
use crate::channel::{MeasurementRecord, RecordSource};
use crate::coord::to_cartesian;
use crate::index::SurfaceIndex;
use crate::worker::{WorkerControl, WorkerState};

/// Default interval between channel polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default wait after a failed channel read.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Analysis engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Qualified tolerance T (mm).
    pub tolerance: f64,
    /// Number of errors kept for mean and standard deviation.
    pub history_capacity: usize,
    /// Interval between channel polls.
    pub poll_interval: Duration,
    /// Wait after a failed channel read.
    pub retry_backoff: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl AnalysisConfig {
    /// Set the qualified tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the history window size.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Events emitted by the analysis engine.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    /// One record analysed.
    Result(AnalysisResult),
    /// Statistics after the latest record.
    Statistics(StatisticsSnapshot),
    /// The error window, oldest first, after each analysed record.
    ErrorHistory(Vec<f64>),
    /// A batch was consumed.
    Batch {
        /// Records consumed so far, including skipped ones.
        processed_count: u64,
        /// Records skipped so far for lack of a theoretical match.
        skipped: u64,
    },
    /// The engine stopped.
    Finished { processed: u64, skipped: u64 },
    /// The engine died.
    Failed(String),
}

/// Consumes measurement records and computes error statistics.
pub struct AnalysisEngine {
    index: Arc<SurfaceIndex>,
    source: Box<dyn RecordSource>,
    config: AnalysisConfig,
    statistics: RunningStatistics,
    processed: u64,
    skipped: u64,
    control: WorkerControl,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("config", &self.config)
            .field("processed", &self.processed)
            .field("skipped", &self.skipped)
            .field("state", &self.control.state())
            .finish_non_exhaustive()
    }
}

impl AnalysisEngine {
    /// Creates an engine reading from `source`.
    pub fn new(
        index: Arc<SurfaceIndex>,
        source: Box<dyn RecordSource>,
        config: AnalysisConfig,
    ) -> Self {
        let statistics = RunningStatistics::new(config.tolerance, config.history_capacity);
        Self {
            index,
            source,
            config,
            statistics,
            processed: 0,
            skipped: 0,
            control: WorkerControl::new(),
        }
    }

    /// Handle for pausing, resuming and stopping the engine.
    pub fn control(&self) -> WorkerControl {
        self.control.clone()
    }

    /// Current statistics.
    pub fn statistics(&self) -> &RunningStatistics {
        &self.statistics
    }

    /// Records consumed so far, including skipped ones.
    pub fn processed_count(&self) -> u64 {
        self.processed
    }

    /// Records skipped for lack of a theoretical match.
    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }

    /// Clears the statistics and counters. The channel cursor is kept.
    pub fn reset(&mut self) {
        self.statistics.reset();
        self.processed = 0;
        self.skipped = 0;
    }

    /// Analyses one record and updates the statistics.
    ///
    /// Returns `None` when no theoretical point matches the reading.
    pub fn process_record(&mut self, record: &MeasurementRecord) -> Option<AnalysisResult> {
        self.processed += 1;

        let Some(entry) = self.index.find(record.x_pos_mm, record.angle_deg) else {
            self.skipped += 1;
            warn!(
                sequence = record.sequence,
                x_pos = record.x_pos_mm,
                angle_deg = record.angle_deg,
                "No theoretical point for reading, skipping"
            );
            return None;
        };

        let measured_point = to_cartesian(&record.reading());
        let errors = ErrorAnalysis::compute(
            entry,
            &measured_point,
            record.measured_radius_mm,
            self.config.tolerance,
        );
        self.statistics.record(errors.radius_error);

        Some(AnalysisResult {
            record: *record,
            theoretical_radius: entry.radius_theoretical,
            measured_point,
            theoretical_point: entry.point(),
            errors,
        })
    }

    /// Analyses a batch, sending per-record and per-batch events.
    ///
    /// Returns `false` if the event receiver is gone.
    fn process_batch(
        &mut self,
        batch: &[MeasurementRecord],
        events: &mpsc::UnboundedSender<AnalysisEvent>,
    ) -> bool {
        for record in batch {
            let Some(result) = self.process_record(record) else {
                continue;
            };
            let sent = events
                .send(AnalysisEvent::Result(result))
                .and_then(|_| events.send(AnalysisEvent::Statistics(self.statistics.snapshot())))
                .and_then(|_| {
                    events.send(AnalysisEvent::ErrorHistory(self.statistics.history_vec()))
                });
            if sent.is_err() {
                return false;
            }
        }

        debug!(
            batch = batch.len(),
            processed = self.processed,
            skipped = self.skipped,
            "Analysed batch"
        );

        events
            .send(AnalysisEvent::Batch {
                processed_count: self.processed,
                skipped: self.skipped,
            })
            .is_ok()
    }

    /// Runs until stopped, then sends `Finished`.
    ///
    /// Channel read errors are retried after the configured backoff.
    pub async fn run(mut self, events: mpsc::UnboundedSender<AnalysisEvent>) -> StatisticsSnapshot {
        let control = self.control.clone();
        control.set_state(WorkerState::Running);
        info!(
            tolerance = self.config.tolerance,
            index_entries = self.index.len(),
            "Analysis engine started"
        );

        while control.checkpoint().await {
            let wait = match self.source.poll() {
                Ok(batch) if batch.is_empty() => self.config.poll_interval,
                Ok(batch) => {
                    if !self.process_batch(&batch, &events) {
                        debug!("Analysis event receiver dropped, stopping");
                        break;
                    }
                    self.config.poll_interval
                }
                Err(e) => {
                    debug!(error = %e, "Channel read failed, retrying");
                    self.config.retry_backoff
                }
            };

            if !control.sleep(wait).await {
                break;
            }
        }

        control.mark_stopped();
        info!(
            processed = self.processed,
            skipped = self.skipped,
            analysed = self.statistics.total_points(),
            "Analysis engine stopped"
        );
        let _ = events.send(AnalysisEvent::Finished {
            processed: self.processed,
            skipped: self.skipped,
        });

        self.statistics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ErrorStatus;
    use crate::channel::{ChannelError, MemoryLog, RecordSink};
    use crate::coord::{to_hardware, CartesianPoint, HardwareReading};
    use crate::index::IndexConfig;

    fn index_of(points: &[CartesianPoint]) -> Arc<SurfaceIndex> {
        Arc::new(SurfaceIndex::build(points, IndexConfig::default()))
    }

    fn engine_for(points: &[CartesianPoint]) -> (AnalysisEngine, MemoryLog) {
        let log = MemoryLog::new();
        let engine = AnalysisEngine::new(
            index_of(points),
            Box::new(log.source()),
            AnalysisConfig::default(),
        );
        (engine, log)
    }

    #[test]
    fn test_exact_reading_has_zero_error() {
        let point = CartesianPoint::new(150.0, 353.55, 353.55);
        let (mut engine, _log) = engine_for(&[point]);

        let record = MeasurementRecord::new(1, to_hardware(&point));
        let result = engine.process_record(&record).unwrap();

        assert_eq!(result.errors.radius_error, 0.0);
        assert_eq!(result.status(), ErrorStatus::Qualified);
        assert_eq!(result.theoretical_point, point);
        assert_eq!(engine.statistics().within_tolerance_count(), 1);
        assert_eq!(engine.processed_count(), 1);
    }

    #[test]
    fn test_radial_offset_is_classified() {
        let point = CartesianPoint::new(0.0, 500.0, 0.0);
        let (mut engine, _log) = engine_for(&[point]);

        let record = MeasurementRecord::new(1, HardwareReading::new(0.0, 0.0, 500.15));
        let result = engine.process_record(&record).unwrap();

        assert!((result.errors.radius_error - 0.15).abs() < 1e-9);
        assert_eq!(result.status(), ErrorStatus::Attention);
        assert_eq!(engine.statistics().within_tolerance_count(), 0);
    }

    #[test]
    fn test_miss_is_skipped() {
        let (mut engine, _log) = engine_for(&[CartesianPoint::new(150.0, 500.0, 0.0)]);

        let record = MeasurementRecord::new(1, HardwareReading::new(300.0, 0.0, 500.0));
        assert!(engine.process_record(&record).is_none());
        assert_eq!(engine.skipped_count(), 1);
        assert_eq!(engine.processed_count(), 1);
        assert_eq!(engine.statistics().total_points(), 0);
    }

    #[test]
    fn test_reset() {
        let point = CartesianPoint::new(0.0, 500.0, 0.0);
        let (mut engine, _log) = engine_for(&[point]);
        engine.process_record(&MeasurementRecord::new(1, to_hardware(&point)));
        engine.reset();

        assert_eq!(engine.processed_count(), 0);
        assert_eq!(engine.statistics().total_points(), 0);
    }

    #[test]
    fn test_history_follows_every_result() {
        let point = CartesianPoint::new(0.0, 500.0, 0.0);
        let (mut engine, _log) = engine_for(&[point]);
        let batch: Vec<MeasurementRecord> = (1..=3)
            .map(|seq| {
                let radius = 500.0 + 0.01 * seq as f64;
                MeasurementRecord::new(seq, HardwareReading::new(0.0, 0.0, radius))
            })
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(engine.process_batch(&batch, &tx));

        let mut histories = Vec::new();
        let mut last_error = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                AnalysisEvent::Result(result) => last_error = Some(result.errors.radius_error),
                AnalysisEvent::ErrorHistory(window) => {
                    assert_eq!(window.last().copied(), last_error);
                    histories.push(window);
                }
                _ => {}
            }
        }

        assert_eq!(histories.len(), batch.len());
        for (i, window) in histories.iter().enumerate() {
            assert_eq!(window.len(), i + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_emits_events_and_finishes() {
        let points = [
            CartesianPoint::new(0.0, 500.0, 0.0),
            CartesianPoint::new(10.0, 0.0, 500.0),
        ];
        let (engine, log) = engine_for(&points);
        let control = engine.control();
        let mut sink = log.sink();
        for (i, p) in points.iter().enumerate() {
            sink.append(&MeasurementRecord::new(i as u64 + 1, to_hardware(p)))
                .unwrap();
        }
        sink.append(&MeasurementRecord::new(3, HardwareReading::new(99.0, 0.0, 1.0)))
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(tx));

        let mut results = 0;
        loop {
            match rx.recv().await.unwrap() {
                AnalysisEvent::Result(_) => results += 1,
                AnalysisEvent::Batch {
                    processed_count,
                    skipped,
                } => {
                    assert_eq!(processed_count, 3);
                    assert_eq!(skipped, 1);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(results, 2);

        control.stop();
        let snapshot = handle.await.unwrap();
        assert_eq!(snapshot.total_points, 2);
        assert_eq!(control.state(), WorkerState::Stopped);

        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            if let AnalysisEvent::Finished { processed, skipped } = event {
                assert_eq!((processed, skipped), (3, 1));
                finished = true;
            }
        }
        assert!(finished);
    }

    /// Fails a fixed number of times before yielding records.
    struct FlakySource {
        failures: usize,
        records: Vec<MeasurementRecord>,
    }

    impl RecordSource for FlakySource {
        fn poll(&mut self) -> Result<Vec<MeasurementRecord>, ChannelError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(ChannelError::InvalidHeader {
                    found: String::new(),
                });
            }
            Ok(std::mem::take(&mut self.records))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_are_retried() {
        let point = CartesianPoint::new(0.0, 500.0, 0.0);
        let source = FlakySource {
            failures: 3,
            records: vec![MeasurementRecord::new(1, to_hardware(&point))],
        };
        let engine = AnalysisEngine::new(
            index_of(&[point]),
            Box::new(source),
            AnalysisConfig::default(),
        );
        let control = engine.control();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(tx));

        loop {
            if let AnalysisEvent::Result(result) = rx.recv().await.unwrap() {
                assert_eq!(result.sequence(), 1);
                break;
            }
        }

        control.stop();
        assert_eq!(handle.await.unwrap().total_points, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_defers_processing() {
        let point = CartesianPoint::new(0.0, 500.0, 0.0);
        let (engine, log) = engine_for(&[point]);
        let control = engine.control();
        control.pause();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(engine.run(tx));

        let mut state = control.subscribe();
        state.wait_for(|s| *s == WorkerState::Paused).await.unwrap();

        log.sink()
            .append(&MeasurementRecord::new(1, to_hardware(&point)))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        control.resume();
        loop {
            if let AnalysisEvent::Result(_) = rx.recv().await.unwrap() {
                break;
            }
        }

        control.stop();
        handle.await.unwrap();
    }
}
