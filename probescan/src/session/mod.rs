//! One scan session: simulator, analysis engine and the channel between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          ScanSession                             │
//! │                                                                  │
//! │  ┌─────────────┐   RecordSink    ┌──────────┐   RecordSource     │
//! │  │  Simulator  │ ──────────────► │ channel  │ ──────────────┐    │
//! │  └──────┬──────┘                 └──────────┘               ▼    │
//! │         │ SimulatorEvent                          ┌──────────────┐
//! │         │                                         │AnalysisEngine│
//! │         ▼                                         └──────┬───────┘
//! │  ┌─────────────┐ ◄─────────────── AnalysisEvent ─────────┘       │
//! │  │ Supervisor  │                                                 │
//! │  └──────┬──────┘                                                 │
//! └─────────┼────────────────────────────────────────────────────────┘
//!           ▼
//!     SessionEvent stream ──► presentation layer
//! ```
//!
//! The supervisor forwards every worker event, in order per worker. Once the
//! simulator has ended it lets the engine drain the channel, then stops it.
//! The drain idle limit does not run while analysis is paused.
//! If the engine dies the simulator is stopped. A worker panic is reported
//! as that worker's `Failed` event. The last event is always `Completed`.
//!
//! # Example
//!
//! ```ignore
//! let (session, mut events) = ScanSession::start(&model, params, SessionConfig::default())?;
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Completed(summary) = event {
//!         println!("{} points analysed", summary.statistics.total_points);
//!     }
//! }
//! ```

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::analysis::{
    AnalysisConfig, AnalysisEngine, AnalysisEvent, ErrorDistribution, RunningStatistics,
    StatisticsSnapshot,
};
use crate::channel::{ChannelError, ChannelKind, ChannelPair};
use crate::noise::{NoiseConfig, NoiseModel};
use crate::reference::ReferenceModel;
use crate::scan::{ScanError, ScanParameters, ScanPlanner};
use crate::simulator::{MeasurementSimulator, SimulatorError, SimulatorEvent};
use crate::worker::{WorkerControl, WorkerState};

/// Default time the engine may stay idle while draining before it is stopped.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Everything a session needs besides the model and scan parameters.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub analysis: AnalysisConfig,
    pub noise: NoiseConfig,
    pub channel: ChannelKind,
    /// Idle limit for the drain phase; `None` uses [`DEFAULT_DRAIN_TIMEOUT`].
    pub drain_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Set the analysis settings.
    pub fn with_analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.analysis = analysis;
        self
    }

    /// Set the error model.
    pub fn with_noise(mut self, noise: NoiseConfig) -> Self {
        self.noise = noise;
        self
    }

    /// Set the channel backend.
    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.channel = channel;
        self
    }

    /// Set the drain idle limit.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }
}

// =============================================================================
// Errors, events and summary
// =============================================================================

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The scan parameters were rejected.
    #[error("Invalid scan parameters: {0}")]
    InvalidParameters(#[from] ScanError),

    /// The measurement channel could not be opened.
    #[error("Failed to open measurement channel: {0}")]
    Channel(#[from] ChannelError),

    /// `start` was called outside a tokio runtime.
    #[error("A scan session must be started from within a tokio runtime")]
    NoRuntime,

    /// Workers did not stop in time.
    #[error("Workers did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// The supervisor task ended without producing a summary.
    #[error("Session supervisor terminated unexpectedly: {0}")]
    SupervisorLost(String),
}

/// Events delivered to the presentation layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Simulator(SimulatorEvent),
    Analysis(AnalysisEvent),
    /// Always the last event of a session.
    Completed(SessionSummary),
}

/// Outcome of a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Points in the scan plan.
    pub records_planned: u64,
    /// Records the simulator wrote.
    pub records_measured: u64,
    /// Records the engine read, including skipped ones.
    pub records_consumed: u64,
    /// Records without a theoretical match.
    pub lookup_misses: u64,
    pub statistics: StatisticsSnapshot,
    /// Histogram of the final error window.
    pub distribution: ErrorDistribution,
    pub simulator_error: Option<String>,
    pub analysis_error: Option<String>,
}

impl SessionSummary {
    /// Wall-clock duration of the session.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Returns `true` if the whole plan was measured and analysed without
    /// worker failures.
    pub fn is_complete(&self) -> bool {
        self.simulator_error.is_none()
            && self.analysis_error.is_none()
            && self.records_measured == self.records_planned
            && self.records_consumed == self.records_measured
    }
}

// =============================================================================
// Session
// =============================================================================

/// A running scan session.
///
/// Dropping the handle does not stop the workers; call [`ScanSession::stop`]
/// or [`ScanSession::request_stop`] first.
#[derive(Debug)]
pub struct ScanSession {
    simulator: WorkerControl,
    analysis: WorkerControl,
    supervisor: JoinHandle<SessionSummary>,
}

impl ScanSession {
    /// Validates the parameters, opens the channel and starts both workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        model: &ReferenceModel,
        params: ScanParameters,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        params.validate()?;
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let ChannelPair { sink, source } = config.channel.open()?;
        let planned = ScanPlanner::new(params).plan(model.cloud().points()).len() as u64;

        let simulator = MeasurementSimulator::new(
            model.cloud().clone(),
            params,
            NoiseModel::new(config.noise),
            sink,
        );
        let engine = AnalysisEngine::new(model.index().clone(), source, config.analysis.clone());

        let simulator_control = simulator.control();
        let analysis_control = engine.control();

        let (sim_tx, sim_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let engine_task = runtime.spawn(engine.run(engine_tx));
        let simulator_task = runtime.spawn(simulator.run(sim_tx));

        let supervisor = Supervisor {
            simulator: simulator_control.clone(),
            analysis: analysis_control.clone(),
            simulator_task,
            engine_task,
            sim_rx,
            engine_rx,
            out: out_tx,
            planned,
            drain_timeout: config.drain_timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT),
            tolerance: config.analysis.tolerance,
            history_capacity: config.analysis.history_capacity,
        };
        let supervisor = runtime.spawn(supervisor.run());

        info!(
            points = model.cloud().len(),
            planned,
            x_min = params.x_min,
            x_max = params.x_max,
            x_step = params.x_step,
            rot_step = params.rot_step,
            channel = ?config.channel,
            "Scan session started"
        );

        Ok((
            Self {
                simulator: simulator_control,
                analysis: analysis_control,
                supervisor,
            },
            out_rx,
        ))
    }

    /// Pauses both workers at their next iteration boundary.
    pub fn pause(&self) {
        self.simulator.pause();
        self.analysis.pause();
        info!("Scan session paused");
    }

    /// Resumes both workers.
    pub fn resume(&self) {
        self.simulator.resume();
        self.analysis.resume();
        info!("Scan session resumed");
    }

    pub fn simulator_state(&self) -> WorkerState {
        self.simulator.state()
    }

    pub fn analysis_state(&self) -> WorkerState {
        self.analysis.state()
    }

    /// Returns `true` once the session has completed.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Asks both workers to stop without waiting.
    pub fn request_stop(&self) {
        self.simulator.stop();
        self.analysis.stop();
    }

    /// Stops both workers and waits up to `timeout` for them to end.
    pub async fn stop(&self, timeout: Duration) -> Result<(), SessionError> {
        info!(timeout_ms = timeout.as_millis() as u64, "Stopping scan session");
        self.request_stop();

        let both = async {
            self.simulator.wait_stopped(timeout).await && self.analysis.wait_stopped(timeout).await
        };
        match tokio::time::timeout(timeout, both).await {
            Ok(true) => Ok(()),
            _ => {
                warn!(
                    simulator = self.simulator.state().label(),
                    analysis = self.analysis.state().label(),
                    "Workers did not stop in time"
                );
                Err(SessionError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Waits for the session to complete and returns its summary.
    pub async fn wait(self) -> Result<SessionSummary, SessionError> {
        self.supervisor
            .await
            .map_err(|e| SessionError::SupervisorLost(e.to_string()))
    }
}

// =============================================================================
// Supervisor
// =============================================================================

struct Supervisor {
    simulator: WorkerControl,
    analysis: WorkerControl,
    simulator_task: JoinHandle<Result<u64, SimulatorError>>,
    engine_task: JoinHandle<StatisticsSnapshot>,
    sim_rx: mpsc::UnboundedReceiver<SimulatorEvent>,
    engine_rx: mpsc::UnboundedReceiver<AnalysisEvent>,
    out: mpsc::UnboundedSender<SessionEvent>,
    /// Plan size known at start; replaced by the simulator's own count.
    planned: u64,
    drain_timeout: Duration,
    tolerance: f64,
    history_capacity: usize,
}

fn panic_message(worker: &str, err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("{} panicked: {}", worker, detail)
    } else {
        format!("{} task cancelled", worker)
    }
}

impl Supervisor {
    async fn run(mut self) -> SessionSummary {
        let started_at = Local::now();

        let mut planned = self.planned;
        let mut measured: u64 = 0;
        let mut consumed: u64 = 0;
        let mut skipped: u64 = 0;
        let mut statistics = RunningStatistics::new(self.tolerance, self.history_capacity).snapshot();
        let mut history: Vec<f64> = Vec::new();
        let mut simulator_error: Option<String> = None;
        let mut analysis_error: Option<String> = None;

        let mut simulator_done = false;
        let mut engine_done = false;
        let mut engine_stop_sent = false;
        let mut analysis_state = self.analysis.subscribe();

        while !(simulator_done && engine_done) {
            if simulator_done && !engine_done && !engine_stop_sent && consumed >= measured {
                debug!(measured, consumed, "Channel drained, stopping analysis");
                self.analysis.stop();
                engine_stop_sent = true;
            }

            tokio::select! {
                event = self.sim_rx.recv(), if !simulator_done => match event {
                    Some(event) => {
                        match &event {
                            SimulatorEvent::Measured(_) => measured += 1,
                            SimulatorEvent::Progress { total, .. } => planned = *total as u64,
                            SimulatorEvent::Failed(message) => simulator_error = Some(message.clone()),
                            SimulatorEvent::Finished { .. } => {}
                        }
                        let _ = self.out.send(SessionEvent::Simulator(event));
                    }
                    None => {
                        simulator_done = true;
                        if let Err(e) = (&mut self.simulator_task).await {
                            let message = panic_message("Simulator", e);
                            error!(error = %message, "Simulator task died");
                            self.simulator.mark_stopped();
                            simulator_error = Some(message.clone());
                            let _ = self.out.send(SessionEvent::Simulator(SimulatorEvent::Failed(message)));
                        }
                    }
                },

                event = self.engine_rx.recv(), if !engine_done => match event {
                    Some(event) => {
                        match &event {
                            AnalysisEvent::Statistics(snapshot) => statistics = *snapshot,
                            AnalysisEvent::ErrorHistory(window) => history.clone_from(window),
                            AnalysisEvent::Batch { processed_count, skipped: s } => {
                                consumed = *processed_count;
                                skipped = *s;
                            }
                            AnalysisEvent::Finished { processed, skipped: s } => {
                                consumed = *processed;
                                skipped = *s;
                            }
                            AnalysisEvent::Failed(message) => analysis_error = Some(message.clone()),
                            AnalysisEvent::Result(_) => {}
                        }
                        let _ = self.out.send(SessionEvent::Analysis(event));
                    }
                    None => {
                        engine_done = true;
                        match (&mut self.engine_task).await {
                            Ok(snapshot) => statistics = snapshot,
                            Err(e) => {
                                let message = panic_message("Analysis engine", e);
                                error!(error = %message, "Analysis task died");
                                self.analysis.mark_stopped();
                                analysis_error = Some(message.clone());
                                let _ = self.out.send(SessionEvent::Analysis(AnalysisEvent::Failed(message)));
                            }
                        }
                        if !simulator_done {
                            info!("Analysis ended first, stopping simulator");
                            self.simulator.stop();
                        }
                    }
                },

                // Re-arms the drain deadline whenever analysis is paused or resumed.
                _ = analysis_state.changed(), if simulator_done && !engine_done => {}

                _ = tokio::time::sleep(self.drain_timeout),
                    if simulator_done
                        && !engine_stop_sent
                        && self.analysis.state() != WorkerState::Paused =>
                {
                    warn!(
                        measured,
                        consumed,
                        timeout_ms = self.drain_timeout.as_millis() as u64,
                        "Analysis idle while draining, stopping it"
                    );
                    self.analysis.stop();
                    engine_stop_sent = true;
                }
            }
        }

        let summary = SessionSummary {
            started_at,
            finished_at: Local::now(),
            records_planned: planned,
            records_measured: measured,
            records_consumed: consumed,
            lookup_misses: skipped,
            statistics,
            distribution: ErrorDistribution::from_errors(&history, self.tolerance),
            simulator_error,
            analysis_error,
        };

        info!(
            measured = summary.records_measured,
            consumed = summary.records_consumed,
            misses = summary.lookup_misses,
            analysed = summary.statistics.total_points,
            "Scan session completed"
        );
        let _ = self.out.send(SessionEvent::Completed(summary.clone()));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::CartesianPoint;
    use crate::index::IndexConfig;
    use crate::reference::ReferenceCloud;

    fn model() -> ReferenceModel {
        ReferenceModel::build(
            ReferenceCloud::new(vec![CartesianPoint::new(150.0, 353.55, 353.55)]),
            IndexConfig::default(),
        )
    }

    #[test]
    fn test_start_outside_runtime() {
        let err = ScanSession::start(
            &model(),
            ScanParameters::new(0.0, 200.0),
            SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::NoRuntime));
    }

    #[test]
    fn test_invalid_parameters_checked_first() {
        let err = ScanSession::start(
            &model(),
            ScanParameters::new(10.0, 0.0),
            SessionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidParameters(ScanError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_panic_message_extraction() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt
            .block_on(async {
                tokio::spawn(async {
                    if true {
                        panic!("boom");
                    }
                })
                .await
            })
            .unwrap_err();
        assert_eq!(panic_message("Simulator", err), "Simulator panicked: boom");
    }

    #[test]
    fn test_summary_completeness() {
        let now = Local::now();
        let mut summary = SessionSummary {
            started_at: now,
            finished_at: now,
            records_planned: 3,
            records_measured: 3,
            records_consumed: 3,
            lookup_misses: 0,
            statistics: RunningStatistics::default().snapshot(),
            distribution: ErrorDistribution::default(),
            simulator_error: None,
            analysis_error: None,
        };
        assert!(summary.is_complete());

        summary.records_measured = 2;
        assert!(!summary.is_complete());

        summary.records_measured = 3;
        summary.analysis_error = Some("Analysis panicked: boom".to_string());
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let now = Local::now();
        let summary = SessionSummary {
            started_at: now,
            finished_at: now,
            records_planned: 1,
            records_measured: 1,
            records_consumed: 1,
            lookup_misses: 0,
            statistics: RunningStatistics::default().snapshot(),
            distribution: ErrorDistribution::default(),
            simulator_error: None,
            analysis_error: None,
        };

        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["records_planned"], 1);
        assert_eq!(json["statistics"]["total_points"], 0);
        assert_eq!(json["distribution"]["nominal"], 0);
        assert!(json["simulator_error"].is_null());
    }
}
