//! The measurement simulator worker.
//!
//! Walks the scan plan, turns each reference point into the reading a probe
//! with the configured error model would report, and appends it to the
//! measurement channel.
//!
//! # Example
//!
//! ```ignore
//! let simulator = MeasurementSimulator::new(cloud, params, NoiseModel::new(noise), sink);
//! let control = simulator.control();
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! tokio::spawn(simulator.run(tx));
//!
//! control.pause();
//! control.resume();
//! control.stop();
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::channel::{ChannelError, MeasurementRecord, RecordSink};
use crate::coord::{to_hardware, HardwareReading};
use crate::noise::NoiseModel;
use crate::reference::ReferenceCloud;
use crate::scan::{ScanParameters, ScanPlanner};
use crate::worker::{WorkerControl, WorkerState};

/// Events emitted by the simulator.
#[derive(Debug, Clone)]
pub enum SimulatorEvent {
    /// A record was appended to the channel.
    Measured(MeasurementRecord),
    /// Records written so far out of the plan total.
    Progress { current: usize, total: usize },
    /// The run ended, by completing the plan or by stop.
    Finished { records: u64 },
    /// The run ended on an error.
    Failed(String),
}

/// Fatal simulator errors.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// A record could not be appended.
    #[error("Failed to append measurement {sequence}: {source}")]
    Append {
        sequence: u64,
        #[source]
        source: ChannelError,
    },
}

/// Produces measurement records from a reference cloud.
pub struct MeasurementSimulator {
    cloud: Arc<ReferenceCloud>,
    params: ScanParameters,
    noise: NoiseModel,
    sink: Box<dyn RecordSink>,
    control: WorkerControl,
}

impl std::fmt::Debug for MeasurementSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementSimulator")
            .field("points", &self.cloud.len())
            .field("params", &self.params)
            .field("state", &self.control.state())
            .finish_non_exhaustive()
    }
}

impl MeasurementSimulator {
    /// Creates a simulator. `params` are expected to be validated.
    pub fn new(
        cloud: Arc<ReferenceCloud>,
        params: ScanParameters,
        noise: NoiseModel,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            cloud,
            params,
            noise,
            sink,
            control: WorkerControl::new(),
        }
    }

    /// Handle for pausing, resuming and stopping the simulator.
    pub fn control(&self) -> WorkerControl {
        self.control.clone()
    }

    /// Runs the scan to completion or until stopped.
    ///
    /// Returns the number of records written. Every outcome is also reported
    /// on `events`, ending with exactly one `Finished` or `Failed`.
    pub async fn run(
        mut self,
        events: mpsc::UnboundedSender<SimulatorEvent>,
    ) -> Result<u64, SimulatorError> {
        let control = self.control.clone();
        control.set_state(WorkerState::Running);

        let plan = ScanPlanner::new(self.params).plan(self.cloud.points());
        let total = plan.len();
        let delay = self.params.delay();
        info!(
            total,
            passes = plan.passes().len(),
            delay_ms = delay.as_millis() as u64,
            "Simulation started"
        );

        let mut written: u64 = 0;
        for point in plan.points() {
            if !control.checkpoint().await {
                debug!(written, "Simulation stop requested");
                break;
            }

            let sequence = written + 1;
            let ideal = to_hardware(point);
            let reading = HardwareReading {
                radius: self.noise.simulate(ideal.radius, sequence),
                ..ideal
            };
            let record = MeasurementRecord::new(sequence, reading);

            if let Err(source) = self.sink.append(&record) {
                let err = SimulatorError::Append { sequence, source };
                error!(error = %err, "Simulation failed");
                control.mark_stopped();
                let _ = events.send(SimulatorEvent::Failed(err.to_string()));
                return Err(err);
            }
            written = sequence;

            let _ = events.send(SimulatorEvent::Measured(record));
            let _ = events.send(SimulatorEvent::Progress {
                current: written as usize,
                total,
            });

            if (written as usize) < total && !control.sleep(delay).await {
                debug!(written, "Simulation stop requested");
                break;
            }
        }

        control.mark_stopped();
        info!(records = written, total, "Simulation finished");
        let _ = events.send(SimulatorEvent::Finished { records: written });
        Ok(written)
    }
}
