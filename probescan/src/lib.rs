//! ProbeScan - rotating-probe inspection simulator with real-time error
//! analysis.
//!
//! A [`simulator::MeasurementSimulator`] walks a reference point cloud in a
//! zigzag raster and streams noisy probe readings through an append-only
//! [`channel`]. An [`analysis::AnalysisEngine`] tails that channel, matches
//! every reading to its theoretical point through a [`index::SurfaceIndex`],
//! and keeps running error statistics. A [`session::ScanSession`] wires the
//! two together and delivers one stream of typed events.
//!
//! ```text
//! reference cloud ─► ScanPlanner ─► MeasurementSimulator ─► channel
//!                                                             │
//!          events ◄─ ScanSession ◄─ AnalysisEngine ◄──────────┘
//! ```

pub mod analysis;
pub mod channel;
pub mod config;
pub mod coord;
pub mod index;
pub mod logging;
pub mod noise;
pub mod reference;
pub mod scan;
pub mod session;
pub mod simulator;
pub mod worker;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
