//! Real-time error analysis of measurement records.

mod engine;
mod metrics;
mod statistics;

pub use engine::{
    AnalysisConfig, AnalysisEngine, AnalysisEvent, DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_BACKOFF,
};
pub use metrics::{AnalysisResult, ErrorAnalysis, ErrorStatus, DEFAULT_TOLERANCE};
pub use statistics::{
    ErrorDistribution, RunningStatistics, StatisticsSnapshot, DEFAULT_HISTORY_CAPACITY,
};
