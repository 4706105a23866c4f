//! Running statistics over the radius-error stream.
//!
//! Counts and extrema cover every point since the last reset. Mean and
//! standard deviation cover only the most recent `capacity` errors, held in a
//! FIFO window. Both are maintained incrementally: a sliding Welford update
//! on insert and a matching downdate on eviction, so each point costs O(1)
//! regardless of the window size.
//!
//! Downdates accumulate rounding error, so the window moments are recomputed
//! exactly once every `capacity` evictions.

use std::collections::VecDeque;

use serde::Serialize;

use super::metrics::DEFAULT_TOLERANCE;

/// Default number of errors kept for mean and standard deviation.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Copy of the statistics at one instant, as sent to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_points: u64,
    pub max_error: f64,
    pub min_error: f64,
    pub avg_error: f64,
    /// Population standard deviation over the window.
    pub std_error: f64,
    pub within_tolerance_count: u64,
    pub tolerance_threshold: f64,
}

impl StatisticsSnapshot {
    /// Share of points within tolerance, in `[0, 1]`.
    pub fn qualified_ratio(&self) -> f64 {
        if self.total_points == 0 {
            0.0
        } else {
            self.within_tolerance_count as f64 / self.total_points as f64
        }
    }
}

/// Five-bin histogram of the error window.
///
/// Bins are split at ±0.5T and ±1.5T; each bin includes its upper edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorDistribution {
    /// `e ≤ -1.5T`
    pub far_negative: usize,
    /// `-1.5T < e ≤ -0.5T`
    pub negative: usize,
    /// `-0.5T < e ≤ 0.5T`
    pub nominal: usize,
    /// `0.5T < e ≤ 1.5T`
    pub positive: usize,
    /// `e > 1.5T`
    pub far_positive: usize,
}

impl ErrorDistribution {
    /// Bins `errors` against tolerance `T`.
    pub fn from_errors<'a>(errors: impl IntoIterator<Item = &'a f64>, tolerance: f64) -> Self {
        let mut dist = Self::default();
        for &e in errors {
            if e <= -1.5 * tolerance {
                dist.far_negative += 1;
            } else if e <= -0.5 * tolerance {
                dist.negative += 1;
            } else if e <= 0.5 * tolerance {
                dist.nominal += 1;
            } else if e <= 1.5 * tolerance {
                dist.positive += 1;
            } else {
                dist.far_positive += 1;
            }
        }
        dist
    }

    /// Bin counts from most negative to most positive.
    pub fn bins(&self) -> [usize; 5] {
        [
            self.far_negative,
            self.negative,
            self.nominal,
            self.positive,
            self.far_positive,
        ]
    }

    /// Total number of binned errors.
    pub fn total(&self) -> usize {
        self.bins().iter().sum()
    }
}

/// Incrementally maintained error statistics.
#[derive(Debug, Clone)]
pub struct RunningStatistics {
    history: VecDeque<f64>,
    capacity: usize,
    tolerance: f64,

    total_points: u64,
    within_tolerance_count: u64,
    max_error: f64,
    min_error: f64,

    /// Window mean.
    mean: f64,
    /// Sum of squared deviations from `mean` over the window.
    m2: f64,
    evictions_since_resync: usize,
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, DEFAULT_HISTORY_CAPACITY)
    }
}

impl RunningStatistics {
    /// Creates empty statistics. A zero capacity is treated as one.
    pub fn new(tolerance: f64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            tolerance,
            total_points: 0,
            within_tolerance_count: 0,
            max_error: 0.0,
            min_error: 0.0,
            mean: 0.0,
            m2: 0.0,
            evictions_since_resync: 0,
        }
    }

    /// Adds one radius error.
    pub fn record(&mut self, error: f64) {
        self.total_points += 1;
        if error.abs() <= self.tolerance {
            self.within_tolerance_count += 1;
        }

        if self.total_points == 1 {
            self.max_error = error;
            self.min_error = error;
        } else {
            self.max_error = self.max_error.max(error);
            self.min_error = self.min_error.min(error);
        }

        if self.history.len() == self.capacity {
            if let Some(oldest) = self.history.pop_front() {
                self.remove_moment(oldest);
                self.evictions_since_resync += 1;
            }
        }
        self.history.push_back(error);
        self.add_moment(error);

        if self.evictions_since_resync >= self.capacity {
            self.resync();
        }
    }

    fn add_moment(&mut self, x: f64) {
        let n = self.history.len() as f64;
        let delta = x - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (x - self.mean);
    }

    /// Inverse of `add_moment`; `history` already excludes `x`.
    fn remove_moment(&mut self, x: f64) {
        let n = self.history.len() as f64;
        if n == 0.0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        }
        let old_mean = self.mean;
        self.mean = old_mean + (old_mean - x) / n;
        self.m2 = (self.m2 - (x - old_mean) * (x - self.mean)).max(0.0);
    }

    /// Recomputes the window moments from scratch.
    fn resync(&mut self) {
        let n = self.history.len();
        if n == 0 {
            self.mean = 0.0;
            self.m2 = 0.0;
        } else {
            let mean = self.history.iter().sum::<f64>() / n as f64;
            self.m2 = self.history.iter().map(|e| (e - mean) * (e - mean)).sum();
            self.mean = mean;
        }
        self.evictions_since_resync = 0;
    }

    /// Clears every counter and the window.
    pub fn reset(&mut self) {
        *self = Self::new(self.tolerance, self.capacity);
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    pub fn within_tolerance_count(&self) -> u64 {
        self.within_tolerance_count
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mean of the window, 0 when empty.
    pub fn avg_error(&self) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            self.mean
        }
    }

    /// Population standard deviation of the window, 0 when empty.
    pub fn std_error(&self) -> f64 {
        let n = self.history.len();
        if n == 0 {
            0.0
        } else {
            (self.m2 / n as f64).max(0.0).sqrt()
        }
    }

    /// Errors in the window, oldest first.
    pub fn history(&self) -> &VecDeque<f64> {
        &self.history
    }

    /// Owned copy of the window, oldest first.
    pub fn history_vec(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    /// Histogram of the window.
    pub fn distribution(&self) -> ErrorDistribution {
        ErrorDistribution::from_errors(&self.history, self.tolerance)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_points: self.total_points,
            max_error: self.max_error,
            min_error: self.min_error,
            avg_error: self.avg_error(),
            std_error: self.std_error(),
            within_tolerance_count: self.within_tolerance_count,
            tolerance_threshold: self.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_moments(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_empty_statistics() {
        let stats = RunningStatistics::default();
        let snap = stats.snapshot();
        assert_eq!(snap.total_points, 0);
        assert_eq!(snap.max_error, 0.0);
        assert_eq!(snap.min_error, 0.0);
        assert_eq!(snap.avg_error, 0.0);
        assert_eq!(snap.std_error, 0.0);
        assert_eq!(snap.tolerance_threshold, 0.1);
        assert_eq!(snap.qualified_ratio(), 0.0);
    }

    #[test]
    fn test_first_point_sets_extrema() {
        let mut stats = RunningStatistics::default();
        stats.record(0.07);
        let snap = stats.snapshot();
        assert_eq!(snap.max_error, 0.07);
        assert_eq!(snap.min_error, 0.07);
        assert_eq!(snap.std_error, 0.0);
    }

    #[test]
    fn test_counts_and_extrema() {
        let mut stats = RunningStatistics::default();
        for e in [0.05, -0.12, 0.1, 0.3, -0.01] {
            stats.record(e);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.total_points, 5);
        assert_eq!(snap.within_tolerance_count, 3);
        assert_eq!(snap.max_error, 0.3);
        assert_eq!(snap.min_error, -0.12);
        assert!((snap.qualified_ratio() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_population_std() {
        let mut stats = RunningStatistics::new(0.1, 100);
        for e in [1.0, 2.0, 3.0, 4.0] {
            stats.record(e);
        }
        assert!((stats.avg_error() - 2.5).abs() < 1e-12);
        assert!((stats.std_error() - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut stats = RunningStatistics::new(0.1, 3);
        for e in [10.0, 1.0, 2.0, 3.0] {
            stats.record(e);
        }
        assert_eq!(stats.history_vec(), vec![1.0, 2.0, 3.0]);
        assert!((stats.avg_error() - 2.0).abs() < 1e-12);
        // Extrema still cover the evicted point
        assert_eq!(stats.snapshot().max_error, 10.0);
        assert_eq!(stats.total_points(), 4);
    }

    #[test]
    fn test_capacity_one() {
        let mut stats = RunningStatistics::new(0.1, 0);
        assert_eq!(stats.capacity(), 1);
        stats.record(0.5);
        stats.record(-0.5);
        assert_eq!(stats.history_vec(), vec![-0.5]);
        assert_eq!(stats.avg_error(), -0.5);
        assert_eq!(stats.std_error(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut stats = RunningStatistics::new(0.2, 50);
        stats.record(0.1);
        stats.record(0.5);
        stats.reset();

        assert_eq!(stats.total_points(), 0);
        assert!(stats.history().is_empty());
        assert_eq!(stats.tolerance(), 0.2);
        assert_eq!(stats.capacity(), 50);
        assert_eq!(stats.snapshot().max_error, 0.0);
    }

    #[test]
    fn test_long_stream_stays_accurate() {
        let mut stats = RunningStatistics::new(0.1, 100);
        let values: Vec<f64> = (0..10_000)
            .map(|i| 1000.0 + ((i * 37) % 101) as f64 * 1e-3)
            .collect();
        for &v in &values {
            stats.record(v);
        }

        let (mean, std) = batch_moments(&values[values.len() - 100..]);
        assert!((stats.avg_error() - mean).abs() < 1e-9);
        assert!((stats.std_error() - std).abs() < 1e-7);
    }

    #[test]
    fn test_distribution_edges() {
        let errors = [-0.2, -0.1, -0.07, 0.0, 0.03, 0.1, 0.12, 0.2, -0.3];
        let dist = ErrorDistribution::from_errors(&errors, 0.1);
        assert_eq!(dist.bins(), [2, 2, 2, 2, 1]);
        assert_eq!(dist.total(), errors.len());
    }

    #[test]
    fn test_distribution_uses_window() {
        let mut stats = RunningStatistics::new(0.1, 2);
        stats.record(-1.0);
        stats.record(0.0);
        stats.record(1.0);
        assert_eq!(stats.distribution().bins(), [0, 0, 1, 0, 1]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn incremental_matches_batch(
                values in prop::collection::vec(-1.0f64..1.0, 1..400),
                capacity in 1usize..64,
            ) {
                let mut stats = RunningStatistics::new(0.1, capacity);
                for &v in &values {
                    stats.record(v);
                }

                let start = values.len().saturating_sub(capacity);
                let window = &values[start..];
                let (mean, std) = batch_moments(window);

                prop_assert!((stats.avg_error() - mean).abs() < 1e-9);
                prop_assert!((stats.std_error() - std).abs() < 1e-6);
                prop_assert_eq!(stats.history_vec(), window.to_vec());
            }

            #[test]
            fn extrema_cover_all_points(values in prop::collection::vec(-5.0f64..5.0, 1..200)) {
                let mut stats = RunningStatistics::new(0.1, 8);
                for &v in &values {
                    stats.record(v);
                }
                let snap = stats.snapshot();
                let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                prop_assert_eq!(snap.max_error, max);
                prop_assert_eq!(snap.min_error, min);
                prop_assert_eq!(snap.total_points, values.len() as u64);
            }
        }
    }
}
