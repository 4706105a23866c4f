//! Per-point error metrics and tolerance classification.

use serde::Serialize;

use crate::channel::MeasurementRecord;
use crate::coord::CartesianPoint;
use crate::index::IndexEntry;

/// Default qualified tolerance (mm).
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Three-tier severity of a radial error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorStatus {
    /// `|error| ≤ T`.
    Qualified,
    /// `T < |error| ≤ 2T`.
    Attention,
    /// `|error| > 2T`.
    OutOfTolerance,
}

impl ErrorStatus {
    /// Classifies an error against tolerance `T`.
    pub fn classify(error: f64, tolerance: f64) -> Self {
        let magnitude = error.abs();
        if magnitude <= tolerance {
            ErrorStatus::Qualified
        } else if magnitude <= 2.0 * tolerance {
            ErrorStatus::Attention
        } else {
            ErrorStatus::OutOfTolerance
        }
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorStatus::Qualified => "qualified",
            ErrorStatus::Attention => "attention",
            ErrorStatus::OutOfTolerance => "out of tolerance",
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Error metrics of one measured point against its theoretical point (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    pub radius_error: f64,
    pub x_error: f64,
    pub y_error: f64,
    pub z_error: f64,
    pub euclidean_error: f64,
    /// Same value as `radius_error`; the probe measures radially.
    pub radial_error: f64,
    /// Euclidean error component orthogonal to the radial direction.
    pub tangential_error: f64,
    pub status: ErrorStatus,
}

impl ErrorAnalysis {
    /// Computes the metrics for a measured point.
    pub fn compute(
        entry: &IndexEntry,
        measured: &CartesianPoint,
        measured_radius: f64,
        tolerance: f64,
    ) -> Self {
        let radius_error = measured_radius - entry.radius_theoretical;
        let x_error = measured.x - entry.x_theoretical;
        let y_error = measured.y - entry.y_theoretical;
        let z_error = measured.z - entry.z_theoretical;
        let euclidean_error = (x_error * x_error + y_error * y_error + z_error * z_error).sqrt();
        let radial_error = radius_error;
        let tangential_error =
            (euclidean_error * euclidean_error - radial_error * radial_error).max(0.0).sqrt();

        Self {
            radius_error,
            x_error,
            y_error,
            z_error,
            euclidean_error,
            radial_error,
            tangential_error,
            status: ErrorStatus::classify(radial_error, tolerance),
        }
    }
}

/// One analysed reading: the record, its match and the error metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub record: MeasurementRecord,
    pub theoretical_radius: f64,
    pub measured_point: CartesianPoint,
    pub theoretical_point: CartesianPoint,
    pub errors: ErrorAnalysis,
}

impl AnalysisResult {
    pub fn sequence(&self) -> u64 {
        self.record.sequence
    }

    pub fn x_pos(&self) -> f64 {
        self.record.x_pos_mm
    }

    pub fn angle_deg(&self) -> f64 {
        self.record.angle_deg
    }

    pub fn measured_radius(&self) -> f64 {
        self.record.measured_radius_mm
    }

    pub fn status(&self) -> ErrorStatus {
        self.errors.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(x: f64, y: f64, z: f64) -> IndexEntry {
        IndexEntry::from_point(&CartesianPoint::new(x, y, z))
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(ErrorStatus::classify(0.1, 0.1), ErrorStatus::Qualified);
        assert_eq!(ErrorStatus::classify(-0.1, 0.1), ErrorStatus::Qualified);
        assert_eq!(ErrorStatus::classify(0.15, 0.1), ErrorStatus::Attention);
        assert_eq!(ErrorStatus::classify(0.2, 0.1), ErrorStatus::Attention);
        assert_eq!(ErrorStatus::classify(-0.25, 0.1), ErrorStatus::OutOfTolerance);
    }

    #[test]
    fn test_zero_error() {
        let e = entry(150.0, 300.0, 400.0);
        let analysis = ErrorAnalysis::compute(&e, &e.point(), 500.0, DEFAULT_TOLERANCE);
        assert_eq!(analysis.radius_error, 0.0);
        assert_eq!(analysis.euclidean_error, 0.0);
        assert_eq!(analysis.tangential_error, 0.0);
        assert_eq!(analysis.status, ErrorStatus::Qualified);
    }

    #[test]
    fn test_pure_radial_error() {
        let e = entry(0.0, 500.0, 0.0);
        let measured = CartesianPoint::new(0.0, 500.05, 0.0);
        let analysis = ErrorAnalysis::compute(&e, &measured, 500.05, DEFAULT_TOLERANCE);

        assert!((analysis.radius_error - 0.05).abs() < 1e-9);
        assert!((analysis.y_error - 0.05).abs() < 1e-9);
        assert_eq!(analysis.x_error, 0.0);
        assert!((analysis.euclidean_error - 0.05).abs() < 1e-9);
        assert_eq!(analysis.radial_error, analysis.radius_error);
        assert!(analysis.tangential_error < 1e-6);
    }

    #[test]
    fn test_tangential_component() {
        let e = entry(0.0, 500.0, 0.0);
        // Same radius, displaced along X by 0.3
        let measured = CartesianPoint::new(0.3, 500.0, 0.0);
        let analysis = ErrorAnalysis::compute(&e, &measured, 500.0, DEFAULT_TOLERANCE);

        assert_eq!(analysis.radius_error, 0.0);
        assert!((analysis.tangential_error - 0.3).abs() < 1e-9);
        assert_eq!(analysis.status, ErrorStatus::Qualified);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ErrorStatus::OutOfTolerance.to_string(), "out of tolerance");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn classification_tiers(t in 1e-4f64..10.0, frac in 0.0f64..1.0) {
                let eps = t * 1e-6;
                prop_assert_eq!(ErrorStatus::classify(t, t), ErrorStatus::Qualified);
                prop_assert_eq!(ErrorStatus::classify(-t, t), ErrorStatus::Qualified);
                prop_assert_eq!(ErrorStatus::classify(t * frac, t), ErrorStatus::Qualified);
                prop_assert_eq!(ErrorStatus::classify(t + eps, t), ErrorStatus::Attention);
                prop_assert_eq!(ErrorStatus::classify(2.0 * t, t), ErrorStatus::Attention);
                prop_assert_eq!(ErrorStatus::classify(2.0 * t + eps, t), ErrorStatus::OutOfTolerance);
            }

            #[test]
            fn tangential_never_negative(
                dx in -1.0f64..1.0, dy in -1.0f64..1.0, dz in -1.0f64..1.0, dr in -1.0f64..1.0,
            ) {
                let e = entry(10.0, 300.0, 400.0);
                let measured = CartesianPoint::new(10.0 + dx, 300.0 + dy, 400.0 + dz);
                let analysis = ErrorAnalysis::compute(&e, &measured, 500.0 + dr, 0.1);
                prop_assert!(analysis.tangential_error >= 0.0);
                prop_assert!(analysis.euclidean_error >= 0.0);
            }
        }
    }
}
