//! Synthetic reference clouds.
//!
//! Generates the ideal surface of a half cylinder lying along X, which is the
//! reference workpiece the simulator is usually run against.

use std::f64::consts::PI;

use super::error::{ReferenceError, ReferenceResult};
use super::ReferencePoint;

/// Geometry of a generated half cylinder (all values in mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemicylinderSpec {
    /// Length along X.
    pub length: f64,
    /// Radius of the curved surface.
    pub radius: f64,
    /// Sampling interval, both along X and along the arc.
    pub step: f64,
}

impl Default for SemicylinderSpec {
    fn default() -> Self {
        Self {
            length: 2000.0,
            radius: 500.0,
            step: 10.0,
        }
    }
}

impl SemicylinderSpec {
    /// Set the length.
    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    /// Set the radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the sampling step.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Number of X stations.
    pub fn x_samples(&self) -> usize {
        (self.length / self.step) as usize + 1
    }

    /// Number of samples along the half-circle arc.
    pub fn arc_samples(&self) -> usize {
        (PI * self.radius / self.step) as usize + 1
    }

    fn validate(&self) -> ReferenceResult<()> {
        let checks = [
            ("length", self.length, self.length >= 0.0),
            ("radius", self.radius, self.radius > 0.0),
            ("step", self.step, self.step > 0.0),
        ];
        for (name, value, ok) in checks {
            if !value.is_finite() || !ok {
                return Err(ReferenceError::InvalidGeometry { name, value });
            }
        }
        Ok(())
    }
}

/// Generates the points of a half cylinder.
///
/// Stations are spaced `step` apart along X. At each station the arc from
/// θ = 0 to θ = π is sampled evenly, giving `y = r·cos θ`, `z = r·sin θ`.
pub fn generate_semicylinder(spec: &SemicylinderSpec) -> ReferenceResult<Vec<ReferencePoint>> {
    spec.validate()?;

    let x_samples = spec.x_samples();
    let arc_samples = spec.arc_samples();
    let arc_divisions = arc_samples.saturating_sub(1).max(1) as f64;

    let mut points = Vec::with_capacity(x_samples * arc_samples);
    for i in 0..x_samples {
        let x = i as f64 * spec.step;
        for j in 0..arc_samples {
            let theta = j as f64 * PI / arc_divisions;
            points.push(ReferencePoint::new(
                x,
                spec.radius * theta.cos(),
                spec.radius * theta.sin(),
            ));
        }
    }

    tracing::debug!(
        x_samples,
        arc_samples,
        total = points.len(),
        "Generated semicylinder reference cloud"
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::radial_distance;

    #[test]
    fn test_default_sample_counts() {
        let spec = SemicylinderSpec::default();
        assert_eq!(spec.x_samples(), 201);
        assert_eq!(spec.arc_samples(), 158);
    }

    #[test]
    fn test_points_lie_on_surface() {
        let spec = SemicylinderSpec::default()
            .with_length(20.0)
            .with_radius(100.0)
            .with_step(10.0);
        let points = generate_semicylinder(&spec).unwrap();

        assert_eq!(points.len(), spec.x_samples() * spec.arc_samples());
        for p in &points {
            assert!((radial_distance(p.y, p.z) - 100.0).abs() < 1e-9);
            assert!(p.z >= -1e-9, "half cylinder must stay above the Y axis");
        }
    }

    #[test]
    fn test_arc_spans_half_circle() {
        let spec = SemicylinderSpec::default().with_length(0.0);
        let points = generate_semicylinder(&spec).unwrap();

        let first = points.first().unwrap();
        let last = points.last().unwrap();
        assert!((first.y - 500.0).abs() < 1e-9);
        assert!((last.y + 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let spec = SemicylinderSpec::default().with_step(0.0);
        assert!(matches!(
            generate_semicylinder(&spec),
            Err(ReferenceError::InvalidGeometry { name: "step", .. })
        ));
    }
}
