//! Coordinate conversion module
//!
//! Provides conversions between the workpiece's Cartesian frame and the
//! hardware-native `(x_pos, angle, radius)` frame reported by a rotary probe.
//!
//! The forward conversion ([`to_hardware`]) and the inverse
//! ([`to_cartesian`]) use the same angle convention, `atan2(z, y)`, so a
//! point survives the round trip up to floating-point error.

mod types;

pub use types::{CartesianPoint, HardwareReading};

/// Distance from the rotation axis for a point with the given Y/Z components.
#[inline]
pub fn radial_distance(y: f64, z: f64) -> f64 {
    (y * y + z * z).sqrt()
}

/// Probe angle in degrees, measured from +Y towards +Z.
///
/// This is the convention used by the surface index and the analysis engine.
#[inline]
pub fn probe_angle_deg(y: f64, z: f64) -> f64 {
    z.atan2(y).to_degrees()
}

/// Rotation-stage angle in degrees, measured from +Z towards +Y.
///
/// The scan planner orders points along each pass with this convention,
/// which mirrors the rotation stage of the physical device. It is not the
/// inverse of [`probe_angle_deg`].
#[inline]
pub fn rotation_angle_deg(y: f64, z: f64) -> f64 {
    y.atan2(z).to_degrees()
}

/// Converts a Cartesian point into the reading a perfect probe would report.
#[inline]
pub fn to_hardware(point: &CartesianPoint) -> HardwareReading {
    HardwareReading {
        x_pos: point.x,
        angle_deg: probe_angle_deg(point.y, point.z),
        radius: radial_distance(point.y, point.z),
    }
}

/// Converts a probe reading back into the Cartesian frame.
#[inline]
pub fn to_cartesian(reading: &HardwareReading) -> CartesianPoint {
    let angle_rad = reading.angle_deg.to_radians();

    CartesianPoint {
        x: reading.x_pos,
        y: reading.radius * angle_rad.cos(),
        z: reading.radius * angle_rad.sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_point_on_y_axis_has_zero_angle() {
        let reading = to_hardware(&CartesianPoint::new(10.0, 500.0, 0.0));
        assert_eq!(reading.x_pos, 10.0);
        assert!((reading.angle_deg - 0.0).abs() < EPSILON);
        assert!((reading.radius - 500.0).abs() < EPSILON);
    }

    #[test]
    fn test_diagonal_point_is_45_degrees() {
        let reading = to_hardware(&CartesianPoint::new(150.0, 353.55, 353.55));
        assert!((reading.angle_deg - 45.0).abs() < EPSILON);
        assert!((reading.radius - 499.9995).abs() < 1e-3);
    }

    #[test]
    fn test_negative_y_is_in_second_quadrant() {
        let reading = to_hardware(&CartesianPoint::new(0.0, -500.0, 1.0));
        assert!(reading.angle_deg > 179.0 && reading.angle_deg < 180.0);
    }

    #[test]
    fn test_rotation_angle_uses_opposite_convention() {
        // Point on +Y: probe angle 0, rotation-stage angle 90
        assert!((probe_angle_deg(500.0, 0.0) - 0.0).abs() < EPSILON);
        assert!((rotation_angle_deg(500.0, 0.0) - 90.0).abs() < EPSILON);

        // The two conventions agree only on the y == z diagonal
        assert!((probe_angle_deg(1.0, 1.0) - rotation_angle_deg(1.0, 1.0)).abs() < EPSILON);
    }

    #[test]
    fn test_to_cartesian_at_90_degrees() {
        let point = to_cartesian(&HardwareReading::new(5.0, 90.0, 200.0));
        assert_eq!(point.x, 5.0);
        assert!(point.y.abs() < 1e-9);
        assert!((point.z - 200.0).abs() < EPSILON);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_roundtrip_property(
                x in -2000.0..2000.0_f64,
                y in -1000.0..1000.0_f64,
                z in -1000.0..1000.0_f64,
            ) {
                let radius = radial_distance(y, z);
                prop_assume!(radius > 1e-6);

                let original = CartesianPoint::new(x, y, z);
                let restored = to_cartesian(&to_hardware(&original));

                // Error scales with the magnitude of the radius
                let tolerance = 1e-9 * radius.max(1.0);
                prop_assert_eq!(restored.x, x);
                prop_assert!(
                    (restored.y - y).abs() < tolerance,
                    "Y roundtrip failed: {} -> {} (diff: {})",
                    y, restored.y, (restored.y - y).abs()
                );
                prop_assert!(
                    (restored.z - z).abs() < tolerance,
                    "Z roundtrip failed: {} -> {} (diff: {})",
                    z, restored.z, (restored.z - z).abs()
                );
            }

            #[test]
            fn test_angle_in_principal_range(
                y in -1000.0..1000.0_f64,
                z in -1000.0..1000.0_f64,
            ) {
                let angle = probe_angle_deg(y, z);
                prop_assert!((-180.0..=180.0).contains(&angle));
            }

            #[test]
            fn test_radius_preserved_by_inverse(
                angle in -180.0..180.0_f64,
                radius in 0.001..1000.0_f64,
            ) {
                let point = to_cartesian(&HardwareReading::new(0.0, angle, radius));
                let back = radial_distance(point.y, point.z);
                prop_assert!((back - radius).abs() < 1e-9 * radius.max(1.0));
            }
        }
    }
}
