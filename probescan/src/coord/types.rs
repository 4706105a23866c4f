//! Coordinate types shared by the simulator and the analysis engine.

use serde::{Deserialize, Serialize};

/// A point in the workpiece's Cartesian frame, in millimeters.
///
/// X runs along the workpiece axis; Y and Z span the plane the probe
/// rotates in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartesianPoint {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A reading in the probe's native frame.
///
/// This is what a physical rotary probe reports: the carriage position along
/// X, the rotation angle measured from the +Y axis towards +Z, and the
/// distance from the rotation axis to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HardwareReading {
    /// Carriage position along X (mm).
    pub x_pos: f64,
    /// Rotation angle in degrees.
    pub angle_deg: f64,
    /// Radial distance from the rotation axis (mm).
    pub radius: f64,
}

impl HardwareReading {
    /// Creates a new reading.
    pub const fn new(x_pos: f64, angle_deg: f64, radius: f64) -> Self {
        Self {
            x_pos,
            angle_deg,
            radius,
        }
    }
}
