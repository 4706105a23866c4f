//! The measurement record and its log-line format.

use serde::{Deserialize, Serialize};

use super::ChannelError;
use crate::coord::HardwareReading;

/// Header line of the measurement log.
pub const LOG_HEADER: &str = "sequence,x_pos_mm,angle_deg,measured_radius_mm";

/// One raw reading as the probe reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// 1-based position in the stream.
    pub sequence: u64,
    /// Carriage position (mm).
    pub x_pos_mm: f64,
    /// Probe angle (degrees).
    pub angle_deg: f64,
    /// Measured radius (mm).
    pub measured_radius_mm: f64,
}

impl MeasurementRecord {
    /// Creates a record from a hardware reading.
    pub fn new(sequence: u64, reading: HardwareReading) -> Self {
        Self {
            sequence,
            x_pos_mm: reading.x_pos,
            angle_deg: reading.angle_deg,
            measured_radius_mm: reading.radius,
        }
    }

    /// The reading part of the record.
    pub fn reading(&self) -> HardwareReading {
        HardwareReading::new(self.x_pos_mm, self.angle_deg, self.measured_radius_mm)
    }

    /// Formats the record as one log line, without the newline.
    pub fn to_log_line(&self) -> String {
        format!(
            "{},{:.3},{:.3},{:.6}",
            self.sequence, self.x_pos_mm, self.angle_deg, self.measured_radius_mm
        )
    }

    /// Parses one log line.
    pub fn parse_log_line(line: &str) -> Result<Self, ChannelError> {
        let invalid = |reason: String| ChannelError::InvalidRecord {
            line: line.to_string(),
            reason,
        };

        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(invalid(format!("expected 4 fields, found {}", fields.len())));
        }

        let sequence = fields[0]
            .parse::<u64>()
            .map_err(|e| invalid(format!("sequence: {}", e)))?;
        if sequence == 0 {
            return Err(invalid("sequence must start at 1".to_string()));
        }

        let mut values = [0.0f64; 3];
        for (slot, (name, raw)) in values.iter_mut().zip(
            ["x_pos_mm", "angle_deg", "measured_radius_mm"]
                .iter()
                .zip(&fields[1..]),
        ) {
            *slot = raw
                .parse::<f64>()
                .map_err(|e| invalid(format!("{}: {}", name, e)))?;
        }

        Ok(Self {
            sequence,
            x_pos_mm: values[0],
            angle_deg: values[1],
            measured_radius_mm: values[2],
        })
    }
}
