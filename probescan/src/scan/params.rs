//! Scan parameters and their validation.

use std::time::Duration;

use thiserror::Error;

/// Default lower X bound (mm).
pub const DEFAULT_X_MIN: f64 = -5.0;
/// Default upper X bound (mm).
pub const DEFAULT_X_MAX: f64 = 500.0;
/// Default X step (mm).
pub const DEFAULT_X_STEP: f64 = 10.0;
/// Default rotation step (degrees).
pub const DEFAULT_ROT_STEP: f64 = 1.5;
/// Default delay between readings (seconds).
pub const DEFAULT_MEASUREMENT_DELAY: f64 = 0.05;

/// Invalid scan parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// A parameter is NaN or infinite.
    #[error("Scan parameter {name} must be finite (got {value})")]
    NotFinite { name: &'static str, value: f64 },

    /// The X range is empty or inverted.
    #[error("Invalid X range: x_min ({x_min}) must be less than x_max ({x_max})")]
    InvalidRange { x_min: f64, x_max: f64 },

    /// A step is zero or negative.
    #[error("Scan parameter {name} must be positive (got {value})")]
    NonPositiveStep { name: &'static str, value: f64 },

    /// The inter-reading delay is negative.
    #[error("Measurement delay must not be negative (got {0})")]
    NegativeDelay(f64),
}

/// Parameters of one scan session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParameters {
    /// Lower X bound (mm, inclusive).
    pub x_min: f64,
    /// Upper X bound (mm, inclusive).
    pub x_max: f64,
    /// Carriage step along X (mm).
    pub x_step: f64,
    /// Rotation step (degrees).
    pub rot_step: f64,
    /// Delay between readings (seconds).
    pub measurement_delay: f64,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            x_min: DEFAULT_X_MIN,
            x_max: DEFAULT_X_MAX,
            x_step: DEFAULT_X_STEP,
            rot_step: DEFAULT_ROT_STEP,
            measurement_delay: DEFAULT_MEASUREMENT_DELAY,
        }
    }
}

impl ScanParameters {
    /// Creates parameters for an X range with default steps and delay.
    pub fn new(x_min: f64, x_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            ..Default::default()
        }
    }

    /// Set the X step.
    pub fn with_x_step(mut self, step: f64) -> Self {
        self.x_step = step;
        self
    }

    /// Set the rotation step.
    pub fn with_rot_step(mut self, step: f64) -> Self {
        self.rot_step = step;
        self
    }

    /// Set the delay between readings (seconds).
    pub fn with_measurement_delay(mut self, seconds: f64) -> Self {
        self.measurement_delay = seconds;
        self
    }

    /// Checks the parameters, returning the first problem found.
    pub fn validate(&self) -> Result<(), ScanError> {
        let fields = [
            ("x_min", self.x_min),
            ("x_max", self.x_max),
            ("x_step", self.x_step),
            ("rot_step", self.rot_step),
            ("measurement_delay", self.measurement_delay),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(ScanError::NotFinite { name, value });
            }
        }

        if self.x_min >= self.x_max {
            return Err(ScanError::InvalidRange {
                x_min: self.x_min,
                x_max: self.x_max,
            });
        }
        if self.x_step <= 0.0 {
            return Err(ScanError::NonPositiveStep {
                name: "x_step",
                value: self.x_step,
            });
        }
        if self.rot_step <= 0.0 {
            return Err(ScanError::NonPositiveStep {
                name: "rot_step",
                value: self.rot_step,
            });
        }
        if self.measurement_delay < 0.0 {
            return Err(ScanError::NegativeDelay(self.measurement_delay));
        }

        Ok(())
    }

    /// The inter-reading delay as a `Duration`.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.measurement_delay.max(0.0))
    }
}
