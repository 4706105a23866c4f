//! Synthetic measurement error model.
//!
//! The simulated probe error is the sum of four terms, clamped to a maximum
//! amplitude:
//!
//! ```text
//! error = systematic_offset
//!       + uniform(-noise_level, noise_level)
//!       + periodic_amplitude · sin(2π · sequence / periodic_period)
//!       + position_amplitude · sin(ideal_radius / position_scale)
//! ```
//!
//! The periodic term models machine vibration along the scan; the position
//! term models a radius-dependent calibration error. Everything except the
//! uniform term is deterministic, and the uniform term comes from a seedable
//! generator so runs can be reproduced.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters of the error model (mm unless noted).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseConfig {
    /// Constant offset added to every reading.
    pub systematic_offset: f64,
    /// Half-width of the uniform random term.
    pub noise_level: f64,
    /// Amplitude of the sequence-periodic term.
    pub periodic_amplitude: f64,
    /// Period of the sequence-periodic term, in readings.
    pub periodic_period: f64,
    /// Amplitude of the radius-dependent term.
    pub position_amplitude: f64,
    /// Radius scale of the radius-dependent term.
    pub position_scale: f64,
    /// Bound on the total error.
    pub max_amplitude: f64,
    /// Seed for the random term; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            systematic_offset: 0.02,
            noise_level: 0.05,
            periodic_amplitude: 0.02,
            periodic_period: 50.0,
            position_amplitude: 0.01,
            position_scale: 100.0,
            max_amplitude: 0.1,
            seed: None,
        }
    }
}

impl NoiseConfig {
    /// A model that adds no error at all.
    pub fn disabled() -> Self {
        Self {
            systematic_offset: 0.0,
            noise_level: 0.0,
            periodic_amplitude: 0.0,
            position_amplitude: 0.0,
            ..Self::default()
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Computes the clamped error for one reading.
    ///
    /// `unit_random` is a sample from `[0, 1)`; it is mapped onto
    /// `[-noise_level, noise_level)`.
    pub fn error_for(&self, ideal_radius: f64, sequence: u64, unit_random: f64) -> f64 {
        let random = (unit_random - 0.5) * 2.0 * self.noise_level;

        let periodic = if self.periodic_period != 0.0 {
            self.periodic_amplitude * (2.0 * PI * sequence as f64 / self.periodic_period).sin()
        } else {
            0.0
        };

        let position = if self.position_scale != 0.0 {
            self.position_amplitude * (ideal_radius / self.position_scale).sin()
        } else {
            0.0
        };

        let total = self.systematic_offset + random + periodic + position;
        let bound = self.max_amplitude.abs();
        total.clamp(-bound, bound)
    }
}

/// Stateful error model: configuration plus its random source.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    config: NoiseConfig,
    rng: StdRng,
}

impl NoiseModel {
    /// Creates a model, seeding the generator from the config when set.
    pub fn new(config: NoiseConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// Returns the radius a probe would report for `ideal_radius`.
    pub fn simulate(&mut self, ideal_radius: f64, sequence: u64) -> f64 {
        let unit: f64 = self.rng.random();
        ideal_radius + self.config.error_for(ideal_radius, sequence, unit)
    }

    /// The configuration in use.
    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }
}
