//! Quantized spatial index over the reference cloud.
//!
//! Every reference point is stored under a key made of its X coordinate and
//! its probe angle, each rounded to one decimal. A reading is matched to its
//! theoretical point by looking up the same key; when rounding puts the
//! reading in a neighbouring cell, a linear fallback search picks the closest
//! entry within a tolerance window.
//!
//! # Lookup
//!
//! ```text
//! find(x, angle)
//!   ├── exact key (round(x,1), round(angle,1)) ──► hit
//!   └── miss ──► scan entries with |Δx| ≤ 0.5 and |Δangle| ≤ 1.0
//!                 └── minimum distance in the (x, angle) key plane
//! ```
//!
//! Two reference points that round to the same key collide; the later one
//! replaces the earlier one in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::coord::{probe_angle_deg, radial_distance, CartesianPoint};
use crate::reference::ReferencePoint;

/// Default half-width of the fallback window along X (mm).
pub const DEFAULT_X_TOLERANCE: f64 = 0.5;

/// Default half-width of the fallback window in angle (degrees).
pub const DEFAULT_ANGLE_TOLERANCE: f64 = 1.0;

/// Quantization steps per unit (one decimal place).
const STEPS_PER_UNIT: f64 = 10.0;

/// Fallback search tolerances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    /// Maximum |Δx| for a fallback match (mm).
    pub x_tolerance: f64,
    /// Maximum |Δangle| for a fallback match (degrees).
    pub angle_tolerance: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            x_tolerance: DEFAULT_X_TOLERANCE,
            angle_tolerance: DEFAULT_ANGLE_TOLERANCE,
        }
    }
}

impl IndexConfig {
    /// Set the X tolerance.
    pub fn with_x_tolerance(mut self, tolerance: f64) -> Self {
        self.x_tolerance = tolerance;
        self
    }

    /// Set the angle tolerance.
    pub fn with_angle_tolerance(mut self, tolerance: f64) -> Self {
        self.angle_tolerance = tolerance;
        self
    }
}

/// Lookup key: X and angle in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuantizedKey {
    x_tenths: i64,
    angle_tenths: i64,
}

impl QuantizedKey {
    /// Quantizes an `(x, angle)` pair. Returns `None` for non-finite input.
    pub fn new(x: f64, angle_deg: f64) -> Option<Self> {
        if !x.is_finite() || !angle_deg.is_finite() {
            return None;
        }
        Some(Self {
            x_tenths: quantize(x),
            angle_tenths: quantize(angle_deg),
        })
    }

    /// X coordinate of the key (rounded, mm).
    pub fn x(&self) -> f64 {
        self.x_tenths as f64 / STEPS_PER_UNIT
    }

    /// Angle of the key (rounded, degrees).
    pub fn angle(&self) -> f64 {
        self.angle_tenths as f64 / STEPS_PER_UNIT
    }
}

/// Ties round to the even tenth, so 0.25 and 0.15 both key to 0.2.
#[inline]
fn quantize(value: f64) -> i64 {
    (value * STEPS_PER_UNIT).round_ties_even() as i64
}

/// Theoretical values for one reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub x_theoretical: f64,
    pub y_theoretical: f64,
    pub z_theoretical: f64,
    pub radius_theoretical: f64,
    pub angle_theoretical_deg: f64,
}

impl IndexEntry {
    /// Derives the entry for a reference point.
    pub fn from_point(point: &ReferencePoint) -> Self {
        Self {
            x_theoretical: point.x,
            y_theoretical: point.y,
            z_theoretical: point.z,
            radius_theoretical: radial_distance(point.y, point.z),
            angle_theoretical_deg: probe_angle_deg(point.y, point.z),
        }
    }

    /// The theoretical point in Cartesian form.
    pub fn point(&self) -> CartesianPoint {
        CartesianPoint::new(self.x_theoretical, self.y_theoretical, self.z_theoretical)
    }
}

/// Spatial index answering nearest-theoretical-point queries.
#[derive(Debug, Clone)]
pub struct SurfaceIndex {
    /// Entries in first-insertion order; the fallback scan walks this.
    entries: Vec<(QuantizedKey, IndexEntry)>,
    /// Key to position in `entries`.
    slots: HashMap<QuantizedKey, usize>,
    config: IndexConfig,
    collisions: usize,
}

impl SurfaceIndex {
    /// Builds the index over a set of reference points.
    pub fn build(points: &[ReferencePoint], config: IndexConfig) -> Self {
        let mut index = Self {
            entries: Vec::with_capacity(points.len()),
            slots: HashMap::with_capacity(points.len()),
            config,
            collisions: 0,
        };

        let mut skipped = 0usize;
        for point in points {
            let entry = IndexEntry::from_point(point);
            match QuantizedKey::new(entry.x_theoretical, entry.angle_theoretical_deg) {
                Some(key) => index.insert(key, entry),
                None => skipped += 1,
            }
        }

        info!(
            points = points.len(),
            entries = index.entries.len(),
            collisions = index.collisions,
            skipped,
            "Surface index built"
        );

        index
    }

    fn insert(&mut self, key: QuantizedKey, entry: IndexEntry) {
        match self.slots.get(&key) {
            Some(&slot) => {
                self.entries[slot].1 = entry;
                self.collisions += 1;
            }
            None => {
                self.slots.insert(key, self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    /// Finds the theoretical point for a reading at `(x, angle_deg)`.
    pub fn find(&self, x: f64, angle_deg: f64) -> Option<&IndexEntry> {
        let key = QuantizedKey::new(x, angle_deg)?;

        if let Some(&slot) = self.slots.get(&key) {
            return Some(&self.entries[slot].1);
        }

        self.find_nearest(x, angle_deg)
    }

    /// Linear fallback: closest entry inside the tolerance window.
    fn find_nearest(&self, x: f64, angle_deg: f64) -> Option<&IndexEntry> {
        let mut best: Option<&IndexEntry> = None;
        let mut best_distance = f64::INFINITY;

        for (key, entry) in &self.entries {
            let dx = key.x() - x;
            let da = key.angle() - angle_deg;
            if dx.abs() > self.config.x_tolerance || da.abs() > self.config.angle_tolerance {
                continue;
            }

            let distance = (dx * dx + da * da).sqrt();
            if distance < best_distance {
                best_distance = distance;
                best = Some(entry);
            }
        }

        if best.is_some() {
            debug!(x, angle_deg, distance = best_distance, "Fallback index match");
        }
        best
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of points that overwrote an earlier point with the same key.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// The fallback tolerances in use.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Point at the given X whose probe angle is `angle_deg` on radius 500.
    fn point_at(x: f64, angle_deg: f64) -> ReferencePoint {
        let rad = angle_deg.to_radians();
        ReferencePoint::new(x, 500.0 * rad.cos(), 500.0 * rad.sin())
    }

    #[test]
    fn test_quantize_ties_go_to_even() {
        assert_eq!(quantize(0.25), 2);
        assert_eq!(quantize(0.75), 8);
        assert_eq!(quantize(1.25), 12);
        assert_eq!(quantize(-0.25), -2);
        assert_eq!(quantize(0.26), 3);
        assert_eq!(
            QuantizedKey::new(150.25, 44.75).unwrap(),
            QuantizedKey::new(150.2, 44.8).unwrap()
        );
    }

    #[test]
    fn test_quantized_key_rounds_to_tenths() {
        let key = QuantizedKey::new(150.04, 44.96).unwrap();
        assert_eq!(key, QuantizedKey::new(150.0, 45.0).unwrap());
        assert_eq!(key.x(), 150.0);
        assert_eq!(key.angle(), 45.0);
    }

    #[test]
    fn test_quantized_key_rejects_nan() {
        assert!(QuantizedKey::new(f64::NAN, 1.0).is_none());
        assert!(QuantizedKey::new(1.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_entry_values() {
        let entry = IndexEntry::from_point(&ReferencePoint::new(150.0, 353.55, 353.55));
        assert!((entry.angle_theoretical_deg - 45.0).abs() < 1e-12);
        assert!((entry.radius_theoretical - 499.9995).abs() < 1e-3);
        assert_eq!(entry.point(), ReferencePoint::new(150.0, 353.55, 353.55));
    }

    #[test]
    fn test_exact_lookup() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        let entry = index.find(150.0, 45.0).unwrap();
        assert_eq!(entry.x_theoretical, 150.0);
    }

    #[test]
    fn test_exact_lookup_after_rounding() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        assert!(index.find(150.04, 45.03).is_some());
    }

    #[test]
    fn test_fallback_within_tolerance() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        let entry = index.find(150.3, 45.4).unwrap();
        assert_eq!(entry.x_theoretical, 150.0);
    }

    #[test]
    fn test_fallback_outside_x_tolerance() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        assert!(index.find(152.0, 45.0).is_none());
    }

    #[test]
    fn test_fallback_outside_angle_tolerance() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        assert!(index.find(150.0, 46.5).is_none());
    }

    #[test]
    fn test_fallback_tolerance_is_inclusive() {
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], IndexConfig::default());
        assert!(index.find(150.5, 46.0).is_some());
    }

    #[test]
    fn test_fallback_picks_closest() {
        let index = SurfaceIndex::build(
            &[point_at(150.0, 45.0), point_at(150.0, 46.0)],
            IndexConfig::default(),
        );
        let entry = index.find(150.2, 45.7).unwrap();
        assert!((entry.angle_theoretical_deg - 46.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_tie_prefers_first_inserted() {
        let index = SurfaceIndex::build(
            &[point_at(150.0, 45.0), point_at(150.0, 46.0)],
            IndexConfig::default(),
        );
        // 45.5 is equidistant from both keys
        let entry = index.find(150.3, 45.5).unwrap();
        assert!((entry.angle_theoretical_deg - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_collision_last_write_wins() {
        let first = ReferencePoint::new(10.0, 500.0, 0.0);
        let second = ReferencePoint::new(10.02, 400.0, 0.0);
        let index = SurfaceIndex::build(&[first, second], IndexConfig::default());

        assert_eq!(index.len(), 1);
        assert_eq!(index.collisions(), 1);
        let entry = index.find(10.0, 0.0).unwrap();
        assert_eq!(entry.radius_theoretical, 400.0);
    }

    #[test]
    fn test_custom_tolerances() {
        let config = IndexConfig::default()
            .with_x_tolerance(3.0)
            .with_angle_tolerance(0.1);
        let index = SurfaceIndex::build(&[point_at(150.0, 45.0)], config);

        assert!(index.find(152.0, 45.0).is_some());
        assert!(index.find(150.3, 45.4).is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = SurfaceIndex::build(&[], IndexConfig::default());
        assert!(index.is_empty());
        assert!(index.find(0.0, 0.0).is_none());
    }
}
