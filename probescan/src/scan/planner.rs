//! Scan path planning.
//!
//! The probe visits the reference cloud in a boustrophedon raster: the
//! carriage steps along X, and at each station the rotation stage sweeps
//! across the available angles, alternating direction from one station to
//! the next so the probe never has to rewind to a start angle.
//!
//! ```text
//!   angle ▲
//!     max │  ┌──┐  ┌──┐
//!         │  │  │  │  │
//!     min │──┘  └──┘  └──
//!         └──────────────► x
//!           x0 x1 x2 x3
//! ```
//!
//! Both steps snap to the nearest value actually present in the cloud, within
//! half a step. Values that fall between two targets are never visited.

use serde::Serialize;
use tracing::debug;

use super::params::ScanParameters;
use crate::coord::rotation_angle_deg;
use crate::reference::ReferencePoint;

/// Direction of the rotation sweep at one X station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepDirection {
    /// From the smallest angle to the largest.
    Forward,
    /// From the largest angle to the smallest.
    Reverse,
}

impl SweepDirection {
    /// Direction for the pass at `index`; even passes go forward.
    pub fn for_pass(index: usize) -> Self {
        if index % 2 == 0 {
            SweepDirection::Forward
        } else {
            SweepDirection::Reverse
        }
    }
}

/// The points visited at one X station, in visiting order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPass {
    /// X coordinate of the station.
    pub x: f64,
    /// Sweep direction.
    pub direction: SweepDirection,
    /// Points in visiting order.
    pub points: Vec<ReferencePoint>,
}

/// An ordered scan path over the reference cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPlan {
    passes: Vec<ScanPass>,
}

impl ScanPlan {
    /// The per-station passes in visiting order.
    pub fn passes(&self) -> &[ScanPass] {
        &self.passes
    }

    /// The selected X stations.
    pub fn x_positions(&self) -> Vec<f64> {
        self.passes.iter().map(|pass| pass.x).collect()
    }

    /// All points in scan order.
    pub fn points(&self) -> impl Iterator<Item = &ReferencePoint> + '_ {
        self.passes.iter().flat_map(|pass| pass.points.iter())
    }

    /// Total number of points to measure.
    pub fn len(&self) -> usize {
        self.passes.iter().map(|pass| pass.points.len()).sum()
    }

    /// Returns `true` if there is nothing to measure.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the plan, returning the points in scan order.
    pub fn into_points(self) -> Vec<ReferencePoint> {
        self.passes
            .into_iter()
            .flat_map(|pass| pass.points.into_iter())
            .collect()
    }
}

/// Computes scan plans for a set of parameters.
#[derive(Debug, Clone, Copy)]
pub struct ScanPlanner {
    params: ScanParameters,
}

impl ScanPlanner {
    /// Creates a planner. Parameters are expected to be validated.
    pub fn new(params: ScanParameters) -> Self {
        Self { params }
    }

    /// Plans the scan path over `cloud`.
    ///
    /// The result depends only on the coordinates in the cloud, not on the
    /// order the points were loaded in.
    pub fn plan(&self, cloud: &[ReferencePoint]) -> ScanPlan {
        let p = &self.params;

        let in_range: Vec<&ReferencePoint> = cloud
            .iter()
            .filter(|pt| pt.x >= p.x_min && pt.x <= p.x_max)
            .collect();

        let mut x_values: Vec<f64> = in_range.iter().map(|pt| pt.x).collect();
        x_values.sort_by(f64::total_cmp);
        x_values.dedup();

        let mut stations = snap_steps(&x_values, p.x_min, p.x_max, p.x_step, StepOrder::Ascending);
        stations.dedup();

        let mut passes = Vec::with_capacity(stations.len());
        for (i, &slot) in stations.iter().enumerate() {
            let x = x_values[slot];
            let direction = SweepDirection::for_pass(i);

            let mut at_station: Vec<(f64, &ReferencePoint)> = in_range
                .iter()
                .filter(|pt| pt.x == x)
                .map(|&pt| (rotation_angle_deg(pt.y, pt.z), pt))
                .collect();
            at_station.sort_by(|a, b| a.0.total_cmp(&b.0));

            let angles: Vec<f64> = at_station.iter().map(|(angle, _)| *angle).collect();
            let (Some(&min_angle), Some(&max_angle)) = (angles.first(), angles.last()) else {
                continue;
            };

            let order = match direction {
                SweepDirection::Forward => StepOrder::Ascending,
                SweepDirection::Reverse => StepOrder::Descending,
            };
            let points = snap_steps(&angles, min_angle, max_angle, p.rot_step, order)
                .into_iter()
                .map(|slot| *at_station[slot].1)
                .collect();

            passes.push(ScanPass {
                x,
                direction,
                points,
            });
        }

        let plan = ScanPlan { passes };
        debug!(
            in_range = in_range.len(),
            stations = plan.passes.len(),
            points = plan.len(),
            "Scan plan computed"
        );
        plan
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOrder {
    Ascending,
    Descending,
}

/// Walks targets `start, start ± step, …` across `[lo, hi]` and snaps each to
/// the nearest value in `sorted` within `step / 2`.
///
/// Returns one index into `sorted` per target that found a value. A value
/// exactly half a step from two targets is picked by both.
fn snap_steps(sorted: &[f64], lo: f64, hi: f64, step: f64, order: StepOrder) -> Vec<usize> {
    let mut picked: Vec<usize> = Vec::new();
    if sorted.is_empty() || step <= 0.0 || !step.is_finite() {
        return picked;
    }

    let half_step = step / 2.0;
    let mut k = 0u64;
    loop {
        let target = match order {
            StepOrder::Ascending => lo + k as f64 * step,
            StepOrder::Descending => hi - k as f64 * step,
        };
        let in_bounds = match order {
            StepOrder::Ascending => target <= hi,
            StepOrder::Descending => target >= lo,
        };
        if !in_bounds {
            break;
        }

        if let Some(slot) = nearest(sorted, target) {
            if (sorted[slot] - target).abs() <= half_step {
                picked.push(slot);
            }
        }
        k += 1;
    }

    picked
}

/// Index of the value nearest to `target` in an ascending slice.
///
/// On equal distance the lower index wins, and among equal values the first
/// occurrence is returned.
fn nearest(sorted: &[f64], target: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }

    let upper = sorted.partition_point(|&v| v < target);
    let chosen = match (upper.checked_sub(1), sorted.get(upper)) {
        (Some(lower), Some(&above)) => {
            if (target - sorted[lower]).abs() <= (above - target).abs() {
                lower
            } else {
                upper
            }
        }
        (Some(lower), None) => lower,
        (None, _) => upper,
    };

    // Step back to the first of a run of equal values
    let value = sorted[chosen];
    Some(sorted[..chosen].partition_point(|&v| v < value))
}
