//! Scan parameters and boustrophedon path planning.
//!
//! # Example
//!
//! ```ignore
//! use probescan::scan::{ScanParameters, ScanPlanner};
//!
//! let params = ScanParameters::new(0.0, 200.0).with_x_step(20.0);
//! params.validate()?;
//! let plan = ScanPlanner::new(params).plan(cloud.points());
//! for pass in plan.passes() {
//!     println!("x={} {:?} {} points", pass.x, pass.direction, pass.points.len());
//! }
//! ```

mod params;
mod planner;

pub use params::{
    ScanError, ScanParameters, DEFAULT_MEASUREMENT_DELAY, DEFAULT_ROT_STEP, DEFAULT_X_MAX,
    DEFAULT_X_MIN, DEFAULT_X_STEP,
};
pub use planner::{ScanPass, ScanPlan, ScanPlanner, SweepDirection};
