//! Reference surface model.
//!
//! A reference cloud is the ideal surface of the workpiece, represented as a
//! discrete set of 3D points. It is loaded once per model and shared
//! read-only by the scan planner, the simulator, and (through the
//! [`SurfaceIndex`]) the analysis engine.
//!
//! # Example
//!
//! ```ignore
//! use probescan::reference::{ReferenceCloud, ReferenceModel};
//! use probescan::index::IndexConfig;
//!
//! let cloud = ReferenceCloud::load_csv(Path::new("data/semicylinder.csv"))?;
//! let model = ReferenceModel::build(cloud, IndexConfig::default());
//! println!("{} points, {} index entries", model.cloud().len(), model.index().len());
//! ```

mod csv;
mod error;
mod generator;

pub use csv::{parse_points, ALIAS_COLUMNS, CANONICAL_COLUMNS};
pub use error::{ReferenceError, ReferenceResult};
pub use generator::{generate_semicylinder, SemicylinderSpec};

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::coord::CartesianPoint;
use crate::index::{IndexConfig, SurfaceIndex};

/// A point of the reference cloud (mm).
pub type ReferencePoint = CartesianPoint;

/// An immutable reference point cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceCloud {
    points: Vec<ReferencePoint>,
}

impl ReferenceCloud {
    /// Creates a cloud from points.
    pub fn new(points: Vec<ReferencePoint>) -> Self {
        Self { points }
    }

    /// Loads a cloud from a CSV file.
    pub fn load_csv(path: &Path) -> ReferenceResult<Self> {
        let points = csv::read_points(path)?;
        info!(path = %path.display(), points = points.len(), "Loaded reference cloud");
        Ok(Self { points })
    }

    /// Writes the cloud to a CSV file with the canonical header.
    pub fn write_csv(&self, path: &Path) -> ReferenceResult<()> {
        csv::write_points(path, &self.points)?;
        info!(path = %path.display(), points = self.points.len(), "Wrote reference cloud");
        Ok(())
    }

    /// Generates a half-cylinder cloud.
    pub fn semicylinder(spec: &SemicylinderSpec) -> ReferenceResult<Self> {
        generate_semicylinder(spec).map(Self::new)
    }

    /// All points, in load order.
    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the cloud has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl From<Vec<ReferencePoint>> for ReferenceCloud {
    fn from(points: Vec<ReferencePoint>) -> Self {
        Self::new(points)
    }
}

/// A loaded model: the reference cloud plus its surface index.
///
/// Both halves are built once and shared read-only for every session run
/// against this model. Loading a new model means building a new
/// `ReferenceModel`.
#[derive(Debug, Clone)]
pub struct ReferenceModel {
    cloud: Arc<ReferenceCloud>,
    index: Arc<SurfaceIndex>,
}

impl ReferenceModel {
    /// Builds the surface index for a cloud.
    pub fn build(cloud: ReferenceCloud, config: IndexConfig) -> Self {
        let index = SurfaceIndex::build(cloud.points(), config);
        Self {
            cloud: Arc::new(cloud),
            index: Arc::new(index),
        }
    }

    /// Loads a CSV cloud and builds its index.
    pub fn load(path: &Path, config: IndexConfig) -> ReferenceResult<Self> {
        Ok(Self::build(ReferenceCloud::load_csv(path)?, config))
    }

    /// The shared reference cloud.
    pub fn cloud(&self) -> &Arc<ReferenceCloud> {
        &self.cloud
    }

    /// The shared surface index.
    pub fn index(&self) -> &Arc<SurfaceIndex> {
        &self.index
    }
}
