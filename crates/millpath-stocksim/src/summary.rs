//! Removal and surface-error statistics.

use millpath_math::Point3;
use serde::{Deserialize, Serialize};

/// Remaining stock over one column with a known target height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    /// Column centre at the remaining stock height.
    pub position: Point3,
    /// Stock height above the target (mm), never negative.
    pub error: f64,
}

/// Result of [`StockGrid::summarize`](crate::StockGrid::summarize).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StockGridSummary {
    /// Removed voxels as a percentage.
    pub percent_removed: f64,
    /// Removed voxels as a fraction in `0..=1`.
    pub removed_fraction: f64,
    /// Mean column error (mm).
    pub average_error: f64,
    /// Smallest column error (mm).
    pub min_error: f64,
    /// Largest column error (mm).
    pub max_error: f64,
    /// Voxel edge length (mm).
    pub cell_size: f64,
    /// Number of sampled columns.
    pub column_count: usize,
    /// Grid origin (minimum corner).
    pub origin: [f64; 3],
    /// Voxel counts along X, Y and Z.
    pub dims: [usize; 3],
    /// Per-column samples.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub samples: Vec<ColumnSample>,
}
