#![warn(missing_docs)]

//! Stock simulation for checking toolpaths against the target surface.
//!
//! [`StockGrid`] voxelizes the block around a mesh, rasterizes the mesh
//! top surface per column, then removes material along every cut of a
//! [`Toolpath`](millpath_cam::Toolpath). [`StockGrid::summarize`] reports
//! how much was removed and how far the remaining stock sits above the
//! target.
//!
//! # Example
//!
//! ```ignore
//! use millpath_stocksim::StockGrid;
//!
//! let mut grid = StockGrid::new(&mesh, 0.5, 1.5)?;
//! grid.subtract_toolpath(&toolpath, &params);
//! let summary = grid.summarize();
//! println!("{:.1}% removed, max error {:.3} mm", summary.percent_removed, summary.max_error);
//! ```

mod grid;
mod summary;

pub use grid::{StockGrid, MAX_CELLS, MIN_CELL_SIZE};
pub use summary::{ColumnSample, StockGridSummary};

use thiserror::Error;

/// Errors from stock simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockSimError {
    /// The mesh has no vertices, so there is no block to build.
    #[error("mesh is empty")]
    EmptyMesh,

    /// The voxel count exceeds [`MAX_CELLS`].
    #[error("stock grid needs {0} cells, more than the supported maximum")]
    TooManyCells(usize),
}

/// Result type for stock simulation.
pub type Result<T> = std::result::Result<T, StockSimError>;
