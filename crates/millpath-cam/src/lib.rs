#![warn(missing_docs)]

//! 3-axis toolpath planning over triangle meshes.
//!
//! [`ToolpathGenerator`] turns a [`Mesh`](millpath_mesh::Mesh) and a set of
//! [`UserParams`] into a [`Toolpath`]: raster passes that follow a cached
//! drop-sampled [`HeightField`](dropcutter::HeightField), waterline passes
//! from constant-Z slices, or a flat fallback raster, wrapped in ramp,
//! helix and retract motion.
//!
//! # Example
//!
//! ```
//! use millpath_cam::{DefaultStrategy, JobControl, ToolpathGenerator, UserParams};
//! use millpath_mesh::Mesh;
//!
//! // A 20 x 20 plate at z = 0.
//! let mesh = Mesh::from_positions(
//!     vec![0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 20.0, 20.0, 0.0, 0.0, 20.0, 0.0],
//!     vec![0, 1, 2, 0, 2, 3],
//! );
//!
//! let mut params = UserParams::default();
//! params.stock.top_z = 2.0;
//!
//! let generator = ToolpathGenerator::default();
//! let toolpath = generator
//!     .generate(&mesh, &params, &DefaultStrategy, &JobControl::new())
//!     .unwrap();
//! assert!(toolpath.cut_count() > 0);
//! ```

pub mod control;
pub mod dropcutter;
mod error;
pub mod generator;
pub mod gouge;
pub mod params;
pub mod strategy;
pub mod tool;
pub mod tool_library;
pub mod toolpath;

pub use control::{JobControl, PassProgress};
pub use dropcutter::{HeightField, HeightFieldCache, TriangleGrid, UniformGrid};
pub use error::{CamError, Result};
pub use generator::{PassProfile, PassRole, ToolpathGenerator};
pub use gouge::{GougeChecker, GougeParams, LeaveStockAdjustment};
pub use params::{CutDirection, Machine, PostParams, Stock, StockShape, UserParams};
pub use strategy::{DefaultStrategy, FixedStrategy, StrategyDecision, StrategyKind, StrategyPredictor, StrategyStep};
pub use tool::CutterType;
pub use tool_library::{Tool, ToolLibrary};
pub use toolpath::{MotionType, Polyline, Toolpath};
