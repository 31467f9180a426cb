#![warn(missing_docs)]

//! Constant-Z slicing for waterline machining.
//!
//! [`ZSlicer`] intersects a triangle mesh with a horizontal plane and returns
//! closed [`Contour`] loops, optionally offset outward by a cutter radius.
//!
//! # Example
//!
//! ```ignore
//! use millpath_slicer::ZSlicer;
//!
//! let slicer = ZSlicer::new(&mesh, 1e-4);
//! for z in [slicer.z_max() - 1.0, slicer.z_max() - 2.0] {
//!     let loops = slicer.slice(z, 3.0, true);
//!     println!("z={z}: {} loops", loops.len());
//! }
//! ```

pub mod contour;
pub mod error;
pub mod slice;

pub use contour::Contour;
pub use error::{Result, SlicerError};
pub use slice::{SliceMode, ZSlicer};
