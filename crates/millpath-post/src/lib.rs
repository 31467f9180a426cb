#![warn(missing_docs)]

//! G-code post-processing for millpath toolpaths.
//!
//! A [`PostFlavor`] selects a [`PostConfig`] record describing a controller
//! dialect. [`generate_gcode`] renders the record's header and footer
//! templates, prints a banner at each strategy step, and writes motion,
//! fitting G2/G3 arcs to flat cut runs when the dialect allows it.
//!
//! # Example
//!
//! ```
//! use millpath_cam::{Polyline, PostParams, Toolpath};
//! use millpath_math::Point3;
//! use millpath_post::{generate_gcode, PostFlavor, Units};
//!
//! let toolpath = Toolpath {
//!     polylines: vec![Polyline::cut(vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(10.0, 0.0, -1.0),
//!     ])],
//!     feed: 1200.0,
//!     ..Default::default()
//! };
//! let flavor: PostFlavor = "grbl".parse().unwrap();
//! let gcode = generate_gcode(&toolpath, flavor, Units::Millimeters, &PostParams::default());
//! assert!(gcode.contains("G1 X10.000 Y0.000 Z-1.000"));
//! ```

pub mod arcfit;
pub mod emit;
mod error;
pub mod flavor;
pub mod template;
pub mod units;

pub use arcfit::{fit_arc, ArcFit};
pub use emit::{generate_gcode, GcodePost};
pub use error::{PostError, Result};
pub use flavor::{MoveStyle, PostConfig, PostFlavor};
pub use template::{render, TemplateContext};
pub use units::Units;
