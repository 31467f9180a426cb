#![warn(missing_docs)]

//! Math types for the millpath toolpath planner.
//!
//! Thin wrappers around nalgebra providing the point and vector types
//! used across the planner, an axis-aligned box, planar rotation helpers
//! for raster scanning, and shared tolerance constants.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space (mm).
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in the XY plane (mm).
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in the XY plane.
pub type Vec2 = Vector2<f64>;

/// Tolerance below which two positions are treated as the same point (mm).
pub const POSITION_EPSILON: f64 = 1e-4;

/// Tolerance for degenerate lengths (mm).
pub const DEGENERATE_LENGTH: f64 = 1e-6;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Create a box from two corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any point will grow.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Build the tightest box around `points`, or `None` if there are none.
    pub fn from_points<I: IntoIterator<Item = Point3>>(points: I) -> Option<Self> {
        let mut bounds = Self::empty();
        let mut any = false;
        for p in points {
            bounds.include(&p);
            any = true;
        }
        any.then_some(bounds)
    }

    /// Grow the box to contain `p`.
    pub fn include(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// True if every extent is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let s = self.size();
        s.iter().all(|v| v.is_finite() && *v >= 0.0)
    }

    /// True if the XY projection has non-zero area.
    pub fn has_xy_area(&self) -> bool {
        let s = self.size();
        self.is_valid() && s.x > DEGENERATE_LENGTH && s.y > DEGENERATE_LENGTH
    }

    /// Box expanded by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vec3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// True if (x, y) lies inside the XY projection, within `eps`.
    pub fn contains_xy(&self, x: f64, y: f64, eps: f64) -> bool {
        x >= self.min.x - eps && x <= self.max.x + eps && y >= self.min.y - eps && y <= self.max.y + eps
    }
}

/// Rotate `(x, y)` about the origin by `angle` radians.
pub fn rotate_xy(x: f64, y: f64, angle: f64) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    (x * c - y * s, x * s + y * c)
}

/// Horizontal distance between two points.
pub fn distance_xy(a: &Point3, b: &Point3) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Signed area of a closed XY polygon (shoelace formula).
///
/// Positive for counter-clockwise winding.
pub fn signed_area_xy(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}
