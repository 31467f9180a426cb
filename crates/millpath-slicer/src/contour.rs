//! Closed contour loops produced by slicing.

use millpath_math::{signed_area_xy, Point2, Point3};
use serde::{Deserialize, Serialize};

/// A closed loop at a constant Z.
///
/// The first point is repeated as the last point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// Loop vertices in walk order, closed.
    pub points: Vec<Point3>,
}

impl Contour {
    /// Close `ring` (an open XY ring) at height `z`.
    pub fn from_ring(ring: &[Point2], z: f64) -> Self {
        let mut points: Vec<Point3> = ring.iter().map(|p| Point3::new(p.x, p.y, z)).collect();
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
        Self { points }
    }

    /// Number of stored points, including the closing duplicate.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the contour is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if the last point coincides with the first.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) if self.points.len() > 1 => (a - b).norm() < 1e-9,
            _ => false,
        }
    }

    /// Signed XY area. Positive for counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        let ring: Vec<Point2> = self.ring().collect();
        signed_area_xy(&ring)
    }

    /// Z height of the loop.
    pub fn z(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.z)
    }

    /// Reverse the winding order.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// XY points without the closing duplicate.
    fn ring(&self) -> impl Iterator<Item = Point2> + '_ {
        let n = if self.is_closed() {
            self.points.len() - 1
        } else {
            self.points.len()
        };
        self.points[..n].iter().map(|p| Point2::new(p.x, p.y))
    }
}
