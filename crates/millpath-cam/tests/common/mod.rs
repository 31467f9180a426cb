//! Mesh builders and path checks shared by the integration tests.

#![allow(dead_code)]

use millpath_cam::{FixedStrategy, MotionType, Polyline, StrategyKind, StrategyStep};
use millpath_math::Point3;
use millpath_mesh::Mesh;

/// Regular grid of `divisions` x `divisions` quads over `width` x `depth`,
/// two triangles per quad, with heights from `height`.
pub fn grid_mesh(width: f64, depth: f64, divisions: usize, height: impl Fn(f64, f64) -> f64) -> Mesh {
    let samples = divisions + 1;
    let step_x = width / divisions as f64;
    let step_y = depth / divisions as f64;

    let mut positions = Vec::with_capacity(samples * samples * 3);
    for row in 0..samples {
        for col in 0..samples {
            let x = col as f64 * step_x;
            let y = row as f64 * step_y;
            positions.extend([x as f32, y as f32, height(x, y) as f32]);
        }
    }

    let mut indices = Vec::with_capacity(divisions * divisions * 6);
    for row in 0..divisions {
        for col in 0..divisions {
            let base = (row * samples + col) as u32;
            let s = samples as u32;
            indices.extend([base, base + 1, base + s, base + 1, base + s + 1, base + s]);
        }
    }
    Mesh::from_positions(positions, indices)
}

/// Open pocket: z = -`pocket_depth` inside the middle 60 % of the square,
/// 0 elsewhere.
pub fn pocket(size: f64, pocket_depth: f64, divisions: usize) -> Mesh {
    grid_mesh(size, size, divisions, |x, y| {
        let inside = |v: f64| v >= size * 0.2 && v <= size * 0.8;
        if inside(x) && inside(y) {
            -pocket_depth
        } else {
            0.0
        }
    })
}

/// Predictor that always answers with one finishing step.
pub fn single_step(kind: StrategyKind, stepover: f64, stepdown: f64, angle_deg: f64) -> FixedStrategy {
    FixedStrategy::new(vec![StrategyStep {
        kind,
        stepover,
        stepdown,
        angle_deg,
        finish_pass: true,
    }])
}

pub fn horizontal(a: &Point3, b: &Point3) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Cut with horizontal travel at a single height.
pub fn is_flat_cut(poly: &Polyline, min_points: usize, z_tol: f64) -> bool {
    if poly.motion != MotionType::Cut || poly.points.len() < min_points {
        return false;
    }
    let mut max_h: f64 = 0.0;
    let mut max_v: f64 = 0.0;
    for w in poly.points.windows(2) {
        max_h = max_h.max(horizontal(&w[0], &w[1]));
        max_v = max_v.max((w[0].z - w[1].z).abs());
    }
    max_h > 1e-3 && max_v < z_tol
}

pub fn signed_area(points: &[Point3]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        * 0.5
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: (f64, f64),
    b: (f64, f64),
}

impl Segment {
    fn boxes_overlap(&self, other: &Segment, tol: f64) -> bool {
        let (min_x, max_x) = (self.a.0.min(self.b.0), self.a.0.max(self.b.0));
        let (min_y, max_y) = (self.a.1.min(self.b.1), self.a.1.max(self.b.1));
        let (o_min_x, o_max_x) = (other.a.0.min(other.b.0), other.a.0.max(other.b.0));
        let (o_min_y, o_max_y) = (other.a.1.min(other.b.1), other.a.1.max(other.b.1));
        max_x >= o_min_x - tol && min_x <= o_max_x + tol && max_y >= o_min_y - tol && min_y <= o_max_y + tol
    }

    fn shares_endpoint(&self, other: &Segment, tol: f64) -> bool {
        let close = |p: (f64, f64), q: (f64, f64)| ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt() <= tol;
        close(self.a, other.a) || close(self.a, other.b) || close(self.b, other.a) || close(self.b, other.b)
    }

    fn intersects_strictly(&self, other: &Segment, tol: f64) -> bool {
        if !self.boxes_overlap(other, tol) || self.shares_endpoint(other, tol) {
            return false;
        }
        let cross = |u: (f64, f64), v: (f64, f64)| u.0 * v.1 - u.1 * v.0;
        let d1 = (self.b.0 - self.a.0, self.b.1 - self.a.1);
        let d2 = (other.b.0 - other.a.0, other.b.1 - other.a.1);
        let diff = (other.a.0 - self.a.0, other.a.1 - self.a.1);
        let denom = cross(d1, d2);

        if denom.abs() <= tol {
            if cross(diff, d1).abs() > tol {
                return false;
            }
            let len_sq = d1.0 * d1.0 + d1.1 * d1.1;
            if len_sq <= tol * tol {
                return false;
            }
            let start = (diff.0 * d1.0 + diff.1 * d1.1) / len_sq;
            let end = start + (d2.0 * d1.0 + d2.1 * d1.1) / len_sq;
            return start.max(end) > tol && start.min(end) < 1.0 - tol;
        }

        let t = cross(diff, d2) / denom;
        let u = cross(diff, d1) / denom;
        t > tol && t < 1.0 - tol && u > tol && u < 1.0 - tol
    }
}

/// Whether two non-adjacent XY segments of `poly` cross.
pub fn has_self_intersection(poly: &Polyline, tol: f64) -> bool {
    let mut segments = Vec::with_capacity(poly.points.len());
    let Some(first) = poly.points.first() else {
        return false;
    };
    let mut previous = (first.x, first.y);
    for p in &poly.points[1..] {
        let current = (p.x, p.y);
        if ((current.0 - previous.0).powi(2) + (current.1 - previous.1).powi(2)).sqrt() > tol {
            segments.push(Segment { a: previous, b: current });
        }
        previous = current;
    }

    let count = segments.len();
    for i in 0..count {
        for j in (i + 2)..count {
            if i == 0 && j == count - 1 && segments[i].shares_endpoint(&segments[j], tol) {
                continue;
            }
            if segments[i].intersects_strictly(&segments[j], tol) {
                return true;
            }
        }
    }
    false
}

/// Smallest and largest Z of `poly`.
pub fn z_extent(poly: &Polyline) -> (f64, f64) {
    poly.points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)))
}
