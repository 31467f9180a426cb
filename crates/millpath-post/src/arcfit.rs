//! Circular arc fitting over flat-Z point runs.

use std::f64::consts::TAU;

use millpath_math::{Point2, Point3, Vec2, DEGENERATE_LENGTH};

/// Smallest sweep worth emitting as an arc (radians).
pub const MIN_SWEEP: f64 = 0.006;

const COLLINEAR_EPS: f64 = 1e-9;

/// A fitted arc from `points[start]` to `points[end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcFit {
    /// Index of the last point covered by the arc.
    pub end: usize,
    /// Arc centre.
    pub center: Point2,
    /// Radius (mm).
    pub radius: f64,
    /// True for G2.
    pub clockwise: bool,
    /// Total swept angle (radians).
    pub sweep: f64,
}

/// Circle through three XY points, or `None` when they are collinear.
pub fn circle_from_points(a: Point2, b: Point2, c: Point2) -> Option<(Point2, f64)> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() <= COLLINEAR_EPS {
        return None;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Point2::new(ux, uy);
    let radius = (a - center).norm();
    (radius > DEGENERATE_LENGTH).then_some((center, radius))
}

fn xy(p: &Point3) -> Point2 {
    Point2::new(p.x, p.y)
}

fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Try to cover `points[start..=end]` with one arc within `tolerance`.
///
/// The circle passes through both ends and the interior point farthest
/// from the chord. Every point must lie within `tolerance` of the circle,
/// and every segment's sagitta must stay within it too.
pub fn fit_arc(points: &[Point3], start: usize, end: usize, tolerance: f64) -> Option<ArcFit> {
    if end >= points.len() || end < start + 2 {
        return None;
    }
    let s = &points[start];
    let e = &points[end];
    if (e - s).norm() <= DEGENERATE_LENGTH {
        return None;
    }
    let s2 = xy(s);
    let chord = xy(e) - s2;

    let (pivot, spread) = (start + 1..end)
        .map(|i| (i, cross(&chord, &(xy(&points[i]) - s2)).abs()))
        .fold((start + 1, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if spread <= COLLINEAR_EPS {
        return None;
    }
    let (center, radius) = circle_from_points(s2, xy(&points[pivot]), xy(e))?;

    let run = &points[start..=end];
    if run
        .iter()
        .any(|p| ((xy(p) - center).norm() - radius).abs() > tolerance)
    {
        return None;
    }

    let mut turn = 0.0;
    let mut winding = 0.0;
    for w in run.windows(2) {
        let a = xy(&w[0]) - center;
        let b = xy(&w[1]) - center;
        let half = (xy(&w[1]) - xy(&w[0])).norm() * 0.5;
        let sagitta = if half >= radius {
            radius
        } else {
            radius - (radius * radius - half * half).sqrt()
        };
        if sagitta > tolerance + 1e-9 {
            return None;
        }
        let c = cross(&a, &b);
        winding += c;
        turn += c.atan2(a.dot(&b));
    }

    let sweep = turn.abs();
    if !(MIN_SWEEP..TAU - 1e-3).contains(&sweep) {
        return None;
    }
    Some(ArcFit {
        end,
        center,
        radius,
        clockwise: winding < 0.0,
        sweep,
    })
}
