//! Surface clearance checks for cutting paths.

use millpath_math::{Point3, Vec3};
use millpath_mesh::Mesh;
use serde::{Deserialize, Serialize};

use crate::dropcutter::{CandidateScratch, GridTriangle, TriangleGrid};

/// Faces steeper than this (|nz| at or below) are ignored.
const MIN_FACE_NZ: f64 = 0.1;
const ABOVE_TOLERANCE: f64 = 1e-4;
const MAX_RING: usize = 3;

/// Tool and limit settings for clearance checks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GougeParams {
    /// Cutter radius (mm).
    pub tool_radius: f64,
    /// Holder radius (mm).
    pub holder_radius: f64,
    /// Required clearance above the surface (mm).
    pub leave_stock: f64,
    /// Highest Z a path may be lifted to. Zero or less means unlimited.
    pub safety_z: f64,
}

/// Outcome of [`GougeChecker::adjust_z_for_leave_stock`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveStockAdjustment {
    /// The path, lifted if needed.
    pub path: Vec<Point3>,
    /// Clearance of the returned path.
    pub min_clearance: f64,
    /// True if any point moved.
    pub adjusted: bool,
    /// False when the target could not be met within the safety limit.
    pub ok: bool,
    /// Reason for a failed adjustment.
    pub message: Option<String>,
}

/// Closest-surface queries against a mesh.
#[derive(Debug, Clone)]
pub struct GougeChecker {
    grid: TriangleGrid,
    scratch: CandidateScratch,
}

impl GougeChecker {
    /// Index `mesh` with an auto-sized grid.
    pub fn new(mesh: &Mesh) -> Self {
        let grid = TriangleGrid::build(mesh, 0.0);
        let scratch = grid.scratch();
        Self { grid, scratch }
    }

    /// Closest surface point to `p` that is not above it.
    ///
    /// Searches rings of 1, 2 and 3 cells until something qualifies.
    pub fn closest_point(&mut self, p: &Point3) -> Option<Point3> {
        for ring in 1..=MAX_RING {
            let candidates = self.grid.gather_candidates_xy(&mut self.scratch, p.x, p.y, ring);
            let mut best: Option<(f64, Point3)> = None;
            for &t in candidates {
                let tri = self.grid.triangle(t);
                if tri.normal.z.abs() <= MIN_FACE_NZ {
                    continue;
                }
                let cp = closest_point_on_triangle(p, tri);
                if cp.z > p.z + ABOVE_TOLERANCE {
                    continue;
                }
                let d2 = (cp - p).norm_squared();
                match best {
                    Some((bd, _)) if bd <= d2 => {}
                    _ => best = Some((d2, cp)),
                }
            }
            if let Some((_, cp)) = best {
                return Some(cp);
            }
        }
        None
    }

    /// Z of the closest surface point to (x, y, z).
    pub fn surface_height_at(&mut self, x: f64, y: f64, z: f64) -> Option<f64> {
        self.closest_point(&Point3::new(x, y, z)).map(|p| p.z)
    }

    /// Smallest height of `path` above the surface, sampled along each
    /// segment. `+inf` when nothing was found below the path.
    pub fn min_clearance_along(&mut self, path: &[Point3], params: &GougeParams) -> f64 {
        let mut min = f64::INFINITY;
        if path.len() < 2 {
            return min;
        }
        let spacing = (params.tool_radius * 0.5).max(0.5);
        for w in path.windows(2) {
            let delta = w[1] - w[0];
            let samples = ((delta.norm() / spacing).ceil() as usize).max(1);
            for s in 0..=samples {
                let p = w[0] + delta * (s as f64 / samples as f64);
                if let Some(surface) = self.surface_height_at(p.x, p.y, p.z) {
                    min = min.min(p.z - surface);
                }
            }
        }
        min
    }

    /// Lift `path` uniformly until it clears the surface by
    /// `params.leave_stock`, without crossing `params.safety_z`.
    pub fn adjust_z_for_leave_stock(
        &mut self,
        path: &[Point3],
        params: &GougeParams,
    ) -> LeaveStockAdjustment {
        let mut result = LeaveStockAdjustment {
            path: path.to_vec(),
            min_clearance: f64::INFINITY,
            adjusted: false,
            ok: true,
            message: None,
        };
        if path.is_empty() {
            return result;
        }
        let clearance = self.min_clearance_along(path, params);
        result.min_clearance = clearance;
        let target = params.leave_stock;
        if target <= 1e-6 {
            return result;
        }
        let effective = if clearance.is_finite() { clearance } else { 0.0 };
        if effective + 1e-4 >= target {
            return result;
        }

        let mut deficit = target - effective;
        if params.safety_z > 0.0 {
            let max_z = path.iter().map(|p| p.z).fold(f64::NEG_INFINITY, f64::max);
            let available = params.safety_z - max_z;
            if available <= 1e-4 || available + 1e-4 < deficit {
                result.ok = false;
                result.message = Some("clearance would exceed safety Z".to_string());
                return result;
            }
            deficit = deficit.min(available);
        }

        let lift = Vec3::new(0.0, 0.0, deficit);
        for p in &mut result.path {
            *p += lift;
        }
        result.adjusted = deficit > 1e-6;
        result.min_clearance = effective + deficit;
        result
    }
}

/// Closest point on a triangle by Voronoi region classification.
fn closest_point_on_triangle(p: &Point3, tri: &GridTriangle) -> Point3 {
    let [a, b, c] = tri.v;
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && d4 - d3 >= 0.0 && d5 - d6 >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom <= 1e-6 {
        return a;
    }
    a + ab * (vb / denom) + ac * (vc / denom)
}
