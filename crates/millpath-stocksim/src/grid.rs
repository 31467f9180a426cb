//! Voxel occupancy grid over the stock block.

use millpath_cam::{CutterType, MotionType, Toolpath, UserParams};
use millpath_math::{Point3, Vec3, DEGENERATE_LENGTH};
use millpath_mesh::Mesh;
use tracing::{debug, info};

use crate::summary::{ColumnSample, StockGridSummary};
use crate::{Result, StockSimError};

/// Smallest accepted voxel edge (mm).
pub const MIN_CELL_SIZE: f64 = 0.05;

/// Largest voxel count a grid may allocate.
pub const MAX_CELLS: usize = 64 * 1024 * 1024;

const EPS: f64 = 1e-9;

/// Occupancy voxels plus the per-column target surface height.
///
/// Voxels are stored X-fastest, then Y, then Z. A column's target is the
/// highest mesh point under its centre, or `None` where the mesh does not
/// cover it.
#[derive(Debug, Clone)]
pub struct StockGrid {
    cell: f64,
    origin: Point3,
    dims: [usize; 3],
    cells: Vec<bool>,
    removed: usize,
    target: Vec<Option<f64>>,
}

impl StockGrid {
    /// Build a full block around `mesh`, grown by `margin` on every side.
    pub fn new(mesh: &Mesh, cell_size: f64, margin: f64) -> Result<Self> {
        let bounds = mesh.bounds().ok_or(StockSimError::EmptyMesh)?;
        let cell = cell_size.max(MIN_CELL_SIZE);
        let margin = margin.max(0.0);
        let origin = bounds.min - Vec3::repeat(margin);
        let extent = (bounds.max + Vec3::repeat(margin)) - origin;

        let axis = |e: f64| ((e.max(cell) / cell).ceil() as usize).max(1);
        let dims = [axis(extent.x), axis(extent.y), axis(extent.z)];
        let total = dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .filter(|t| *t <= MAX_CELLS)
            .ok_or(StockSimError::TooManyCells(
                dims[0].saturating_mul(dims[1]).saturating_mul(dims[2]),
            ))?;

        let mut grid = Self {
            cell,
            origin,
            dims,
            cells: vec![true; total],
            removed: 0,
            target: vec![None; dims[0] * dims[1]],
        };
        grid.rasterize_target(mesh);
        info!(
            nx = dims[0],
            ny = dims[1],
            nz = dims[2],
            cell,
            "stock grid built"
        );
        Ok(grid)
    }

    /// Voxel edge length (mm).
    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    /// Minimum corner of the grid.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Voxel counts along X, Y and Z.
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// True if the voxel still holds material. Out-of-range indices are empty.
    pub fn occupied(&self, ix: usize, iy: usize, iz: usize) -> bool {
        let [nx, ny, nz] = self.dims;
        ix < nx && iy < ny && iz < nz && self.cells[self.cell_index(ix, iy, iz)]
    }

    /// Target surface height of a column, if the mesh covers it.
    pub fn target_height(&self, ix: usize, iy: usize) -> Option<f64> {
        if ix >= self.dims[0] || iy >= self.dims[1] {
            return None;
        }
        self.target[self.column_index(ix, iy)]
    }

    fn cell_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (iz * self.dims[1] + iy) * self.dims[0] + ix
    }

    fn column_index(&self, ix: usize, iy: usize) -> usize {
        iy * self.dims[0] + ix
    }

    fn center(&self, axis: usize, i: usize) -> f64 {
        self.origin[axis] + (i as f64 + 0.5) * self.cell
    }

    /// Clamped cell range covering `lo..=hi` along `axis`.
    fn span(&self, axis: usize, lo: f64, hi: f64) -> (usize, usize) {
        let last = self.dims[axis] as f64 - 1.0;
        let clamp = |v: f64| v.clamp(0.0, last) as usize;
        let o = self.origin[axis];
        (
            clamp(((lo - o) / self.cell).floor()),
            clamp(((hi - o) / self.cell).ceil()),
        )
    }

    /// First Z index whose centre is at or above `z`.
    fn z_start(&self, z: f64) -> usize {
        ((z - self.origin.z) / self.cell - 0.5).ceil().max(0.0) as usize
    }

    fn rasterize_target(&mut self, mesh: &Mesh) {
        let mut covered = 0usize;
        for (_, [a, b, c]) in mesh.triangles() {
            let n = (b - a).cross(&(c - a));
            if !n.iter().all(|v| v.is_finite()) || n.norm_squared() <= EPS {
                continue;
            }
            let (ix0, ix1) = self.span(0, a.x.min(b.x).min(c.x), a.x.max(b.x).max(c.x));
            let (iy0, iy1) = self.span(1, a.y.min(b.y).min(c.y), a.y.max(b.y).max(c.y));
            for ix in ix0..=ix1 {
                let x = self.center(0, ix);
                for iy in iy0..=iy1 {
                    let y = self.center(1, iy);
                    let Some([wa, wb, wc]) = barycentric_xy(x, y, &a, &b, &c) else {
                        continue;
                    };
                    let z = wa * a.z + wb * b.z + wc * c.z;
                    let slot = &mut self.target[iy * self.dims[0] + ix];
                    if slot.is_none() {
                        covered += 1;
                    }
                    *slot = Some(slot.map_or(z, |s| s.max(z)));
                }
            }
        }
        debug!(covered, columns = self.target.len(), "target surface rasterized");
    }

    fn reset(&mut self) {
        self.cells.fill(true);
        self.removed = 0;
    }

    /// Remove the material swept by every cut in `toolpath`.
    ///
    /// Occupancy is reset first, so repeated calls do not accumulate.
    pub fn subtract_toolpath(&mut self, toolpath: &Toolpath, params: &UserParams) {
        self.reset();
        let radius = (params.tool_diameter * 0.5).max(MIN_CELL_SIZE);
        let ball = params.cutter == CutterType::BallNose;
        let step = (self.cell * 0.5).max(0.1);

        for poly in toolpath.polylines.iter().filter(|p| p.motion == MotionType::Cut) {
            for w in poly.points.windows(2) {
                let (start, end) = (w[0], w[1]);
                let length = (end - start).norm();
                if length <= DEGENERATE_LENGTH {
                    self.remove_sample(&start, radius, ball);
                    continue;
                }
                let segments = ((length / step).ceil() as usize).max(1);
                for s in 0..=segments {
                    let t = s as f64 / segments as f64;
                    self.remove_sample(&(start + (end - start) * t), radius, ball);
                }
            }
        }
        debug!(
            removed = self.removed,
            total = self.cells.len(),
            "toolpath subtracted"
        );
    }

    fn remove_sample(&mut self, p: &Point3, radius: f64, ball: bool) {
        let reach = radius + self.cell * 1.1;
        let (ix0, ix1) = self.span(0, p.x - reach, p.x + reach);
        let (iy0, iy1) = self.span(1, p.y - reach, p.y + reach);
        let r2 = radius * radius;
        let nz = self.dims[2];

        for ix in ix0..=ix1 {
            let dx = self.center(0, ix) - p.x;
            for iy in iy0..=iy1 {
                let dy = self.center(1, iy) - p.y;
                let d2 = dx * dx + dy * dy;
                if d2 > r2 + self.cell * self.cell || d2.sqrt() > radius + self.cell {
                    continue;
                }
                let floor_z = if ball {
                    if d2.sqrt() > radius + EPS {
                        continue;
                    }
                    p.z + radius - (r2 - d2).max(0.0).sqrt()
                } else {
                    p.z
                };
                let mut iz0 = self.z_start(floor_z);
                if let Some(target) = self.target[self.column_index(ix, iy)] {
                    iz0 = iz0.max(self.z_start(target));
                }
                for iz in iz0..nz {
                    let idx = self.cell_index(ix, iy, iz);
                    if self.cells[idx] {
                        self.cells[idx] = false;
                        self.removed += 1;
                    }
                }
            }
        }
    }

    fn column_stock_height(&self, ix: usize, iy: usize) -> f64 {
        (0..self.dims[2])
            .rev()
            .find(|&iz| self.cells[self.cell_index(ix, iy, iz)])
            .map_or(self.origin.z - 0.5 * self.cell, |iz| self.center(2, iz))
    }

    /// Removal statistics and per-column error against the target surface.
    pub fn summarize(&self) -> StockGridSummary {
        let total = self.cells.len();
        let fraction = if total == 0 {
            0.0
        } else {
            self.removed as f64 / total as f64
        };
        let mut summary = StockGridSummary {
            percent_removed: fraction * 100.0,
            removed_fraction: fraction,
            cell_size: self.cell,
            origin: [self.origin.x, self.origin.y, self.origin.z],
            dims: self.dims,
            ..Default::default()
        };

        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for iy in 0..self.dims[1] {
            for ix in 0..self.dims[0] {
                let Some(target) = self.target[self.column_index(ix, iy)] else {
                    continue;
                };
                let stock = self.column_stock_height(ix, iy).max(target);
                let error = stock - target;
                summary.samples.push(ColumnSample {
                    position: Point3::new(self.center(0, ix), self.center(1, iy), stock),
                    error,
                });
                sum += error;
                min = min.min(error);
                max = max.max(error);
            }
        }

        summary.column_count = summary.samples.len();
        if summary.column_count > 0 {
            summary.average_error = sum / summary.column_count as f64;
            summary.min_error = min;
            summary.max_error = max;
        }
        summary
    }
}

/// Barycentric weights of `(x, y)` in the XY projection of `abc`, or
/// `None` when outside or degenerate.
fn barycentric_xy(x: f64, y: f64, a: &Point3, b: &Point3, c: &Point3) -> Option<[f64; 3]> {
    let (v0x, v0y) = (b.x - a.x, b.y - a.y);
    let (v1x, v1y) = (c.x - a.x, c.y - a.y);
    let (v2x, v2y) = (x - a.x, y - a.y);
    let denom = v0x * v1y - v1x * v0y;
    if denom.abs() <= EPS {
        return None;
    }
    let u = (v2x * v1y - v1x * v2y) / denom;
    let v = (v0x * v2y - v2x * v0y) / denom;
    if u < -EPS || v < -EPS || u + v > 1.0 + EPS {
        return None;
    }
    Some([1.0 - u - v, u, v])
}
