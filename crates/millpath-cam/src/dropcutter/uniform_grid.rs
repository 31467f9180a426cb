//! Max-Z point sampling over a mesh.

use millpath_math::Aabb;
use millpath_mesh::Mesh;
use tracing::info;

use super::triangle_grid::{CandidateScratch, TriangleGrid};

const BOUNDS_EPS: f64 = 1e-6;
const HEIGHT_EPS: f64 = 1e-9;
const BARYCENTRIC_EPS: f64 = 1e-7;

/// Smallest cell size accepted (mm).
pub const MIN_CELL_SIZE: f64 = 0.1;

/// Vertical drop sampler: the highest mesh surface under an XY point.
#[derive(Debug, Clone)]
pub struct UniformGrid {
    grid: TriangleGrid,
    cell_size: f64,
}

impl UniformGrid {
    /// Index `mesh` with cells of `cell_size` (floored to [`MIN_CELL_SIZE`]).
    pub fn new(mesh: &Mesh, cell_size: f64) -> Self {
        let cell_size = cell_size.max(MIN_CELL_SIZE);
        let grid = TriangleGrid::build(mesh, cell_size);
        let (cx, cy) = grid.dimensions();
        info!(
            cells = cx * cy,
            cells_x = cx,
            cells_y = cy,
            triangles = grid.len(),
            memory_kb = grid.memory_bytes() / 1024,
            cell_size,
            "uniform grid built"
        );
        Self { grid, cell_size }
    }

    /// Effective cell size (mm).
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// XY bounds of the indexed mesh.
    pub fn bounds(&self) -> &Aabb {
        self.grid.bounds()
    }

    /// True when the mesh contributed no usable triangles.
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Fresh per-thread scratch for [`UniformGrid::sample_with`].
    pub fn scratch(&self) -> CandidateScratch {
        self.grid.scratch()
    }

    /// The underlying triangle grid.
    pub fn triangle_grid(&self) -> &TriangleGrid {
        &self.grid
    }

    /// Highest surface Z at (x, y), for one-off queries.
    ///
    /// Allocates a scratch sized to the triangle count on every call. Loops
    /// should hold a [`UniformGrid::scratch`] and call
    /// [`UniformGrid::sample_with`] instead.
    pub fn sample_max_z_at_xy(&self, x: f64, y: f64) -> Option<f64> {
        let mut scratch = self.scratch();
        self.sample_with(&mut scratch, x, y)
    }

    /// Highest surface Z at (x, y) using caller-owned scratch.
    pub fn sample_with(&self, scratch: &mut CandidateScratch, x: f64, y: f64) -> Option<f64> {
        if self.grid.is_empty() || !self.grid.bounds().contains_xy(x, y, BOUNDS_EPS) {
            return None;
        }
        self.evaluate(scratch, x, y, 0)
            .or_else(|| self.evaluate(scratch, x, y, 1))
    }

    fn evaluate(&self, scratch: &mut CandidateScratch, x: f64, y: f64, ring: usize) -> Option<f64> {
        let grid = &self.grid;
        let order = grid.gather_candidates_xy_by_max_z(scratch, x, y, ring);

        let mut best: Option<f64> = None;
        for &t in order {
            let tri = grid.triangle(t);
            if let Some(current) = best {
                if tri.max_z + HEIGHT_EPS < current {
                    // Sorted by max Z: nothing further can beat the current hit.
                    break;
                }
            }
            let dx = x - tri.centroid.x;
            let dy = y - tri.centroid.y;
            if dx * dx + dy * dy > tri.bounding_radius_sq + BARYCENTRIC_EPS {
                continue;
            }
            if !tri.bbox.contains_xy(x, y, BARYCENTRIC_EPS) {
                continue;
            }
            if let Some(z) = tri.height_at(x, y, BARYCENTRIC_EPS) {
                best = Some(best.map_or(z, |b| b.max(z)));
            }
        }
        best
    }
}
