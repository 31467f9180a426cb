//! 2D spatial acceleration for mesh triangle lookup.
//!
//! Triangles are bucketed into uniform XY cells. Storage is contiguous: a
//! per-cell offset and count into one shared index array. Each cell's list is
//! sorted by descending max Z so drop queries can stop early.

use millpath_math::{Aabb, Point3, Vec3};
use millpath_mesh::Mesh;

const DEGENERATE_NORMAL_SQ: f64 = 1e-9;
const INDEX_EPS: f64 = 1e-9;

/// A mesh triangle with precomputed query data.
#[derive(Debug, Clone)]
pub struct GridTriangle {
    /// Corner positions.
    pub v: [Point3; 3],
    /// Unit normal.
    pub normal: Vec3,
    /// XY box as a flat [`Aabb`] (z spans min/max Z).
    pub bbox: Aabb,
    /// Centroid.
    pub centroid: Point3,
    /// `v1 - v0`.
    pub edge0: Vec3,
    /// `v2 - v0`.
    pub edge1: Vec3,
    dot00: f64,
    dot01: f64,
    dot11: f64,
    inv_det: f64,
    valid_barycentric: bool,
    /// Plane constant: `n · p + d = 0`.
    pub plane_d: f64,
    inv_nz: f64,
    valid_nz: bool,
    /// Lowest corner Z.
    pub min_z: f64,
    /// Highest corner Z.
    pub max_z: f64,
    /// Squared XY radius of the bounding circle around the centroid.
    pub bounding_radius_sq: f64,
}

impl GridTriangle {
    /// Precompute query data, or `None` for a degenerate triangle.
    pub fn new(v0: Point3, v1: Point3, v2: Point3) -> Option<Self> {
        let edge0 = v1 - v0;
        let edge1 = v2 - v0;
        let n = edge0.cross(&edge1);
        let len_sq = n.norm_squared();
        if !(len_sq > DEGENERATE_NORMAL_SQ) {
            return None;
        }
        let normal = n / len_sq.sqrt();

        let bbox = Aabb::from_points([v0, v1, v2])?;
        let centroid = Point3::from((v0.coords + v1.coords + v2.coords) / 3.0);

        // Barycentric basis in the XY projection.
        let dot00 = edge0.x * edge0.x + edge0.y * edge0.y;
        let dot01 = edge0.x * edge1.x + edge0.y * edge1.y;
        let dot11 = edge1.x * edge1.x + edge1.y * edge1.y;
        let denom = dot00 * dot11 - dot01 * dot01;
        let valid_barycentric = denom.abs() > 1e-9;
        let inv_det = if valid_barycentric { 1.0 / denom } else { 0.0 };

        let valid_nz = normal.z.abs() > 1e-9;
        let inv_nz = if valid_nz { 1.0 / normal.z } else { 0.0 };

        let bounding_radius_sq = [v0, v1, v2]
            .iter()
            .map(|p| (p.x - centroid.x).powi(2) + (p.y - centroid.y).powi(2))
            .fold(0.0, f64::max);

        Some(Self {
            v: [v0, v1, v2],
            normal,
            bbox,
            centroid,
            edge0,
            edge1,
            dot00,
            dot01,
            dot11,
            inv_det,
            valid_barycentric,
            plane_d: -normal.dot(&v0.coords),
            inv_nz,
            valid_nz,
            min_z: bbox.min.z,
            max_z: bbox.max.z,
            bounding_radius_sq,
        })
    }

    /// Z of the supporting plane at (x, y), or `None` for a vertical face.
    pub fn plane_height_at(&self, x: f64, y: f64) -> Option<f64> {
        self.valid_nz
            .then(|| (-self.plane_d - self.normal.x * x - self.normal.y * y) * self.inv_nz)
    }

    /// True if (x, y) lies inside the XY projection, with tolerance `eps`
    /// on the barycentric coordinates.
    pub fn contains_xy(&self, x: f64, y: f64, eps: f64) -> bool {
        if !self.valid_barycentric {
            return false;
        }
        let px = x - self.v[0].x;
        let py = y - self.v[0].y;
        let dot02 = self.edge0.x * px + self.edge0.y * py;
        let dot12 = self.edge1.x * px + self.edge1.y * py;
        let u = (self.dot11 * dot02 - self.dot01 * dot12) * self.inv_det;
        let v = (self.dot00 * dot12 - self.dot01 * dot02) * self.inv_det;
        u >= -eps && v >= -eps && u + v <= 1.0 + eps
    }

    /// Drop height of a vertical line at (x, y) onto the triangle itself.
    pub fn height_at(&self, x: f64, y: f64, eps: f64) -> Option<f64> {
        if !self.valid_barycentric {
            return None;
        }
        let z = self.plane_height_at(x, y)?;
        if z < self.min_z - 1e-9 || z > self.max_z + 1e-9 {
            return None;
        }
        self.contains_xy(x, y, eps).then_some(z)
    }
}

/// Per-worker deduplication state for candidate gathering.
///
/// The grid itself is shared read-only; each thread owns one of these.
#[derive(Debug, Clone, Default)]
pub struct CandidateScratch {
    marks: Vec<u32>,
    stamp: u32,
    found: Vec<u32>,
}

impl CandidateScratch {
    fn begin(&mut self, triangle_count: usize) {
        if self.marks.len() != triangle_count {
            self.marks = vec![0; triangle_count];
            self.stamp = 0;
        }
        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.marks.fill(0);
            self.stamp = 1;
        }
        self.found.clear();
    }

    fn visit(&mut self, index: u32) {
        let slot = &mut self.marks[index as usize];
        if *slot != self.stamp {
            *slot = self.stamp;
            self.found.push(index);
        }
    }
}

/// Uniform XY grid of triangle buckets.
#[derive(Debug, Clone)]
pub struct TriangleGrid {
    triangles: Vec<GridTriangle>,
    bounds: Aabb,
    cells_x: usize,
    cells_y: usize,
    cell_w: f64,
    cell_h: f64,
    offsets: Vec<u32>,
    counts: Vec<u32>,
    indices: Vec<u32>,
}

impl TriangleGrid {
    /// Bucket every non-degenerate triangle of `mesh`.
    ///
    /// A positive `target_cell_size` fixes the cell size; otherwise the cell
    /// count is derived from `sqrt(triangle_count)` matched to the XY aspect.
    pub fn build(mesh: &Mesh, target_cell_size: f64) -> Self {
        let triangles: Vec<GridTriangle> = mesh
            .triangles()
            .filter_map(|(_, [a, b, c])| GridTriangle::new(a, b, c))
            .collect();

        let bounds = match mesh.bounds() {
            Some(b) if !triangles.is_empty() => b,
            _ => return Self::empty(),
        };

        let span_x = bounds.size().x.max(1e-9);
        let span_y = bounds.size().y.max(1e-9);
        let (cells_x, cells_y) = if target_cell_size > 1e-9 {
            (
                ((span_x / target_cell_size).ceil() as usize).max(1),
                ((span_y / target_cell_size).ceil() as usize).max(1),
            )
        } else {
            let base = ((triangles.len() as f64).sqrt().round() as usize).max(1);
            let aspect = span_x / span_y;
            if aspect >= 1.0 {
                (base, ((base as f64 / aspect).round() as usize).max(1))
            } else {
                (((base as f64 * aspect).round() as usize).max(1), base)
            }
        };
        let cell_w = span_x / cells_x as f64;
        let cell_h = span_y / cells_y as f64;

        let mut grid = Self {
            triangles,
            bounds,
            cells_x,
            cells_y,
            cell_w,
            cell_h,
            offsets: vec![0; cells_x * cells_y],
            counts: vec![0; cells_x * cells_y],
            indices: Vec::new(),
        };

        // Count, exclusive scan, fill.
        for t in 0..grid.triangles.len() {
            let (x0, y0, x1, y1) = grid.cell_span(&grid.triangles[t].bbox);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    grid.counts[cy * cells_x + cx] += 1;
                }
            }
        }
        let mut running = 0u32;
        for (offset, count) in grid.offsets.iter_mut().zip(&grid.counts) {
            *offset = running;
            running += count;
        }
        grid.indices = vec![0; running as usize];
        let mut cursor = grid.offsets.clone();
        for t in 0..grid.triangles.len() {
            let (x0, y0, x1, y1) = grid.cell_span(&grid.triangles[t].bbox);
            for cy in y0..=y1 {
                for cx in x0..=x1 {
                    let cell = cy * cells_x + cx;
                    grid.indices[cursor[cell] as usize] = t as u32;
                    cursor[cell] += 1;
                }
            }
        }

        let tris = &grid.triangles;
        for cell in 0..grid.offsets.len() {
            let start = grid.offsets[cell] as usize;
            let end = start + grid.counts[cell] as usize;
            grid.indices[start..end].sort_by(|&a, &b| {
                tris[b as usize]
                    .max_z
                    .total_cmp(&tris[a as usize].max_z)
                    .then(a.cmp(&b))
            });
        }
        grid
    }

    fn empty() -> Self {
        Self {
            triangles: Vec::new(),
            bounds: Aabb::new(Point3::origin(), Point3::origin()),
            cells_x: 1,
            cells_y: 1,
            cell_w: 1.0,
            cell_h: 1.0,
            offsets: vec![0],
            counts: vec![0],
            indices: Vec::new(),
        }
    }

    fn cell_x(&self, x: f64, upper: bool) -> usize {
        let rel = (x - self.bounds.min.x) / self.cell_w;
        let rel = if upper { rel + INDEX_EPS } else { rel };
        (rel.floor().max(0.0) as usize).min(self.cells_x - 1)
    }

    fn cell_y(&self, y: f64, upper: bool) -> usize {
        let rel = (y - self.bounds.min.y) / self.cell_h;
        let rel = if upper { rel + INDEX_EPS } else { rel };
        (rel.floor().max(0.0) as usize).min(self.cells_y - 1)
    }

    fn cell_span(&self, bbox: &Aabb) -> (usize, usize, usize, usize) {
        (
            self.cell_x(bbox.min.x, false),
            self.cell_y(bbox.min.y, false),
            self.cell_x(bbox.max.x, true),
            self.cell_y(bbox.max.y, true),
        )
    }

    /// Fresh deduplication state sized for this grid.
    pub fn scratch(&self) -> CandidateScratch {
        CandidateScratch {
            marks: vec![0; self.triangles.len()],
            stamp: 0,
            found: Vec::new(),
        }
    }

    /// Number of stored triangles.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True when no triangle survived construction.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Stored triangles.
    pub fn triangles(&self) -> &[GridTriangle] {
        &self.triangles
    }

    /// Triangle by index.
    pub fn triangle(&self, index: u32) -> &GridTriangle {
        &self.triangles[index as usize]
    }

    /// XY bounds (z carries the mesh Z extent).
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Cell counts along X and Y.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cells_x, self.cells_y)
    }

    /// Approximate heap use in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.triangles.len() * std::mem::size_of::<GridTriangle>()
            + (self.offsets.len() + self.counts.len() + self.indices.len()) * 4
    }

    fn gather_all<'s>(&self, scratch: &'s mut CandidateScratch) -> &'s [u32] {
        scratch.found.clear();
        scratch.found.extend(0..self.triangles.len() as u32);
        &scratch.found
    }

    fn gather_cells<'s>(
        &self,
        scratch: &'s mut CandidateScratch,
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
    ) -> &'s [u32] {
        scratch.begin(self.triangles.len());
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let cell = cy * self.cells_x + cx;
                let start = self.offsets[cell] as usize;
                let end = start + self.counts[cell] as usize;
                for &t in &self.indices[start..end] {
                    scratch.visit(t);
                }
            }
        }
        if scratch.found.is_empty() {
            return self.gather_all(scratch);
        }
        &scratch.found
    }

    /// Deduplicated triangle indices in the `(2·ring + 1)²` cells around (x, y).
    pub fn gather_candidates_xy<'s>(
        &self,
        scratch: &'s mut CandidateScratch,
        x: f64,
        y: f64,
        ring: usize,
    ) -> &'s [u32] {
        if self.triangles.is_empty() {
            scratch.found.clear();
            return &scratch.found;
        }
        if self.cells_x <= 1 || self.cells_y <= 1 {
            return self.gather_all(scratch);
        }
        let cx = self.cell_x(x, false);
        let cy = self.cell_y(y, false);
        let x0 = cx.saturating_sub(ring);
        let y0 = cy.saturating_sub(ring);
        let x1 = (cx + ring).min(self.cells_x - 1);
        let y1 = (cy + ring).min(self.cells_y - 1);
        self.gather_cells(scratch, x0, y0, x1, y1)
    }

    /// [`TriangleGrid::gather_candidates_xy`] ordered by descending max Z,
    /// ties broken by index. Sorts inside `scratch` without allocating.
    pub fn gather_candidates_xy_by_max_z<'s>(
        &self,
        scratch: &'s mut CandidateScratch,
        x: f64,
        y: f64,
        ring: usize,
    ) -> &'s [u32] {
        self.gather_candidates_xy(scratch, x, y, ring);
        let triangles = &self.triangles;
        scratch.found.sort_unstable_by(|&a, &b| {
            triangles[b as usize]
                .max_z
                .total_cmp(&triangles[a as usize].max_z)
                .then(a.cmp(&b))
        });
        &scratch.found
    }

    /// Deduplicated triangle indices in every cell overlapping the XY box.
    pub fn gather_candidates_aabb<'s>(
        &self,
        scratch: &'s mut CandidateScratch,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> &'s [u32] {
        if self.triangles.is_empty() {
            scratch.found.clear();
            return &scratch.found;
        }
        if self.cells_x <= 1 || self.cells_y <= 1 {
            return self.gather_all(scratch);
        }
        let x0 = self.cell_x(min_x.min(max_x), false);
        let y0 = self.cell_y(min_y.min(max_y), false);
        let x1 = self.cell_x(max_x.max(min_x), true);
        let y1 = self.cell_y(max_y.max(min_y), true);
        self.gather_cells(scratch, x0, y0, x1, y1)
    }
}
