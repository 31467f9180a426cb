#![warn(missing_docs)]

//! Triangle mesh model consumed by the millpath planner.
//!
//! The mesh is produced by an import layer outside this workspace and is
//! only ever borrowed read-only by the planning components.

use millpath_math::{Aabb, Point3, Vec3};
use serde::{Deserialize, Serialize};

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32, mm).
    pub positions: Vec<f32>,
    /// Flat array of vertex normals: `[nx0, ny0, nz0, ...]` (f32). Same length as positions,
    /// or empty when the source carried none.
    #[serde(default)]
    pub normals: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from positions and indices, deriving per-vertex normals
    /// by averaging the normals of adjacent faces.
    pub fn from_positions(positions: Vec<f32>, indices: Vec<u32>) -> Self {
        let mut mesh = Self {
            positions,
            normals: Vec::new(),
            indices,
        };
        mesh.recompute_normals();
        mesh
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len() / 3
    }

    /// Position of vertex `i`, if it exists.
    pub fn vertex(&self, i: usize) -> Option<Point3> {
        let p = self.positions.get(i * 3..i * 3 + 3)?;
        Some(Point3::new(p[0] as f64, p[1] as f64, p[2] as f64))
    }

    /// Normal of vertex `i`, if the mesh carries normals.
    pub fn normal(&self, i: usize) -> Option<Vec3> {
        let n = self.normals.get(i * 3..i * 3 + 3)?;
        Some(Vec3::new(n[0] as f64, n[1] as f64, n[2] as f64))
    }

    /// Corner positions of triangle `t`.
    ///
    /// Returns `None` when any index of the triple is out of range.
    pub fn triangle(&self, t: usize) -> Option<[Point3; 3]> {
        let tri = self.indices.get(t * 3..t * 3 + 3)?;
        Some([
            self.vertex(tri[0] as usize)?,
            self.vertex(tri[1] as usize)?,
            self.vertex(tri[2] as usize)?,
        ])
    }

    /// Iterate over `(triangle_index, corners)` for every well-formed triangle.
    pub fn triangles(&self) -> impl Iterator<Item = (usize, [Point3; 3])> + '_ {
        (0..self.num_triangles()).filter_map(|t| self.triangle(t).map(|v| (t, v)))
    }

    /// Bounding box of all vertex positions.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points((0..self.num_vertices()).filter_map(|i| self.vertex(i)))
            .filter(|b| b.is_valid())
    }

    /// True if the mesh has at least one triangle and finite bounds.
    pub fn is_valid(&self) -> bool {
        self.num_triangles() > 0 && self.bounds().is_some()
    }

    /// Recompute vertex normals from face geometry.
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vec3::zeros(); self.num_vertices()];
        for (t, [a, b, c]) in self.triangles() {
            let n = (b - a).cross(&(c - a));
            for &i in &self.indices[t * 3..t * 3 + 3] {
                accum[i as usize] += n;
            }
        }
        self.normals = accum
            .into_iter()
            .flat_map(|n| {
                let n = n.try_normalize(1e-12).unwrap_or_else(Vec3::z);
                [n.x as f32, n.y as f32, n.z as f32]
            })
            .collect();
    }
}
