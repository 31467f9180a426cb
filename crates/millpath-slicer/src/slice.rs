//! Z-plane slicing - intersect a triangle mesh with one horizontal plane.
//!
//! Segments are extracted per triangle (optionally in parallel), stitched
//! into closed rings through a quantized endpoint map, and optionally
//! offset by a cutter radius along each corner bisector.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use millpath_math::{signed_area_xy, Point2, Point3, Vec2};
use millpath_mesh::Mesh;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contour::Contour;
use crate::error::{Result, SlicerError};

const EPSILON: f64 = 1e-9;
const MIN_TOLERANCE: f64 = 1e-6;
const CHUNK: usize = 256;

/// Exact key first so the walk prefers the bucket the point rounds into.
const NEIGHBOURS: [(i64, i64); 9] = [
    (0, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// How segment extraction is scheduled.
///
/// Both modes produce identical loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SliceMode {
    /// Single-threaded extraction.
    Sequential,
    /// Extraction fanned out over the rayon pool.
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy)]
struct SliceTriangle {
    v: [Point3; 3],
    z_min: f64,
    z_max: f64,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: Point2,
    b: Point2,
}

/// What one triangle contributes to a plane.
enum Crossing {
    Miss,
    Cut(Vec<Segment>),
    /// The whole triangle lies in the plane; all three edges.
    Face([Segment; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct GridKey {
    x: i64,
    y: i64,
}

/// Horizontal plane slicer over a borrowed mesh.
#[derive(Debug, Clone)]
pub struct ZSlicer {
    tolerance: f64,
    z_min: f64,
    z_max: f64,
    triangles: Vec<SliceTriangle>,
}

impl ZSlicer {
    /// Precompute triangle Z extents. `tolerance` is clamped to at least 1e-6 mm.
    pub fn new(mesh: &Mesh, tolerance: f64) -> Self {
        let tolerance = if tolerance.is_finite() {
            tolerance.max(MIN_TOLERANCE)
        } else {
            MIN_TOLERANCE
        };

        let triangles: Vec<SliceTriangle> = mesh
            .triangles()
            .map(|(_, v)| SliceTriangle {
                v,
                z_min: v[0].z.min(v[1].z).min(v[2].z),
                z_max: v[0].z.max(v[1].z).max(v[2].z),
            })
            .collect();

        let (z_min, z_max) = if triangles.is_empty() {
            (0.0, 0.0)
        } else {
            triangles.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                (lo.min(t.z_min), hi.max(t.z_max))
            })
        };

        Self {
            tolerance,
            z_min,
            z_max,
            triangles,
        }
    }

    /// Lowest Z of the mesh.
    pub fn z_min(&self) -> f64 {
        self.z_min
    }

    /// Highest Z of the mesh.
    pub fn z_max(&self) -> f64 {
        self.z_max
    }

    /// Effective tolerance (mm).
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Slice at `plane_z` in parallel mode without cancellation.
    pub fn slice(&self, plane_z: f64, tool_radius: f64, apply_offset_for_flat: bool) -> Vec<Contour> {
        // No cancel flag means the only error path is unreachable.
        self.slice_with(plane_z, tool_radius, apply_offset_for_flat, SliceMode::Parallel, None)
            .unwrap_or_default()
    }

    /// Slice at `plane_z`.
    ///
    /// Returns closed loops sorted by descending absolute area. When
    /// `apply_offset_for_flat` is set and `tool_radius` is positive, each
    /// loop is offset outward relative to its own winding.
    pub fn slice_with(
        &self,
        plane_z: f64,
        tool_radius: f64,
        apply_offset_for_flat: bool,
        mode: SliceMode,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Contour>> {
        let crossings = self.extract(plane_z, mode, cancel)?;
        let segments = self.merge_segments(crossings);
        if is_cancelled(cancel) {
            return Err(SlicerError::Cancelled);
        }

        let rings = self.stitch(&segments);

        let mut scored: Vec<(f64, Vec<Point2>)> = Vec::with_capacity(rings.len());
        for ring in rings {
            let area = signed_area_xy(&ring);
            if area.abs() <= EPSILON {
                continue;
            }
            let ring = if apply_offset_for_flat && tool_radius > EPSILON {
                offset_ring(&ring, tool_radius, area)
            } else {
                ring
            };
            scored.push((signed_area_xy(&ring), ring));
        }

        scored.sort_by(|a, b| b.0.abs().total_cmp(&a.0.abs()));

        debug!(
            plane_z,
            segments = segments.len(),
            loops = scored.len(),
            "sliced plane"
        );

        Ok(scored
            .into_iter()
            .map(|(_, ring)| Contour::from_ring(&ring, plane_z))
            .collect())
    }

    fn extract(
        &self,
        plane_z: f64,
        mode: SliceMode,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<Crossing>> {
        let work = |chunk: &[SliceTriangle]| -> Result<Vec<Crossing>> {
            if is_cancelled(cancel) {
                return Err(SlicerError::Cancelled);
            }
            Ok(chunk
                .iter()
                .map(|tri| self.crossing(tri, plane_z))
                .filter(|c| !matches!(c, Crossing::Miss))
                .collect())
        };

        let chunks: Vec<Vec<Crossing>> = match mode {
            SliceMode::Sequential => self.triangles.chunks(CHUNK).map(work).collect::<Result<_>>()?,
            SliceMode::Parallel => self
                .triangles
                .par_chunks(CHUNK)
                .map(work)
                .collect::<Result<_>>()?,
        };

        Ok(chunks.into_iter().flatten().collect())
    }

    fn crossing(&self, tri: &SliceTriangle, plane_z: f64) -> Crossing {
        let tol = self.tolerance;
        if plane_z < tri.z_min - tol || plane_z > tri.z_max + tol {
            return Crossing::Miss;
        }

        let on = |v: &Point3| (v.z - plane_z).abs() <= tol;
        if tri.v.iter().all(on) {
            let p = tri.v.map(|v| Point2::new(v.x, v.y));
            return Crossing::Face([
                Segment { a: p[0], b: p[1] },
                Segment { a: p[1], b: p[2] },
                Segment { a: p[2], b: p[0] },
            ]);
        }

        let mut hits: Vec<Point2> = Vec::with_capacity(4);
        for e in 0..3 {
            let v0 = tri.v[e];
            let v1 = tri.v[(e + 1) % 3];
            let d0 = v0.z - plane_z;
            let d1 = v1.z - plane_z;
            let on0 = d0.abs() <= tol;
            let on1 = d1.abs() <= tol;

            if on0 && on1 {
                hits.push(Point2::new(v0.x, v0.y));
                hits.push(Point2::new(v1.x, v1.y));
            } else if on0 {
                hits.push(Point2::new(v0.x, v0.y));
            } else if on1 {
                hits.push(Point2::new(v1.x, v1.y));
            } else if (d0 > 0.0 && d1 < 0.0) || (d0 < 0.0 && d1 > 0.0) {
                let t = d0 / (d0 - d1);
                hits.push(Point2::new(v0.x + t * (v1.x - v0.x), v0.y + t * (v1.y - v0.y)));
            }
        }

        let mut unique: Vec<Point2> = Vec::with_capacity(hits.len());
        for p in hits {
            if !unique.iter().any(|q| near(q, &p, tol)) {
                unique.push(p);
            }
        }

        if unique.len() < 2 {
            return Crossing::Miss;
        }
        Crossing::Cut(
            unique
                .chunks_exact(2)
                .map(|pair| Segment {
                    a: pair[0],
                    b: pair[1],
                })
                .collect(),
        )
    }

    /// Flatten crossings into one segment list.
    ///
    /// Edges shared by two in-plane faces are interior to a flat region and
    /// dropped; the remaining segments are deduplicated by endpoint.
    fn merge_segments(&self, crossings: Vec<Crossing>) -> Vec<Segment> {
        let tol = self.tolerance;

        let mut face_edge_count: HashMap<(GridKey, GridKey), usize> = HashMap::new();
        for c in &crossings {
            if let Crossing::Face(edges) = c {
                for e in edges {
                    *face_edge_count.entry(edge_key(e, tol)).or_default() += 1;
                }
            }
        }

        let mut seen: HashSet<(GridKey, GridKey)> = HashSet::new();
        let mut segments = Vec::new();
        let mut push = |seg: Segment, from_face: bool| {
            if (seg.a - seg.b).norm_squared() <= tol * tol {
                return;
            }
            let key = edge_key(&seg, tol);
            if from_face && face_edge_count.get(&key).copied().unwrap_or(0) > 1 {
                return;
            }
            if seen.insert(key) {
                segments.push(seg);
            }
        };

        for c in crossings {
            match c {
                Crossing::Miss => {}
                Crossing::Cut(list) => list.into_iter().for_each(|s| push(s, false)),
                Crossing::Face(edges) => edges.into_iter().for_each(|s| push(s, true)),
            }
        }
        segments
    }

    fn stitch(&self, segments: &[Segment]) -> Vec<Vec<Point2>> {
        let tol = self.tolerance;

        let mut adjacency: HashMap<GridKey, Vec<(usize, bool)>> =
            HashMap::with_capacity(segments.len() * 2);
        for (i, s) in segments.iter().enumerate() {
            adjacency.entry(quantize(&s.a, tol)).or_default().push((i, true));
            adjacency.entry(quantize(&s.b, tol)).or_default().push((i, false));
        }

        let mut used = vec![false; segments.len()];
        let mut rings = Vec::new();

        for start in 0..segments.len() {
            if used[start] {
                continue;
            }
            used[start] = true;

            let mut ring = vec![segments[start].a, segments[start].b];
            let mut current = segments[start].b;
            let mut closed = false;

            while let Some((idx, next)) = next_segment(&adjacency, segments, &used, &current, tol) {
                used[idx] = true;
                ring.push(next);
                current = next;
                if near(&current, &ring[0], tol) {
                    closed = true;
                    break;
                }
            }

            // Open walks are numerical noise.
            if closed && ring.len() > 3 {
                ring.pop();
                rings.push(ring);
            }
        }

        rings
    }
}

fn next_segment(
    adjacency: &HashMap<GridKey, Vec<(usize, bool)>>,
    segments: &[Segment],
    used: &[bool],
    current: &Point2,
    tol: f64,
) -> Option<(usize, Point2)> {
    let key = quantize(current, tol);
    for (dx, dy) in NEIGHBOURS {
        let Some(entries) = adjacency.get(&GridKey {
            x: key.x + dx,
            y: key.y + dy,
        }) else {
            continue;
        };
        for &(idx, at_a) in entries {
            if used[idx] {
                continue;
            }
            let seg = &segments[idx];
            let (joint, far) = if at_a { (seg.a, seg.b) } else { (seg.b, seg.a) };
            if near(&joint, current, tol) {
                return Some((idx, far));
            }
        }
    }
    None
}

/// Offset a ring by `radius` along each corner bisector.
///
/// The edge normal is rotated clockwise for counter-clockwise rings and
/// counter-clockwise otherwise, so outer boundaries grow.
fn offset_ring(ring: &[Point2], radius: f64, area: f64) -> Vec<Point2> {
    let n = ring.len();
    if radius <= EPSILON || n < 3 {
        return ring.to_vec();
    }

    let normal_for = |edge: Vec2| -> Vec2 {
        let u = edge.normalize();
        if area.abs() < EPSILON || area > 0.0 {
            Vec2::new(u.y, -u.x)
        } else {
            Vec2::new(-u.y, u.x)
        }
    };

    (0..n)
        .map(|i| {
            let prev = ring[(i + n - 1) % n];
            let curr = ring[i];
            let next = ring[(i + 1) % n];

            let v_prev = curr - prev;
            let v_next = next - curr;
            if v_prev.norm_squared() < EPSILON || v_next.norm_squared() < EPSILON {
                return curr;
            }

            let n_prev = normal_for(v_prev);
            let n_next = normal_for(v_next);
            let mut bisector = n_prev + n_next;
            if bisector.norm_squared() < EPSILON {
                bisector = n_prev;
            }
            let bisector = bisector.normalize();

            let denom = bisector.dot(&n_prev);
            let scale = if denom.abs() > EPSILON {
                radius / denom
            } else {
                radius
            };
            curr + bisector * scale
        })
        .collect()
}

fn quantize(p: &Point2, tol: f64) -> GridKey {
    let scale = if tol > EPSILON { 1.0 / tol } else { 1.0e6 };
    GridKey {
        x: (p.x * scale).round() as i64,
        y: (p.y * scale).round() as i64,
    }
}

fn edge_key(seg: &Segment, tol: f64) -> (GridKey, GridKey) {
    let a = quantize(&seg.a, tol);
    let b = quantize(&seg.b, tol);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn near(a: &Point2, b: &Point2, tol: f64) -> bool {
    (a - b).norm_squared() <= tol * tol
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}
