//! Drop sampling of a mesh into a height field.
//!
//! A [`TriangleGrid`] buckets triangles in XY. A [`UniformGrid`] answers
//! "highest surface under (x, y)" queries against it, and a [`HeightField`]
//! caches those answers on a regular lattice so raster passes can
//! interpolate instead of querying the mesh.

mod cache;
mod triangle_grid;
mod uniform_grid;

pub use cache::{CacheHit, HeightFieldCache, DEFAULT_CACHE_CAPACITY};
pub use triangle_grid::{CandidateScratch, GridTriangle, TriangleGrid};
pub use uniform_grid::{UniformGrid, MIN_CELL_SIZE};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::control::JobControl;

/// Smallest lattice spacing accepted (mm).
pub const MIN_RESOLUTION: f64 = 0.1;

const LATTICE_EPS: f64 = 1e-9;
const MIN_CHUNK_ROWS: usize = 16;

/// Timing and coverage of the last build.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeightFieldStats {
    /// Wall-clock build time (ms).
    pub millis: u64,
    /// Lattice points that hit the mesh.
    pub valid_samples: usize,
    /// Lattice points in total.
    pub total_samples: usize,
}

/// A regular lattice of max-Z samples.
///
/// Samples are stored row-major (Y outer, X inner). A missed sample is
/// NaN with its coverage bit cleared.
#[derive(Debug, Clone, Default)]
pub struct HeightField {
    min_x: f64,
    min_y: f64,
    resolution: f64,
    cols: usize,
    rows: usize,
    samples: Vec<f64>,
    covered: Vec<bool>,
    valid: bool,
    stats: HeightFieldStats,
}

impl HeightField {
    /// An empty, invalid field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample `grid` on a lattice with spacing `resolution`.
    ///
    /// Rows are sampled in parallel. Returns false, leaving the field
    /// invalid, if the grid is empty or `control` is cancelled.
    pub fn build(&mut self, grid: &UniformGrid, resolution: f64, control: &JobControl) -> bool {
        let start = Instant::now();
        let res = resolution.max(MIN_RESOLUTION);
        let size = grid.bounds().size();
        self.min_x = grid.bounds().min.x;
        self.min_y = grid.bounds().min.y;
        self.resolution = res;
        self.cols = ((size.x.max(res) / res).ceil() as usize).max(1);
        self.rows = ((size.y.max(res) / res).ceil() as usize).max(1);
        self.valid = false;

        let total = self.cols * self.rows;
        self.samples = vec![f64::NAN; total];
        self.covered = vec![false; total];
        self.stats = HeightFieldStats {
            total_samples: total,
            ..Default::default()
        };
        if grid.is_empty() {
            return false;
        }

        let cols = self.cols;
        let (min_x, min_y) = (self.min_x, self.min_y);
        let chunk_rows = (self.rows / (rayon::current_num_threads() * 4)).max(MIN_CHUNK_ROWS);
        let cancelled = AtomicBool::new(false);

        self.samples
            .par_chunks_mut(cols * chunk_rows)
            .zip(self.covered.par_chunks_mut(cols * chunk_rows))
            .enumerate()
            .for_each(|(chunk, (samples, covered))| {
                let mut scratch = grid.scratch();
                let first_row = chunk * chunk_rows;
                for (local, (row_samples, row_covered)) in samples
                    .chunks_mut(cols)
                    .zip(covered.chunks_mut(cols))
                    .enumerate()
                {
                    if cancelled.load(Ordering::Relaxed) || control.is_cancelled() {
                        cancelled.store(true, Ordering::Relaxed);
                        return;
                    }
                    let y = min_y + (first_row + local) as f64 * res;
                    for col in 0..cols {
                        if control.is_cancelled() {
                            cancelled.store(true, Ordering::Relaxed);
                            return;
                        }
                        let x = min_x + col as f64 * res;
                        if let Some(z) = grid.sample_with(&mut scratch, x, y) {
                            row_samples[col] = z;
                            row_covered[col] = true;
                        }
                    }
                }
            });

        if cancelled.load(Ordering::Relaxed) {
            debug!("height field build cancelled");
            return false;
        }

        self.valid = true;
        self.stats.valid_samples = self.covered.iter().filter(|c| **c).count();
        self.stats.millis = start.elapsed().as_millis() as u64;
        info!(
            cols = self.cols,
            rows = self.rows,
            resolution = res,
            millis = self.stats.millis,
            valid = self.stats.valid_samples,
            total = self.stats.total_samples,
            "height field built"
        );
        true
    }

    /// True after a completed, uncancelled build.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Lattice spacing (mm).
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Lattice columns (X).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Lattice rows (Y).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Statistics of the last build.
    pub fn stats(&self) -> HeightFieldStats {
        self.stats
    }

    /// (x, y) of a lattice point.
    pub fn xy_at(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.min_x + col as f64 * self.resolution,
            self.min_y + row as f64 * self.resolution,
        )
    }

    /// Sample at a lattice point, if covered.
    pub fn sample_at(&self, col: usize, row: usize) -> Option<f64> {
        if !self.valid || col >= self.cols || row >= self.rows {
            return None;
        }
        let i = row * self.cols + col;
        self.covered[i].then_some(self.samples[i])
    }

    /// Bilinear height at (x, y).
    ///
    /// Fails outside the lattice or when any of the four surrounding
    /// samples is missing.
    pub fn interpolate(&self, x: f64, y: f64) -> Option<f64> {
        if !self.valid || self.cols == 0 || self.rows == 0 {
            return None;
        }
        let res = self.resolution;
        let max_x = self.min_x + res * (self.cols - 1) as f64;
        let max_y = self.min_y + res * (self.rows - 1) as f64;
        if x < self.min_x - LATTICE_EPS
            || x > max_x + LATTICE_EPS
            || y < self.min_y - LATTICE_EPS
            || y > max_y + LATTICE_EPS
        {
            return None;
        }

        let fx = ((x - self.min_x) / res).clamp(0.0, (self.cols - 1) as f64);
        let fy = ((y - self.min_y) / res).clamp(0.0, (self.rows - 1) as f64);
        let c0 = fx.floor() as usize;
        let r0 = fy.floor() as usize;
        if c0 + 1 >= self.cols || r0 + 1 >= self.rows {
            return self.sample_at(c0, r0);
        }

        let tx = fx - c0 as f64;
        let ty = fy - r0 as f64;
        let z00 = self.sample_at(c0, r0)?;
        let z10 = self.sample_at(c0 + 1, r0)?;
        let z01 = self.sample_at(c0, r0 + 1)?;
        let z11 = self.sample_at(c0 + 1, r0 + 1)?;
        let z0 = z00 * (1.0 - tx) + z10 * tx;
        let z1 = z01 * (1.0 - tx) + z11 * tx;
        Some(z0 * (1.0 - ty) + z1 * ty)
    }
}
