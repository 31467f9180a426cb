//! Raster passes sampled from the height field.

use millpath_math::{rotate_xy, Aabb, Point3};
use tracing::debug;

use super::plan::PassProfile;
use crate::control::PassProgress;
use crate::dropcutter::HeightField;
use crate::error::Result;
use crate::params::{CutDirection, UserParams};
use crate::toolpath::Polyline;

const LEVEL_EPS: f64 = 1e-6;

/// Lattice spacing used for a given stepover.
pub fn height_field_resolution(stepover: f64) -> f64 {
    (stepover.max(0.1) * 0.5).min(0.5).max(0.1)
}

/// The XY box rotated into the raster frame: (min_x, max_x, min_y, max_y).
pub(super) fn rotated_extent(bounds: &Aabb, angle_rad: f64) -> (f64, f64, f64, f64) {
    let corners = [
        (bounds.min.x, bounds.min.y),
        (bounds.max.x, bounds.min.y),
        (bounds.max.x, bounds.max.y),
        (bounds.min.x, bounds.max.y),
    ];
    let mut ext = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (x, y) in corners {
        let (xr, yr) = rotate_xy(x, y, angle_rad);
        ext.0 = ext.0.min(xr);
        ext.1 = ext.1.max(xr);
        ext.2 = ext.2.min(yr);
        ext.3 = ext.3.max(yr);
    }
    ext
}

/// Map a raster-frame point back to model XY.
pub(super) fn unrotate(xr: f64, yr: f64, angle_rad: f64) -> (f64, f64) {
    rotate_xy(xr, yr, -angle_rad)
}

/// Zig-zag rows across the part, following the sampled surface and split
/// into depth levels of at most `profile.stepdown`.
pub fn raster_pass(
    bounds: &Aabb,
    field: &HeightField,
    params: &UserParams,
    profile: &PassProfile,
    progress: &PassProgress,
) -> Result<Vec<Polyline>> {
    let mut out = Vec::new();
    let size = bounds.size();
    if size.x.abs() < 1e-6 || size.y.abs() < 1e-6 || !field.is_valid() {
        return Ok(out);
    }

    let row_spacing = profile.stepover.max(0.1);
    let resolution = height_field_resolution(profile.stepover);
    let cutter_offset = params.cutter.tip_offset(params.tool_diameter);
    let top = params.stock.top_z;
    let stepdown = profile.stepdown.max(0.1);
    let angle = profile.angle_deg.to_radians();

    let (min_xr, max_xr, min_yr, max_yr) = rotated_extent(bounds, angle);
    let span_y = (max_yr - min_yr).max(1e-6);
    let span_x = (max_xr - min_xr).max(1e-6);
    let rows = ((span_y / row_spacing).ceil() as usize).max(1);
    let steps = ((span_x / resolution).ceil() as usize).max(1);

    let mut run: Vec<Point3> = Vec::with_capacity(steps + 1);
    for row in 0..=rows {
        progress.check()?;
        let yr = (min_yr + row as f64 * row_spacing).min(max_yr);
        let forward = row % 2 == 0;
        run.clear();

        for step in 0..=steps {
            progress.check()?;
            let t = step as f64 / steps as f64;
            let xr = if forward {
                (min_xr + t * span_x).min(max_xr)
            } else {
                (max_xr - t * span_x).max(min_xr)
            };
            let (x, y) = unrotate(xr, yr, angle);
            match field.interpolate(x, y) {
                Some(h) => {
                    let z = (h + cutter_offset + profile.allowance).min(top);
                    run.push(Point3::new(x, y, z));
                }
                None => flush_levels(&mut run, top, stepdown, params.cut_direction, &mut out),
            }
        }
        flush_levels(&mut run, top, stepdown, params.cut_direction, &mut out);

        progress.report(((row + 1) * 100 / (rows + 1)).min(99) as i64);
    }
    progress.report(100);

    debug!(
        pass = profile.index,
        rows = rows + 1,
        polylines = out.len(),
        "raster pass generated"
    );
    Ok(out)
}

/// Emit one polyline per depth level for a contiguous run of samples.
fn flush_levels(
    run: &mut Vec<Point3>,
    top: f64,
    stepdown: f64,
    direction: CutDirection,
    out: &mut Vec<Polyline>,
) {
    if run.len() < 2 {
        run.clear();
        return;
    }
    let floor = run.iter().map(|p| p.z).fold(top, f64::min);

    let mut levels = Vec::new();
    let mut level = top - stepdown;
    while level > floor + LEVEL_EPS {
        levels.push(Some(level));
        level -= stepdown;
    }
    levels.push(None);

    for level in levels {
        let mut points: Vec<Point3> = run
            .iter()
            .map(|p| match level {
                Some(l) => Point3::new(p.x, p.y, p.z.max(l)),
                None => *p,
            })
            .collect();
        if direction == CutDirection::Conventional {
            points.reverse();
        }
        out.push(Polyline::cut(points));
    }
    run.clear();
}
