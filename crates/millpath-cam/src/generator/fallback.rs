//! Flat raster at the mesh floor, used when no surface-following pass
//! could be produced.

use millpath_math::Point3;
use millpath_mesh::Mesh;

use super::plan::PassProfile;
use super::raster::{rotated_extent, unrotate};
use crate::control::PassProgress;
use crate::error::Result;
use crate::params::{CutDirection, UserParams};
use crate::toolpath::Polyline;

/// One straight two-point cut per row across the rotated bounding box.
pub fn fallback_pass(
    mesh: &Mesh,
    params: &UserParams,
    profile: &PassProfile,
    progress: &PassProgress,
) -> Result<Vec<Polyline>> {
    let mut out = Vec::new();
    let Some(bounds) = mesh.bounds() else {
        return Ok(out);
    };
    let size = bounds.size();
    if size.x.abs() < 1e-4 || size.y.abs() < 1e-4 {
        return Ok(out);
    }

    let z = (bounds.min.z + profile.allowance).min(params.stock.top_z);
    let spacing = profile.stepover.max(0.1);
    let angle = profile.angle_deg.to_radians();
    let (min_xr, max_xr, min_yr, max_yr) = rotated_extent(&bounds, angle);
    let rows = (((max_yr - min_yr) / spacing).ceil() as usize).max(1);

    for row in 0..=rows {
        progress.check()?;
        let yr = (min_yr + row as f64 * spacing).min(max_yr);
        let (from, to) = if row % 2 == 0 { (min_xr, max_xr) } else { (max_xr, min_xr) };
        let (sx, sy) = unrotate(from, yr, angle);
        let (ex, ey) = unrotate(to, yr, angle);
        let mut points = vec![Point3::new(sx, sy, z), Point3::new(ex, ey, z)];
        if params.cut_direction == CutDirection::Conventional {
            points.reverse();
        }
        out.push(Polyline::cut(points));
        progress.report(((row + 1) * 100 / (rows + 1)).min(99) as i64);
    }
    progress.report(100);
    Ok(out)
}
