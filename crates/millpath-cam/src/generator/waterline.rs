//! Constant-Z contour passes.

use millpath_math::Point3;
use millpath_mesh::Mesh;
use millpath_slicer::{SliceMode, ZSlicer};
use tracing::debug;

use super::plan::PassProfile;
use crate::control::PassProgress;
use crate::error::Result;
use crate::params::{CutDirection, UserParams};
use crate::toolpath::Polyline;

const SLICE_TOLERANCE: f64 = 1e-4;

/// Slice the mesh from its top down in steps of `profile.stepdown` and
/// emit every closed loop as a cut.
pub fn waterline_pass(
    mesh: &Mesh,
    params: &UserParams,
    profile: &PassProfile,
    progress: &PassProgress,
) -> Result<Vec<Polyline>> {
    let mut out = Vec::new();
    let Some(bounds) = mesh.bounds() else {
        return Ok(out);
    };
    let (min_z, max_z) = (bounds.min.z, bounds.max.z);
    if max_z - min_z <= 1e-4 {
        return Ok(out);
    }

    let stepdown = profile.stepdown.max(0.1);
    let offset = params.cutter.offsets_contours();
    let radius = params.cutter.contour_offset(params.tool_diameter);
    let top = params.stock.top_z;
    let slicer = ZSlicer::new(mesh, SLICE_TOLERANCE);
    let cancel = progress.control().cancel_flag();

    let total_levels = (((max_z - min_z) / stepdown).ceil() as usize).max(1) + 1;
    let mut levels_with_loops = 0usize;
    let mut level = 0usize;
    loop {
        let plane = max_z - level as f64 * stepdown;
        if plane < min_z - 1e-6 {
            break;
        }
        progress.check()?;

        let contours = slicer.slice_with(plane, radius, offset, SliceMode::Parallel, cancel)?;
        if !contours.is_empty() {
            levels_with_loops += 1;
        }
        for contour in contours {
            if contour.len() < 3 {
                continue;
            }
            let mut points: Vec<Point3> = contour
                .points
                .iter()
                .map(|p| Point3::new(p.x, p.y, (p.z + profile.allowance).min(top)))
                .collect();
            if params.cut_direction == CutDirection::Conventional {
                points.reverse();
            }
            out.push(Polyline::cut(points));
        }

        level += 1;
        progress.report((level * 100 / total_levels).min(99) as i64);
    }
    progress.report(100);

    debug!(
        pass = profile.index,
        loops = out.len(),
        levels = levels_with_loops,
        "waterline pass generated"
    );
    Ok(out)
}
