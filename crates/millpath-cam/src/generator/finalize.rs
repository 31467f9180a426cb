//! Leave-stock lifting and final machine settings.

use millpath_mesh::Mesh;
use tracing::debug;

use super::motion::{apply_machine_motion, MIN_CLEARANCE_OFFSET, MIN_SAFE_GAP};
use crate::gouge::GougeChecker;
use crate::params::UserParams;
use crate::toolpath::{MotionType, Toolpath};

/// Raise cut points so they stay `params.leave_stock` above the surface,
/// capped at the machine's safe Z.
pub fn apply_leave_stock(toolpath: &mut Toolpath, mesh: &Mesh, params: &UserParams) {
    if toolpath.is_empty() || params.leave_stock <= 1e-6 {
        return;
    }
    let mut checker = GougeChecker::new(mesh);
    let probe_z = params.stock.top_z + 1.0;
    let mut lifted = 0usize;

    for poly in &mut toolpath.polylines {
        if poly.motion != MotionType::Cut || poly.points.len() < 2 {
            continue;
        }
        for p in &mut poly.points {
            let Some(surface) = checker.surface_height_at(p.x, p.y, probe_z) else {
                continue;
            };
            let mut desired = surface + params.leave_stock;
            if params.machine.safe_z > 0.0 {
                desired = desired.min(params.machine.safe_z);
            }
            if desired > p.z + 1e-6 {
                p.z = desired;
                lifted += 1;
            }
        }
    }
    debug!(lifted, leave_stock = params.leave_stock, "leave stock applied");
}

/// Repair stock and machine limits, resolve feeds and add entry, exit and
/// retract motion.
pub fn finalize_toolpath(toolpath: &mut Toolpath, params: &UserParams) {
    let mut stock = params.stock.clone();
    stock.ensure_valid();
    let mut machine = params.machine.clone();
    machine.ensure_valid();

    let clearance_floor = stock.top_z + MIN_CLEARANCE_OFFSET;
    if machine.clearance_z < clearance_floor {
        machine.clearance_z = clearance_floor;
    }
    if machine.safe_z <= machine.clearance_z + MIN_SAFE_GAP * 0.5 {
        machine.safe_z = machine.clearance_z + MIN_SAFE_GAP;
    }

    toolpath.feed = if machine.max_feed > 0.0 {
        params.feed.min(machine.max_feed)
    } else {
        params.feed
    };
    toolpath.spindle = if machine.max_spindle > 0.0 {
        params.spindle.min(machine.max_spindle)
    } else {
        params.spindle
    };
    toolpath.rapid_feed = machine.rapid_feed;

    apply_machine_motion(toolpath, &machine, &stock, params);
    toolpath.machine = machine;
    toolpath.stock = stock;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Machine;

    #[test]
    fn test_feed_and_spindle_clamped() {
        let params = UserParams {
            feed: 5000.0,
            spindle: 30000.0,
            ..Default::default()
        };
        let mut tp = Toolpath::default();
        finalize_toolpath(&mut tp, &params);
        assert_eq!(tp.feed, 2000.0);
        assert_eq!(tp.spindle, 12000.0);
        assert_eq!(tp.rapid_feed, 3000.0);
        assert_eq!(tp.machine.name, "Generic Router");
    }

    #[test]
    fn test_unlimited_machine_keeps_feed() {
        let params = UserParams {
            feed: 5000.0,
            machine: Machine {
                max_feed: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut tp = Toolpath::default();
        finalize_toolpath(&mut tp, &params);
        assert_eq!(tp.feed, 5000.0);
    }

    #[test]
    fn test_clearance_floor_and_safe_gap() {
        let mut params = UserParams::default();
        params.stock.top_z = 10.0;
        params.machine.clearance_z = 2.0;
        params.machine.safe_z = 10.4;
        let mut tp = Toolpath::default();
        finalize_toolpath(&mut tp, &params);
        assert_eq!(tp.machine.clearance_z, 10.25);
        assert_eq!(tp.machine.safe_z, 10.75);
        assert_eq!(tp.stock.top_z, 10.0);
    }
}
