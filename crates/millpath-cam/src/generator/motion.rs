//! Entry, exit and retract motion around each cut.
//!
//! Every cut polyline is wrapped as: rapid to safe Z, rapid down to the
//! clearance plane, a ramp, helix or plunge into the material, the cut
//! itself with optional lead-in and lead-out, an exit ramp back to the
//! clearance plane and a retract to safe Z.

use std::f64::consts::PI;

use millpath_math::{Point3, Vec2, POSITION_EPSILON};

use crate::params::{Machine, Stock, UserParams};
use crate::tool::safe_diameter;
use crate::toolpath::{prune_duplicates, MotionType, Polyline, Toolpath};

/// Clearance plane floor above the stock top (mm).
pub const MIN_CLEARANCE_OFFSET: f64 = 0.25;
/// Minimum gap between the clearance plane and safe Z (mm).
pub const MIN_SAFE_GAP: f64 = 0.5;

const DEFAULT_RAMP_ANGLE_DEG: f64 = 3.0;
const MIN_RAMP_ANGLE_DEG: f64 = 0.5;
const MAX_RAMP_ANGLE_DEG: f64 = 45.0;
const MIN_RAMP_HORIZONTAL_FACTOR: f64 = 0.25;
const MAX_RAMP_HORIZONTAL_FACTOR: f64 = 6.0;
const HELIX_SEGMENTS_PER_TURN: f64 = 18.0;
const HELIX_MAX_TURNS: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
struct EntrySettings {
    clearance: f64,
    safe: f64,
    ramp_angle: f64,
    min_horizontal: f64,
    max_horizontal: f64,
    ramp: bool,
    helical: bool,
    ramp_radius: f64,
    lead_in: f64,
    lead_out: f64,
}

impl EntrySettings {
    fn new(machine: &Machine, stock: &Stock, params: &UserParams) -> Self {
        let top = stock.top_z;
        let mut clearance = machine.clearance_z.max(top + MIN_CLEARANCE_OFFSET);
        let mut safe = machine.safe_z.max(clearance + MIN_SAFE_GAP);
        if clearance >= safe {
            clearance = (top + MIN_CLEARANCE_OFFSET).max(safe - MIN_SAFE_GAP);
            safe = clearance + MIN_SAFE_GAP;
        }

        let requested = if params.ramp_angle_deg.is_finite() {
            params.ramp_angle_deg
        } else {
            DEFAULT_RAMP_ANGLE_DEG
        };
        let ramp_angle = requested.clamp(MIN_RAMP_ANGLE_DEG, MAX_RAMP_ANGLE_DEG).to_radians();
        let diameter = safe_diameter(params.tool_diameter);
        let min_horizontal = (MIN_RAMP_HORIZONTAL_FACTOR * diameter).max(0.25);
        let max_horizontal = (MAX_RAMP_HORIZONTAL_FACTOR * diameter).max(min_horizontal * 2.0);
        let ramp_radius = if params.ramp_radius > POSITION_EPSILON {
            params.ramp_radius
        } else {
            diameter * 0.5
        };

        Self {
            clearance,
            safe,
            ramp_angle,
            min_horizontal,
            max_horizontal,
            ramp: params.enable_ramp,
            helical: params.enable_helical,
            ramp_radius,
            lead_in: params.lead_in_length.max(0.0),
            lead_out: params.lead_out_length.max(0.0),
        }
    }

    /// Horizontal run of a straight ramp that drops `drop`.
    fn ramp_distance(&self, drop: f64) -> f64 {
        if drop <= POSITION_EPSILON {
            return 0.0;
        }
        let tan = self.ramp_angle.max(1e-3).tan();
        let horizontal = if tan > 1e-6 { drop / tan } else { self.max_horizontal };
        if horizontal.is_finite() {
            horizontal.clamp(self.min_horizontal, self.max_horizontal)
        } else {
            self.max_horizontal
        }
    }
}

fn unit_or_x(v: Vec2) -> Vec2 {
    let len = v.norm();
    if len <= POSITION_EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        v / len
    }
}

/// XY direction of travel at the start (`forward`) or the end of `points`.
fn travel_direction(points: &[Point3], forward: bool) -> Vec2 {
    if points.len() < 2 {
        return Vec2::new(1.0, 0.0);
    }
    let found = if forward {
        let origin = points[0];
        points[1..]
            .iter()
            .map(|p| Vec2::new(p.x - origin.x, p.y - origin.y))
            .find(|d| d.norm() > POSITION_EPSILON)
    } else {
        let origin = points[points.len() - 1];
        points[..points.len() - 1]
            .iter()
            .rev()
            .map(|p| Vec2::new(origin.x - p.x, origin.y - p.y))
            .find(|d| d.norm() > POSITION_EPSILON)
    };
    found.map_or(Vec2::new(1.0, 0.0), |d| d / d.norm())
}

fn offset_xy(origin: &Point3, dir: Vec2, distance: f64, z: f64) -> Point3 {
    Point3::new(origin.x + dir.x * distance, origin.y + dir.y * distance, z)
}

/// Shrinking helix from `clearance` down to `target`, ending on it.
fn helical_entry(target: &Point3, dir: Vec2, clearance: f64, drop: f64, angle: f64, radius: f64) -> Vec<Point3> {
    if drop <= POSITION_EPSILON || radius <= POSITION_EPSILON {
        return Vec::new();
    }
    let tan = angle.max(1e-3).tan();
    let mut per_turn = if tan > 1e-6 { 2.0 * PI * radius * tan } else { drop };
    if !per_turn.is_finite() || per_turn <= 1e-6 {
        per_turn = drop;
    }
    let turns = ((drop / per_turn).max(0.25) + 0.25).min(HELIX_MAX_TURNS);
    let theta_start = turns * 2.0 * PI;
    let segments = ((turns * HELIX_SEGMENTS_PER_TURN).ceil() as usize).clamp(12, 360);

    let tangent = unit_or_x(dir);
    let normal = unit_or_x(Vec2::new(-tangent.y, tangent.x));
    let radial_base = -tangent;

    let mut helix: Vec<Point3> = (0..=segments)
        .map(|i| {
            let progress = i as f64 / segments as f64;
            let theta = theta_start * (1.0 - progress);
            let radial = radial_base * theta.cos() + normal * theta.sin();
            let scale = radius * (1.0 - progress);
            Point3::new(
                target.x + radial.x * scale,
                target.y + radial.y * scale,
                clearance - drop * progress,
            )
        })
        .collect();
    let ends_on_target = helix
        .last()
        .is_some_and(|p| (p - target).norm() <= POSITION_EPSILON);
    if !ends_on_target {
        helix.push(*target);
    }
    prune_duplicates(&mut helix);
    helix
}

fn push_polyline(out: &mut Vec<Polyline>, motion: MotionType, mut points: Vec<Point3>, step: Option<usize>) {
    prune_duplicates(&mut points);
    if points.len() >= 2 {
        out.push(Polyline { motion, points, step });
    }
}

/// Wrap every cut in `toolpath` with entry, exit and retract moves.
///
/// Non-cut polylines and cuts with fewer than two points are dropped.
pub fn apply_machine_motion(toolpath: &mut Toolpath, machine: &Machine, stock: &Stock, params: &UserParams) {
    if toolpath.polylines.is_empty() {
        return;
    }
    let s = EntrySettings::new(machine, stock, params);
    let mut result = Vec::with_capacity(toolpath.polylines.len() * 5);
    let mut last_safe: Option<Point3> = None;

    for poly in std::mem::take(&mut toolpath.polylines) {
        if poly.motion != MotionType::Cut || poly.points.len() < 2 {
            continue;
        }
        let step = poly.step;
        let cut = poly.points;

        let mut path = Vec::with_capacity(cut.len() + 2);
        if s.lead_in > POSITION_EPSILON {
            let dir = travel_direction(&cut, true);
            path.push(offset_xy(&cut[0], dir, -s.lead_in, cut[0].z));
        }
        path.extend_from_slice(&cut);
        if s.lead_out > POSITION_EPSILON {
            let dir = travel_direction(&cut, false);
            let last = cut[cut.len() - 1];
            path.push(offset_xy(&last, dir, s.lead_out, last.z));
        }
        prune_duplicates(&mut path);
        if path.len() < 2 {
            continue;
        }

        let entry_dir = travel_direction(&path, true);
        let exit_dir = travel_direction(&path, false);
        let entry = path[0];
        let exit = path[path.len() - 1];
        let entry_drop = (s.clearance - entry.z).max(0.0);
        let exit_drop = (s.clearance - exit.z).max(0.0);

        let mut entry_path = Vec::new();
        let mut entry_clear = Point3::new(
            entry.x,
            entry.y,
            if entry_drop > POSITION_EPSILON { s.clearance } else { entry.z },
        );
        if entry_drop > POSITION_EPSILON {
            if s.helical {
                entry_path = helical_entry(&entry, entry_dir, s.clearance, entry_drop, s.ramp_angle, s.ramp_radius);
            }
            if entry_path.is_empty() {
                if s.ramp {
                    let h = s.ramp_distance(entry_drop);
                    entry_clear = offset_xy(&entry, entry_dir, -h, s.clearance);
                } else {
                    entry_clear = Point3::new(entry.x, entry.y, s.clearance);
                }
                entry_path = vec![entry_clear, entry];
            } else {
                entry_clear = entry_path[0];
            }
        }

        let entry_safe = Point3::new(entry_clear.x, entry_clear.y, s.safe);
        if let Some(prev) = last_safe {
            push_polyline(&mut result, MotionType::Rapid, vec![prev, entry_safe], step);
        }
        push_polyline(&mut result, MotionType::Rapid, vec![entry_safe, entry_clear], step);
        push_polyline(&mut result, MotionType::Cut, entry_path, step);
        push_polyline(&mut result, MotionType::Cut, path, step);

        let mut exit_clear = Point3::new(
            exit.x,
            exit.y,
            if exit_drop > POSITION_EPSILON { s.clearance } else { exit.z },
        );
        if exit_drop > POSITION_EPSILON {
            if s.ramp {
                let h = s.ramp_distance(exit_drop);
                exit_clear = offset_xy(&exit, exit_dir, h, s.clearance);
            }
            push_polyline(&mut result, MotionType::Cut, vec![exit, exit_clear], step);
        }

        let exit_safe = Point3::new(exit_clear.x, exit_clear.y, s.safe);
        push_polyline(&mut result, MotionType::Rapid, vec![exit_clear, exit_safe], step);
        last_safe = Some(exit_safe);
    }

    toolpath.polylines = result;
}
