//! Ramp and helix entries, and climb versus conventional ordering.

mod common;

use common::{grid_mesh, horizontal, is_flat_cut, pocket, signed_area, single_step};
use millpath_cam::{CutDirection, JobControl, MotionType, Polyline, StrategyKind, Toolpath, ToolpathGenerator, UserParams};

fn generate(mesh: &millpath_mesh::Mesh, params: &UserParams, kind: StrategyKind, stepover: f64, stepdown: f64) -> Toolpath {
    ToolpathGenerator::default()
        .generate(mesh, params, &single_step(kind, stepover, stepdown, 0.0), &JobControl::new())
        .unwrap()
}

fn first_cut(tp: &Toolpath) -> &Polyline {
    tp.polylines
        .iter()
        .find(|p| p.motion == MotionType::Cut && p.points.len() >= 2)
        .expect("toolpath has a cut")
}

fn average_y(poly: &Polyline) -> f64 {
    poly.points.iter().map(|p| p.y).sum::<f64>() / poly.points.len() as f64
}

fn raster_params() -> UserParams {
    let mut p = UserParams {
        enable_rough_pass: false,
        stock_allowance: 0.0,
        leave_stock: 0.0,
        step_over: 4.0,
        max_depth_per_pass: 1.5,
        enable_ramp: true,
        enable_helical: false,
        ramp_angle_deg: 5.0,
        lead_in_length: 4.0,
        lead_out_length: 4.0,
        ..Default::default()
    };
    p.machine.safe_z = 30.0;
    p.machine.clearance_z = 18.0;
    p.stock.top_z = 12.0;
    p
}

#[test]
fn test_raster_ramp_and_direction_reversal() {
    let mesh = grid_mesh(60.0, 40.0, 8, |x, y| 0.05 * x - 0.03 * y);
    let climb_params = UserParams {
        cut_direction: CutDirection::Climb,
        ..raster_params()
    };
    let conventional_params = UserParams {
        cut_direction: CutDirection::Conventional,
        ..raster_params()
    };
    let climb = generate(&mesh, &climb_params, StrategyKind::Raster, 4.0, 1.5);
    let conventional = generate(&mesh, &conventional_params, StrategyKind::Raster, 4.0, 1.5);
    assert!(!climb.is_empty());
    assert!(!conventional.is_empty());

    let ramp = first_cut(&climb);
    assert!(ramp.points.windows(2).any(|w| horizontal(&w[0], &w[1]) > 1e-3));
    assert!(ramp.points.windows(2).any(|w| w[0].z > w[1].z + 1e-4));

    let planar = |poly: &&Polyline| is_flat_cut(poly, 2, 1e-3);
    let climb_cut = climb.polylines.iter().find(planar).expect("planar climb cut");
    let target_y = climb_cut.points[0].y;
    let conventional_cut = conventional
        .polylines
        .iter()
        .filter(planar)
        .find(|p| (average_y(p) - target_y).abs() < 1e-3)
        .expect("matching conventional cut");

    assert!(climb_cut.points.len() >= 4);
    assert_eq!(climb_cut.points.len(), conventional_cut.points.len());

    let direction = |p: &Polyline| {
        let (a, b) = (p.points[0], p.points[p.points.len() - 1]);
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = (dx * dx + dy * dy).sqrt();
        (dx / len, dy / len)
    };
    let (cx, cy) = direction(climb_cut);
    let (vx, vy) = direction(conventional_cut);
    assert!(cx * vx + cy * vy < -0.95);
}

#[test]
fn test_waterline_helix_and_loop_winding() {
    let mesh = pocket(60.0, 6.0, 20);
    let mut base = UserParams {
        enable_rough_pass: false,
        stock_allowance: 0.0,
        leave_stock: 0.0,
        step_over: 3.0,
        max_depth_per_pass: 1.5,
        enable_ramp: true,
        enable_helical: true,
        ramp_radius: 5.0,
        ramp_angle_deg: 4.0,
        ..Default::default()
    };
    base.machine.safe_z = 28.0;
    base.machine.clearance_z = 18.0;
    base.stock.top_z = 8.0;

    let climb = generate(&mesh, &base, StrategyKind::Waterline, 0.0, 0.0);
    let conventional = generate(
        &mesh,
        &UserParams {
            cut_direction: CutDirection::Conventional,
            ..base.clone()
        },
        StrategyKind::Waterline,
        0.0,
        0.0,
    );
    assert!(!climb.is_empty());
    assert!(!conventional.is_empty());

    let helix = first_cut(&climb);
    assert!(helix.points.len() >= 6);
    assert!(helix.points.windows(2).any(|w| horizontal(&w[0], &w[1]) > 1e-3));
    assert!(helix.points.windows(2).all(|w| w[1].z <= w[0].z + 5e-4));

    let climb_loop = climb
        .polylines
        .iter()
        .find(|p| is_flat_cut(p, 3, 5e-4))
        .expect("climb loop");
    let conventional_loop = conventional
        .polylines
        .iter()
        .find(|p| is_flat_cut(p, 3, 5e-4))
        .expect("conventional loop");
    let climb_area = signed_area(&climb_loop.points);
    let conventional_area = signed_area(&conventional_loop.points);
    assert!(climb_area.abs() > 1e-2);
    assert!(climb_area * conventional_area < 0.0);
}
