//! Randomized height fields: path geometry stays well formed.

mod common;

use std::collections::BTreeMap;

use common::{grid_mesh, has_self_intersection, single_step, z_extent};
use millpath_cam::{
    CutterType, GougeChecker, GougeParams, JobControl, MotionType, Polyline, StrategyKind, Toolpath,
    ToolpathGenerator, UserParams,
};
use millpath_mesh::Mesh;
use proptest::prelude::*;

const Z_TOL: f64 = 1e-3;

#[derive(Debug, Clone, Copy)]
struct Surface {
    base: f64,
    slope_x: f64,
    slope_y: f64,
    amplitude: f64,
    freq_x: f64,
    freq_y: f64,
    phase_x: f64,
    phase_y: f64,
}

impl Surface {
    fn height(&self, x: f64, y: f64) -> f64 {
        self.base
            + self.slope_x * x
            + self.slope_y * y
            + self.amplitude * (self.freq_x * x + self.phase_x).sin()
            + self.amplitude * (self.freq_y * y + self.phase_y).cos()
    }

    fn mesh(&self, width: f64, depth: f64) -> Mesh {
        grid_mesh(width, depth, 12, |x, y| self.height(x, y))
    }
}

prop_compose! {
    fn arb_surface()(
        base in 0.25f64..1.25,
        slope_x in -0.02f64..0.02,
        slope_y in -0.02f64..0.02,
        amplitude in 0.05f64..0.3,
        freq_x in 0.1f64..0.4,
        freq_y in 0.1f64..0.4,
        phase_x in 0.0f64..std::f64::consts::PI,
        phase_y in 0.0f64..std::f64::consts::PI,
    ) -> Surface {
        Surface { base, slope_x, slope_y, amplitude, freq_x, freq_y, phase_x, phase_y }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cutting {
    tool: f64,
    stepover_frac: f64,
    depth_per_pass: f64,
    stepdown_frac: f64,
    angle: f64,
}

prop_compose! {
    fn arb_cutting()(
        tool in 4.0f64..10.0,
        stepover_frac in 0.2f64..0.55,
        depth_per_pass in 0.35f64..0.85,
        stepdown_frac in 0.5f64..1.0,
        angle in 0.0f64..180.0,
    ) -> Cutting {
        Cutting { tool, stepover_frac, depth_per_pass, stepdown_frac, angle }
    }
}

#[derive(Debug, Clone, Copy)]
struct Heights {
    clearance_gap: f64,
    safe_gap: f64,
    top_gap: f64,
    leave: f64,
}

prop_compose! {
    fn arb_heights()(
        clearance_gap in 1.5f64..2.8,
        safe_gap in 1.0f64..2.5,
        top_gap in 0.2f64..0.4,
        leave in 0.1f64..0.3,
    ) -> Heights {
        Heights { clearance_gap, safe_gap, top_gap, leave }
    }
}

/// A cut that runs entirely below the stock top, excluding entry and exit
/// ramps.
fn near_stock(poly: &Polyline, top: f64) -> bool {
    poly.motion == MotionType::Cut && poly.points.len() >= 2 && z_extent(poly).1 <= top + Z_TOL
}

/// Depth levels of each raster run, keyed by the run's start point.
fn raster_levels(tp: &Toolpath, top: f64) -> Vec<Vec<f64>> {
    let mut runs: BTreeMap<(i64, i64), Vec<f64>> = BTreeMap::new();
    for poly in tp.polylines.iter().filter(|p| near_stock(p, top)) {
        let start = poly.points[0];
        let key = ((start.x * 1e3).round() as i64, (start.y * 1e3).round() as i64);
        runs.entry(key).or_default().push(z_extent(poly).0);
    }
    runs.into_values()
        .map(|mut levels| {
            levels.sort_by(|a, b| b.total_cmp(a));
            levels
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_random_height_fields(
        case in 0usize..12,
        width in 28.0f64..48.0,
        depth in 28.0f64..48.0,
        surface in arb_surface(),
        cut in arb_cutting(),
        heights in arb_heights(),
    ) {
        let Cutting { tool, stepover_frac, depth_per_pass, stepdown_frac, angle } = cut;
        let mesh = surface.mesh(width, depth);
        prop_assert!(mesh.is_valid());
        let bounds = mesh.bounds().unwrap();

        let raster = case % 2 == 0;
        let leave_stock = if case % 3 == 0 { heights.leave } else { 0.0 };
        let mut params = UserParams {
            enable_rough_pass: false,
            enable_finish_pass: true,
            use_height_field: true,
            tool_diameter: tool,
            step_over: tool * stepover_frac,
            max_depth_per_pass: depth_per_pass,
            cutter: if raster { CutterType::FlatEndMill } else { CutterType::BallNose },
            leave_stock,
            stock_allowance: leave_stock,
            ..Default::default()
        };
        params.machine.clearance_z = bounds.max.z + heights.clearance_gap;
        params.machine.safe_z = params.machine.clearance_z + heights.safe_gap;
        params.stock.top_z = bounds.max.z + heights.top_gap;

        let kind = if raster { StrategyKind::Raster } else { StrategyKind::Waterline };
        let predictor = single_step(kind, params.step_over, depth_per_pass * stepdown_frac, angle);
        let tp = ToolpathGenerator::default()
            .generate(&mesh, &params, &predictor, &JobControl::new())
            .unwrap();
        prop_assert!(!tp.is_empty());
        let top = params.stock.top_z;

        for poly in tp.polylines.iter().filter(|p| p.points.len() >= 2) {
            prop_assert!(!has_self_intersection(poly, 1e-4));
        }

        let clearance = tp.machine.clearance_z;
        for rapid in tp.polylines.iter().filter(|p| p.motion == MotionType::Rapid) {
            for p in &rapid.points {
                prop_assert!(p.z + Z_TOL >= clearance);
            }
        }

        if raster && leave_stock == 0.0 {
            let stepdown = tp.strategy_steps[0].stepdown.max(0.05);
            for levels in raster_levels(&tp, top) {
                prop_assert!(levels[0] + stepdown + Z_TOL >= top);
                for pair in levels.windows(2) {
                    prop_assert!(pair[0] - pair[1] <= stepdown + Z_TOL);
                }
            }
        }

        if leave_stock > 0.0 {
            let mut checker = GougeChecker::new(&mesh);
            let gouge = GougeParams {
                tool_radius: tool * 0.5,
                holder_radius: tool * 0.5 + 5.0,
                leave_stock,
                safety_z: tp.machine.safe_z,
            };
            for poly in tp.polylines.iter().filter(|p| near_stock(p, top)) {
                let clearance = checker.min_clearance_along(&poly.points, &gouge);
                if clearance.is_finite() {
                    prop_assert!(clearance + 1e-4 >= 0.0);
                }
            }
        }
    }
}
