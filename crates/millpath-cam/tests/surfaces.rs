//! Surface queries: candidate grid, height field, gouge checker and slices.

mod common;

use approx::assert_abs_diff_eq;
use common::{grid_mesh, pocket};
use millpath_cam::{GougeChecker, GougeParams, HeightField, JobControl, TriangleGrid, UniformGrid};
use millpath_math::Point3;
use millpath_slicer::{SliceMode, ZSlicer};

#[test]
fn test_flat_plate_queries() {
    let mesh = grid_mesh(10.0, 10.0, 1, |_, _| 0.0);

    let grid = TriangleGrid::build(&mesh, 1.0);
    assert!(!grid.is_empty());
    assert_eq!(grid.len(), 2);
    let mut scratch = grid.scratch();
    assert!(!grid.gather_candidates_xy(&mut scratch, 5.0, 5.0, 0).is_empty());
    assert_eq!(grid.gather_candidates_aabb(&mut scratch, 0.0, 0.0, 10.0, 10.0).len(), 2);

    let uniform = UniformGrid::new(&mesh, 1.0);
    let z = uniform.sample_max_z_at_xy(2.5, 2.5).expect("plate covers the point");
    assert_abs_diff_eq!(z, 0.0, epsilon = 1e-8);

    let mut checker = GougeChecker::new(&mesh);
    let surface = checker.surface_height_at(2.5, 2.5, 5.0).expect("surface below");
    assert_abs_diff_eq!(surface, 0.0, epsilon = 1e-6);

    let path = [Point3::new(0.0, 0.0, 5.0), Point3::new(10.0, 10.0, 5.0)];
    let params = GougeParams {
        tool_radius: 1.0,
        ..Default::default()
    };
    assert_abs_diff_eq!(checker.min_clearance_along(&path, &params), 5.0, epsilon = 1e-6);
}

#[test]
fn test_height_field_round_trips_lattice() {
    let plane = |x: f64, y: f64| 0.1 * x + 0.2 * y;
    let mesh = grid_mesh(10.0, 10.0, 1, plane);
    let uniform = UniformGrid::new(&mesh, 1.0);

    let mut field = HeightField::new();
    assert!(field.build(&uniform, 0.5, &JobControl::new()));
    assert!(field.stats().valid_samples > 0);

    for row in 0..field.rows() {
        for col in 0..field.cols() {
            let (x, y) = field.xy_at(col, row);
            let sample = field.sample_at(col, row).expect("plate covers the lattice");
            let z = field.interpolate(x, y).expect("lattice point interpolates");
            assert_abs_diff_eq!(z, sample, epsilon = 1e-9);
        }
    }
    for (x, y) in [(0.25, 0.25), (3.3, 7.1), (9.2, 0.6)] {
        let z = field.interpolate(x, y).expect("inside the lattice");
        assert!((z - plane(x, y)).abs() < 0.05);
    }
    assert_eq!(field.interpolate(-1.0, 5.0), None);
    assert_eq!(field.interpolate(5.0, 12.0), None);
}

#[test]
fn test_sequential_and_parallel_slices_agree() {
    let slicer = ZSlicer::new(&pocket(60.0, 6.0, 28), 1e-4);
    for (z, radius, offset) in [(-1.0, 0.0, false), (-3.0, 0.75, true), (-5.5, 1.1, true)] {
        let sequential = slicer
            .slice_with(z, radius, offset, SliceMode::Sequential, None)
            .unwrap();
        let parallel = slicer
            .slice_with(z, radius, offset, SliceMode::Parallel, None)
            .unwrap();
        assert!(!sequential.is_empty());
        assert_eq!(sequential.len(), parallel.len());
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.len(), b.len());
            assert!(a.points.iter().zip(&b.points).all(|(p, q)| (p - q).norm() <= 1e-6));
        }
    }
}

#[test]
fn test_flat_square_offset_loop() {
    let slicer = ZSlicer::new(&grid_mesh(10.0, 10.0, 1, |_, _| 0.0), 1e-4);
    let loops = slicer.slice(0.0, 3.0, true);
    assert_eq!(loops.len(), 1);
    let lp = &loops[0];
    assert!(lp.is_closed());
    let max_x = lp.points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = lp.points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    assert_abs_diff_eq!(max_x, 13.0, epsilon = 1e-6);
    assert_abs_diff_eq!(min_y, -3.0, epsilon = 1e-6);
}
