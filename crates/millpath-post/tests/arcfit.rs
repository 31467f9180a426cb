//! Arc fitting through the full emitter.

use std::f64::consts::TAU;

use millpath_cam::{Polyline, PostParams, Toolpath};
use millpath_math::Point3;
use millpath_post::{generate_gcode, PostFlavor, Units};

fn toolpath(points: Vec<Point3>) -> Toolpath {
    Toolpath {
        polylines: vec![Polyline::cut(points)],
        feed: 1200.0,
        spindle: 18000.0,
        ..Default::default()
    }
}

fn circle(radius: f64, samples: usize, z: f64) -> Vec<Point3> {
    (0..=samples)
        .map(|i| {
            let a = TAU * i as f64 / samples as f64;
            Point3::new(radius * a.cos(), radius * a.sin(), z)
        })
        .collect()
}

fn count(gcode: &str, code: &str) -> usize {
    gcode
        .lines()
        .filter(|l| l.split_whitespace().next() == Some(code))
        .count()
}

/// First word of every motion line, ignoring modal unit and positioning codes.
fn motion_codes(gcode: &str) -> Vec<String> {
    gcode
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .filter(|w| w.starts_with('G') && !matches!(*w, "G20" | "G21" | "G90"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_sampled_circle_collapses_to_arcs() {
    let params = PostParams {
        max_arc_chord_error: 0.05,
    };
    let gcode = generate_gcode(&toolpath(circle(20.0, 48, -1.5)), PostFlavor::Grbl, Units::Millimeters, &params);
    let arcs = count(&gcode, "G2") + count(&gcode, "G3");
    assert!((1..=2).contains(&arcs), "arcs = {arcs}\n{gcode}");
    assert!(count(&gcode, "G1") <= 3, "{gcode}");
    assert_eq!(count(&gcode, "G3"), arcs, "counter-clockwise input");
}

#[test]
fn test_l_shape_stays_linear() {
    let points = vec![
        Point3::new(0.0, 0.0, -1.0),
        Point3::new(15.0, 0.0, -1.0),
        Point3::new(15.0, 10.0, -1.0),
    ];
    let gcode = generate_gcode(&toolpath(points), PostFlavor::Grbl, Units::Millimeters, &PostParams::default());
    assert_eq!(count(&gcode, "G2") + count(&gcode, "G3"), 0);
    assert_eq!(count(&gcode, "G1"), 3);
}

#[test]
fn test_arcs_disabled_without_tolerance() {
    let params = PostParams {
        max_arc_chord_error: 0.0,
    };
    let gcode = generate_gcode(&toolpath(circle(20.0, 48, -1.5)), PostFlavor::Fanuc, Units::Millimeters, &params);
    assert_eq!(count(&gcode, "G2") + count(&gcode, "G3"), 0);
    assert_eq!(count(&gcode, "G1"), 49);
}

#[test]
fn test_inch_output_keeps_motion_sequence() {
    let tp = toolpath(circle(12.5, 36, -2.0));
    let params = PostParams {
        max_arc_chord_error: 0.05,
    };
    let mm = generate_gcode(&tp, PostFlavor::Grbl, Units::Millimeters, &params);
    let inch = generate_gcode(&tp, PostFlavor::Grbl, Units::Inches, &params);
    let mm_codes = motion_codes(&mm);
    assert_eq!(mm_codes, motion_codes(&inch));
    assert!(mm_codes.iter().any(|c| c == "G2" || c == "G3"));
    assert!(inch.contains("G20"));
}
