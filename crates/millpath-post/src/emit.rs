//! Program emission: header, step banners, motion and footer.

use millpath_cam::{MotionType, Polyline, PostParams, StrategyKind, Toolpath};
use millpath_math::{Point3, DEGENERATE_LENGTH};
use tracing::debug;

use crate::arcfit::{fit_arc, ArcFit};
use crate::flavor::{MoveStyle, PostConfig, PostFlavor};
use crate::template::{render, TemplateContext};
use crate::units::Units;

/// Z difference under which consecutive points belong to one planar run.
const FLAT_Z_TOLERANCE: f64 = 1e-4;

/// Format a value with a fixed number of decimals.
pub fn format_coord(value: f64, precision: usize) -> String {
    format!("{:.prec$}", value, prec = precision)
}

fn fmt3(value: f64) -> String {
    format_coord(value, 3)
}

/// Render `toolpath` as a program for `flavor`.
pub fn generate_gcode(toolpath: &Toolpath, flavor: PostFlavor, units: Units, params: &PostParams) -> String {
    GcodePost::new(flavor.config(), units).generate(toolpath, params)
}

/// Emitter bound to one dialect and unit system.
#[derive(Debug, Clone)]
pub struct GcodePost {
    config: PostConfig,
    units: Units,
}

struct Emitter<'a> {
    config: &'a PostConfig,
    units: Units,
    feed: f64,
    arcs_enabled: bool,
    tolerance: f64,
    out: String,
    arcs: usize,
}

impl GcodePost {
    /// Emitter for `config` writing in `units`.
    pub fn new(config: PostConfig, units: Units) -> Self {
        Self { config, units }
    }

    /// The dialect record.
    pub fn config(&self) -> &PostConfig {
        &self.config
    }

    /// Produce the full program text.
    pub fn generate(&self, toolpath: &Toolpath, params: &PostParams) -> String {
        let tolerance = params.max_arc_chord_error;
        let arcs_enabled = self.config.supports_arcs && tolerance > 0.0;
        let mut emitter = Emitter {
            config: &self.config,
            units: self.units,
            feed: toolpath.feed,
            arcs_enabled,
            tolerance,
            out: String::new(),
            arcs: 0,
        };

        let header = render(self.config.header, &self.header_context(toolpath, params, arcs_enabled));
        emitter.push_block(&header);

        let mut current_step = None;
        for poly in &toolpath.polylines {
            if poly.step != current_step {
                current_step = poly.step;
                if let Some(index) = poly.step.filter(|i| *i < toolpath.strategy_steps.len()) {
                    let banner = render(self.config.step_block, &step_context(toolpath, index));
                    emitter.line(&banner);
                }
            }
            emitter.polyline(poly);
        }

        let footer = render(self.config.footer, &self.footer_context(toolpath));
        emitter.push_block(&footer);

        debug!(
            post = self.config.name,
            units = %self.units,
            arcs = emitter.arcs,
            bytes = emitter.out.len(),
            "program emitted"
        );
        emitter.out
    }

    fn header_context(&self, toolpath: &Toolpath, params: &PostParams, arcs_enabled: bool) -> TemplateContext {
        let c = &self.config;
        let u = self.units;
        let machine = &toolpath.machine;
        let rapid = fmt3(u.to_units(machine.rapid_feed));
        let max_feed = fmt3(u.to_units(machine.max_feed));
        let suffix = u.feed_suffix();

        let mut ctx = TemplateContext::new();
        ctx.set("post_name", c.name)
            .set("unit_code", u.code())
            .set("unit_suffix", suffix)
            .set("unit_keyword", u.keyword())
            .set("positioning_mode", c.positioning_mode)
            .set_bool("has_plane", c.plane_code.is_some())
            .set("plane_code", c.plane_code.unwrap_or(""))
            .set_bool("has_feed_mode", c.feed_mode.is_some())
            .set("feed_mode", c.feed_mode.unwrap_or(""))
            .set_bool("has_work_offset", c.work_offset.is_some())
            .set("work_offset", c.work_offset.unwrap_or(""))
            .set_bool("spindle_supported", c.spindle_supported)
            .set_bool("spindle_requested", toolpath.spindle > 0.0)
            .set("spindle_speed", fmt3(toolpath.spindle))
            .set("spindle_on_code", c.spindle_on)
            .set("spindle_off_code", c.spindle_off)
            .set("feed_rate", fmt3(u.to_units(toolpath.feed)))
            .set(
                "machine_summary",
                format!(
                    "(Machine: {}, rapid {rapid} {suffix}, max feed {max_feed} {suffix})",
                    machine.name
                ),
            )
            .set("machine_plain", machine.name.as_str())
            .set("rapid_feed", rapid)
            .set("max_feed", max_feed)
            .set_bool("arcs_enabled", arcs_enabled)
            .set("program_end_code", c.program_end)
            .set_bool("has_toolpath", !toolpath.is_empty())
            .set_bool("has_strategy_steps", !toolpath.strategy_steps.is_empty())
            .set_bool("has_user_arcs", params.max_arc_chord_error > 0.0);
        ctx
    }

    fn footer_context(&self, toolpath: &Toolpath) -> TemplateContext {
        let c = &self.config;
        let mut ctx = TemplateContext::new();
        ctx.set_bool("spindle_supported", c.spindle_supported)
            .set_bool("spindle_requested", toolpath.spindle > 0.0)
            .set("spindle_speed", fmt3(toolpath.spindle))
            .set("spindle_off_code", c.spindle_off)
            .set("program_end_code", c.program_end)
            .set("unit_keyword", self.units.keyword());
        ctx
    }
}

fn step_context(toolpath: &Toolpath, index: usize) -> TemplateContext {
    let step = &toolpath.strategy_steps[index];
    let mut ctx = TemplateContext::new();
    ctx.set("step_number", (index + 1).to_string())
        .set("step_label", step.kind.label())
        .set("pass_kind", if step.finish_pass { "finish" } else { "rough" })
        .set("stepover_mm", fmt3(step.stepover))
        .set("stepdown_mm", fmt3(step.stepdown))
        .set_bool("has_angle", step.kind == StrategyKind::Raster)
        .set("angle_deg", format_coord(step.angle_deg, 1));
    ctx
}

fn sanitize(points: &[Point3]) -> Vec<Point3> {
    let mut kept: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points {
        match kept.last() {
            Some(prev) if (p - prev).norm() <= DEGENERATE_LENGTH => {}
            _ => kept.push(*p),
        }
    }
    kept
}

impl Emitter<'_> {
    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push_str(self.config.newline);
    }

    fn push_block(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.out.push_str(text);
        if !text.ends_with(self.config.newline) {
            self.out.push_str(self.config.newline);
        }
    }

    fn xyz(&self, p: &Point3) -> String {
        let u = self.units;
        format!(
            "X{} Y{} Z{}",
            fmt3(u.to_units(p.x)),
            fmt3(u.to_units(p.y)),
            fmt3(u.to_units(p.z))
        )
    }

    fn linear(&mut self, p: &Point3, cut: bool) {
        let coords = self.xyz(p);
        let text = match (self.config.move_style, cut) {
            (MoveStyle::GWords, true) => format!("G1 {coords}"),
            (MoveStyle::GWords, false) => format!("G0 {coords}"),
            (MoveStyle::Conversational, true) => {
                format!("L {coords} F{}", fmt3(self.units.to_units(self.feed)))
            }
            (MoveStyle::Conversational, false) => format!("L {coords} FMAX"),
        };
        self.line(&text);
    }

    fn arc(&mut self, from: &Point3, to: &Point3, fit: &ArcFit) {
        let u = self.units;
        let code = if fit.clockwise { "G2" } else { "G3" };
        let text = format!(
            "{code} {} I{} J{}",
            self.xyz(to),
            fmt3(u.to_units(fit.center.x - from.x)),
            fmt3(u.to_units(fit.center.y - from.y))
        );
        self.line(&text);
        self.arcs += 1;
    }

    fn polyline(&mut self, poly: &Polyline) {
        let pts = sanitize(&poly.points);
        if pts.len() < 2 {
            return;
        }
        let cut = poly.motion == MotionType::Cut;
        if cut && self.config.supports_feed_command {
            let feed = format!("F{}", fmt3(self.units.to_units(self.feed)));
            self.line(&feed);
        }
        self.linear(&pts[0], cut);

        let mut i = 1;
        while i < pts.len() {
            if !cut || !self.arcs_enabled || (pts[i].z - pts[i - 1].z).abs() > FLAT_Z_TOLERANCE {
                self.linear(&pts[i], cut);
                i += 1;
                continue;
            }
            let mut run_end = i;
            while run_end + 1 < pts.len() && (pts[run_end + 1].z - pts[run_end].z).abs() <= FLAT_Z_TOLERANCE {
                run_end += 1;
            }
            let mut best = None;
            for end in i + 1..=run_end {
                match fit_arc(&pts, i - 1, end, self.tolerance) {
                    Some(fit) => best = Some(fit),
                    None => break,
                }
            }
            match best {
                Some(fit) => {
                    self.arc(&pts[i - 1], &pts[fit.end], &fit);
                    i = fit.end + 1;
                }
                None => {
                    self.linear(&pts[i], cut);
                    i += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_cut(points: Vec<Point3>) -> Toolpath {
        Toolpath {
            polylines: vec![Polyline::cut(points)],
            feed: 600.0,
            spindle: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_format_coord() {
        assert_eq!(format_coord(1.0, 3), "1.000");
        assert_eq!(format_coord(-0.5, 2), "-0.50");
        assert_eq!(format_coord(12.26, 1), "12.3");
    }

    #[test]
    fn test_sanitize_drops_repeats() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let q = Point3::new(1.0 + 1e-7, 2.0, 3.0);
        assert_eq!(sanitize(&[p, q, Point3::origin()]).len(), 2);
    }

    #[test]
    fn test_degenerate_polyline_skipped() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let gcode = generate_gcode(&single_cut(vec![p, p]), PostFlavor::Grbl, Units::Millimeters, &PostParams::default());
        assert!(!gcode.contains("G1 "));
        assert!(!gcode.contains("\r\nF"));
    }

    #[test]
    fn test_rapids_use_g0_and_fmax() {
        let tp = Toolpath {
            polylines: vec![Polyline::new(
                MotionType::Rapid,
                vec![Point3::new(0.0, 0.0, 10.0), Point3::new(5.0, 0.0, 10.0)],
            )],
            ..Default::default()
        };
        let params = PostParams::default();
        let grbl = generate_gcode(&tp, PostFlavor::Grbl, Units::Millimeters, &params);
        assert!(grbl.contains("G0 X5.000 Y0.000 Z10.000\r\n"));
        let heid = generate_gcode(&tp, PostFlavor::Heidenhain, Units::Millimeters, &params);
        assert!(heid.contains("L X5.000 Y0.000 Z10.000 FMAX\n"));
    }

    #[test]
    fn test_step_banner_on_step_change() {
        use millpath_cam::StrategyStep;
        let mut tp = single_cut(vec![Point3::origin(), Point3::new(4.0, 0.0, 0.0)]);
        tp.polylines[0].step = Some(0);
        let mut second = tp.polylines[0].clone();
        second.step = Some(1);
        tp.polylines.push(second);
        tp.strategy_steps = vec![
            StrategyStep {
                kind: StrategyKind::Raster,
                stepover: 2.0,
                stepdown: 1.5,
                angle_deg: 45.0,
                finish_pass: false,
            },
            StrategyStep {
                kind: StrategyKind::Waterline,
                stepover: 1.0,
                stepdown: 0.75,
                angle_deg: 0.0,
                finish_pass: true,
            },
        ];
        let gcode = generate_gcode(&tp, PostFlavor::Fanuc, Units::Millimeters, &PostParams::default());
        assert!(gcode.contains("(STEP 1 Raster rough stepover=2.000mm stepdown=1.500mm angle=45.0deg)\r\n"));
        assert!(gcode.contains("(STEP 2 Waterline finish stepover=1.000mm stepdown=0.750mm)\r\n"));
    }

    #[test]
    fn test_inch_coordinates() {
        let tp = single_cut(vec![Point3::origin(), Point3::new(25.4, 50.8, -2.54)]);
        let gcode = generate_gcode(&tp, PostFlavor::Grbl, Units::Inches, &PostParams::default());
        assert!(gcode.contains("G20 ; units"));
        assert!(gcode.contains("G1 X1.000 Y2.000 Z-0.100"));
        assert!(gcode.contains("F23.622"));
    }
}
