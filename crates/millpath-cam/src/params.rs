//! Machining parameters: stock, machine and per-job user settings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CamError, Result};
use crate::strategy::StrategyStep;
use crate::tool::CutterType;

/// Stock blank shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockShape {
    /// Rectangular block.
    #[default]
    Block,
}

/// Raw material the part is cut from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stock {
    /// Blank shape.
    pub shape: StockShape,
    /// Blank size [x, y, z] (mm).
    pub size: [f64; 3],
    /// Blank origin [x, y, z] (mm).
    pub origin: [f64; 3],
    /// Top face height (mm). Cuts never start above it.
    pub top_z: f64,
    /// Extra material around the part (mm).
    pub margin: f64,
}

impl Stock {
    /// Clamp dimensions and margin to be non-negative.
    pub fn ensure_valid(&mut self) {
        for v in &mut self.size {
            *v = v.max(0.0);
        }
        self.margin = self.margin.max(0.0);
    }
}

/// Machine limits and retract heights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Machine {
    /// Display name.
    pub name: String,
    /// Rapid traverse rate (mm/min).
    pub rapid_feed: f64,
    /// Maximum programmable feed (mm/min). Zero means unlimited.
    pub max_feed: f64,
    /// Maximum spindle speed (rpm). Zero means unlimited.
    pub max_spindle: f64,
    /// Height above which horizontal moves are collision free (mm).
    pub clearance_z: f64,
    /// Retract height between disconnected cuts (mm).
    pub safe_z: f64,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            name: "Generic Router".to_string(),
            rapid_feed: 3000.0,
            max_feed: 2000.0,
            max_spindle: 12000.0,
            clearance_z: 5.0,
            safe_z: 15.0,
        }
    }
}

impl Machine {
    /// Clamp feeds, spindle and clearance to be non-negative and keep
    /// `safe_z` at or above `clearance_z`.
    pub fn ensure_valid(&mut self) {
        self.rapid_feed = self.rapid_feed.max(0.0);
        self.max_feed = self.max_feed.max(0.0);
        self.max_spindle = self.max_spindle.max(0.0);
        self.clearance_z = self.clearance_z.max(0.0);
        self.safe_z = self.safe_z.max(self.clearance_z);
    }
}

/// Milling direction relative to spindle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutDirection {
    /// Climb milling; passes keep their generated order.
    #[default]
    Climb,
    /// Conventional milling; every pass is reversed.
    Conventional,
}

/// Post-processor tuning carried with the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostParams {
    /// Maximum deviation between a fitted arc and its points (mm).
    /// Zero disables arc output.
    pub max_arc_chord_error: f64,
}

impl Default for PostParams {
    fn default() -> Self {
        Self {
            max_arc_chord_error: 0.05,
        }
    }
}

/// User-facing machining configuration for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserParams {
    /// Cutter diameter (mm).
    pub tool_diameter: f64,
    /// Cutter tip shape.
    pub cutter: CutterType,
    /// Lateral spacing between passes (mm).
    pub step_over: f64,
    /// Maximum depth removed per level (mm).
    pub max_depth_per_pass: f64,
    /// Cutting feed (mm/min).
    pub feed: f64,
    /// Spindle speed (rpm).
    pub spindle: f64,
    /// Raster angle used when a step carries none (degrees).
    pub raster_angle_deg: f64,
    /// Allow roughing passes.
    pub enable_rough_pass: bool,
    /// Allow finishing passes.
    pub enable_finish_pass: bool,
    /// Material left by roughing for the finish pass (mm).
    pub stock_allowance: f64,
    /// Minimum material left on the finished surface (mm).
    pub leave_stock: f64,
    /// Entry ramp angle (degrees).
    pub ramp_angle_deg: f64,
    /// Ramp into cuts instead of plunging.
    pub enable_ramp: bool,
    /// Prefer a helical entry over a straight ramp.
    pub enable_helical: bool,
    /// Helix radius (mm). Zero means half the tool diameter.
    pub ramp_radius: f64,
    /// Straight extension before each cut (mm).
    pub lead_in_length: f64,
    /// Straight extension after each cut (mm).
    pub lead_out_length: f64,
    /// Climb or conventional.
    pub cut_direction: CutDirection,
    /// Sample rasters from the cached height field.
    pub use_height_field: bool,
    /// Explicit strategy steps that bypass the predictor.
    pub strategy_override: Option<Vec<StrategyStep>>,
    /// Stock blank.
    pub stock: Stock,
    /// Machine limits.
    pub machine: Machine,
    /// Post-processor tuning.
    pub post: PostParams,
}

impl Default for UserParams {
    fn default() -> Self {
        Self {
            tool_diameter: 6.0,
            cutter: CutterType::FlatEndMill,
            step_over: 3.0,
            max_depth_per_pass: 1.0,
            feed: 800.0,
            spindle: 12000.0,
            raster_angle_deg: 0.0,
            enable_rough_pass: true,
            enable_finish_pass: true,
            stock_allowance: 0.3,
            leave_stock: 0.0,
            ramp_angle_deg: 3.0,
            enable_ramp: true,
            enable_helical: false,
            ramp_radius: 0.0,
            lead_in_length: 0.0,
            lead_out_length: 0.0,
            cut_direction: CutDirection::Climb,
            use_height_field: true,
            strategy_override: None,
            stock: Stock::default(),
            machine: Machine::default(),
            post: PostParams::default(),
        }
    }
}

impl UserParams {
    /// Check the settings that cannot be repaired by clamping.
    ///
    /// A non-positive or non-finite tool diameter is the only fatal value;
    /// the remaining checks reject NaN feeds and spacings.
    pub fn validate(&self) -> Result<()> {
        if !self.tool_diameter.is_finite() || self.tool_diameter <= 0.0 {
            return Err(CamError::InvalidToolDiameter(self.tool_diameter));
        }
        for (name, value) in [
            ("step_over", self.step_over),
            ("max_depth_per_pass", self.max_depth_per_pass),
            ("feed", self.feed),
            ("spindle", self.spindle),
            ("stock.top_z", self.stock.top_z),
        ] {
            if value.is_nan() {
                return Err(CamError::InvalidSettings(format!("{name} is NaN")));
            }
        }
        Ok(())
    }

    /// Overrides that are present and non-empty.
    pub fn active_override(&self) -> Option<&[StrategyStep]> {
        match &self.strategy_override {
            Some(steps) if !steps.is_empty() => Some(steps),
            Some(_) => {
                debug!("ignoring empty strategy override");
                None
            }
            None => None,
        }
    }
}
