//! Cutter geometry.

use serde::{Deserialize, Serialize};

/// Smallest diameter the planner works with (mm).
pub const MIN_TOOL_DIAMETER: f64 = 0.1;

/// Cutter tip shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutterType {
    /// Flat end mill.
    #[default]
    FlatEndMill,
    /// Ball nose end mill.
    BallNose,
}

impl CutterType {
    /// Height of the tool reference point above the contact point on a
    /// horizontal surface. Ball noses are programmed from the ball centre.
    pub fn tip_offset(self, diameter: f64) -> f64 {
        match self {
            CutterType::FlatEndMill => 0.0,
            CutterType::BallNose => (diameter * 0.5).max(0.0),
        }
    }

    /// Radius used to offset waterline contours outward.
    pub fn contour_offset(self, diameter: f64) -> f64 {
        match self {
            CutterType::FlatEndMill => diameter * 0.5,
            CutterType::BallNose => 0.0,
        }
    }

    /// Whether waterline contours are offset by the cutter radius.
    pub fn offsets_contours(self) -> bool {
        matches!(self, CutterType::FlatEndMill)
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            CutterType::FlatEndMill => "Flat End Mill",
            CutterType::BallNose => "Ball Nose",
        }
    }
}

/// Diameter floored to [`MIN_TOOL_DIAMETER`].
pub fn safe_diameter(diameter: f64) -> f64 {
    diameter.max(MIN_TOOL_DIAMETER)
}
