//! Machining strategy model and the predictor seam.
//!
//! A [`StrategyDecision`] is an ordered list of [`StrategyStep`]s. It comes
//! either from the user's override list or from a [`StrategyPredictor`].
//! [`DefaultStrategy`] is the built-in predictor and the fallback when an
//! external one fails.

use millpath_mesh::Mesh;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::UserParams;

/// Pass geometry family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Parallel sweeps at an angle following the sampled surface.
    #[default]
    Raster,
    /// Constant-Z contours.
    Waterline,
}

impl StrategyKind {
    /// Label used in program comments.
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Raster => "Raster",
            StrategyKind::Waterline => "Waterline",
        }
    }
}

/// One requested machining step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyStep {
    /// Geometry family.
    pub kind: StrategyKind,
    /// Lateral spacing (mm). Zero defers to the user setting.
    pub stepover: f64,
    /// Vertical spacing (mm). Zero defers to the user setting.
    pub stepdown: f64,
    /// Raster angle (degrees). Zero defers to the user setting.
    pub angle_deg: f64,
    /// Finishing step when set, roughing otherwise.
    #[serde(alias = "finish")]
    pub finish_pass: bool,
}

impl Default for StrategyStep {
    fn default() -> Self {
        Self {
            kind: StrategyKind::Raster,
            stepover: 0.0,
            stepdown: 0.0,
            angle_deg: 0.0,
            finish_pass: true,
        }
    }
}

/// Ordered steps for one generation request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyDecision {
    /// Steps in execution order.
    pub steps: Vec<StrategyStep>,
}

/// Source of strategy decisions.
///
/// Implementations must be callable from the generator's worker thread.
pub trait StrategyPredictor: Send + Sync {
    /// Choose the steps for `mesh` under `params`.
    fn predict(&self, mesh: &Mesh, params: &UserParams) -> Result<StrategyDecision>;
}

/// Rough then finish raster at 45 degrees using the user's spacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl DefaultStrategy {
    /// Raster angle of both steps (degrees).
    pub const ANGLE_DEG: f64 = 45.0;

    /// The decision for `params`.
    pub fn decision(params: &UserParams) -> StrategyDecision {
        let rough = StrategyStep {
            kind: StrategyKind::Raster,
            stepover: params.step_over,
            stepdown: params.max_depth_per_pass,
            angle_deg: Self::ANGLE_DEG,
            finish_pass: false,
        };
        let finish = StrategyStep {
            finish_pass: true,
            stepdown: params.max_depth_per_pass * 0.5,
            ..rough.clone()
        };
        StrategyDecision {
            steps: vec![rough, finish],
        }
    }
}

impl StrategyPredictor for DefaultStrategy {
    fn predict(&self, _mesh: &Mesh, params: &UserParams) -> Result<StrategyDecision> {
        Ok(Self::decision(params))
    }
}

/// Predictor that always returns the same decision.
#[derive(Debug, Clone, Default)]
pub struct FixedStrategy(pub StrategyDecision);

impl FixedStrategy {
    /// A predictor returning `steps`.
    pub fn new(steps: Vec<StrategyStep>) -> Self {
        Self(StrategyDecision { steps })
    }
}

impl StrategyPredictor for FixedStrategy {
    fn predict(&self, _mesh: &Mesh, _params: &UserParams) -> Result<StrategyDecision> {
        Ok(self.0.clone())
    }
}
