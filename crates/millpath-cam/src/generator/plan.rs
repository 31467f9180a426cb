//! Turning strategy steps into concrete pass profiles.

use millpath_math::normalize_degrees;
use serde::{Deserialize, Serialize};

use crate::params::UserParams;
use crate::strategy::{StrategyKind, StrategyStep};
use crate::tool::safe_diameter;

const MIN_STEP: f64 = 0.1;
const MIN_ROUGH_FINISH_GAP: f64 = 0.05;
const MIN_ALLOWANCE: f64 = 1e-4;

/// Whether a pass removes bulk material or produces the final surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassRole {
    /// Leaves `allowance` on the surface.
    Rough,
    /// Cuts to the surface.
    Finish,
}

impl PassRole {
    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            PassRole::Rough => "Roughing",
            PassRole::Finish => "Finishing",
        }
    }
}

/// A normalized, ready-to-generate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassProfile {
    /// Position in the plan.
    pub index: usize,
    /// Geometry family.
    pub kind: StrategyKind,
    /// Rough or finish.
    pub role: PassRole,
    /// Lateral spacing (mm).
    pub stepover: f64,
    /// Vertical spacing (mm).
    pub stepdown: f64,
    /// Raster angle in [0, 360) degrees.
    pub angle_deg: f64,
    /// Material left on the surface (mm).
    pub allowance: f64,
}

impl PassProfile {
    /// The step this profile resolves to.
    pub fn to_step(&self) -> StrategyStep {
        StrategyStep {
            kind: self.kind,
            stepover: self.stepover,
            stepdown: self.stepdown,
            angle_deg: self.angle_deg,
            finish_pass: self.role == PassRole::Finish,
        }
    }
}

/// Resolve `steps` against `params`.
///
/// Never returns an empty plan: when every step is filtered out a single
/// raster finish pass is synthesized.
pub fn build_pass_plan(params: &UserParams, steps: &[StrategyStep]) -> Vec<PassProfile> {
    let diameter = safe_diameter(params.tool_diameter);

    let base_step = match steps.first() {
        Some(s) if s.stepover > 0.0 => s.stepover,
        _ if params.step_over > 0.0 => params.step_over,
        _ => diameter * 0.4,
    };
    let finish_step = base_step.clamp(MIN_STEP, (diameter * 0.45).max(MIN_STEP));
    let rough_step = {
        let lo = finish_step + MIN_ROUGH_FINISH_GAP;
        let hi = diameter;
        if hi - lo < 0.0 {
            diameter.min(finish_step * 1.5)
        } else {
            let wanted = params.step_over.max(finish_step).max(diameter * 0.65);
            let step = wanted.clamp(lo, hi);
            if step - finish_step < MIN_ROUGH_FINISH_GAP {
                diameter.min(finish_step * 1.5)
            } else {
                step
            }
        }
    };

    let allowance = params.stock_allowance.clamp(0.0, diameter);
    let rough_allowed = params.enable_rough_pass && allowance > MIN_ALLOWANCE;
    let has_rough = rough_allowed && steps.iter().any(|s| !s.finish_pass);
    let user_stepdown = params.max_depth_per_pass;

    let mut plan = Vec::with_capacity(steps.len().max(1));
    for step in steps {
        let angle_deg = resolve_angle(step.angle_deg, params.raster_angle_deg);
        let rough_stepdown = if step.stepdown > 0.0 { step.stepdown } else { user_stepdown }.max(MIN_STEP);

        let profile = if !step.finish_pass {
            if !rough_allowed {
                continue;
            }
            PassProfile {
                index: plan.len(),
                kind: step.kind,
                role: PassRole::Rough,
                stepover: rough_step,
                stepdown: rough_stepdown,
                angle_deg,
                allowance,
            }
        } else {
            if !params.enable_finish_pass {
                continue;
            }
            let stepover = if has_rough {
                finish_step.min(rough_step * 0.75)
            } else {
                finish_step
            };
            PassProfile {
                index: plan.len(),
                kind: step.kind,
                role: PassRole::Finish,
                stepover: stepover.clamp(MIN_STEP, diameter.max(MIN_STEP)),
                stepdown: (rough_stepdown * 0.5).max(MIN_STEP),
                angle_deg,
                allowance: 0.0,
            }
        };
        plan.push(profile);
    }

    if plan.is_empty() {
        plan.push(PassProfile {
            index: 0,
            kind: StrategyKind::Raster,
            role: PassRole::Finish,
            stepover: finish_step.clamp(MIN_STEP, diameter.max(MIN_STEP)),
            stepdown: (user_stepdown.max(MIN_STEP) * 0.5).max(MIN_STEP),
            angle_deg: resolve_angle(0.0, params.raster_angle_deg),
            allowance: 0.0,
        });
    }
    plan
}

fn resolve_angle(step_angle: f64, user_angle: f64) -> f64 {
    if step_angle != 0.0 && step_angle.is_finite() {
        normalize_degrees(step_angle)
    } else {
        normalize_degrees(user_angle)
    }
}
