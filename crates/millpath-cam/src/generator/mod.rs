//! Toolpath generation pipeline.
//!
//! A request runs through: strategy decision, pass planning, per-pass
//! geometry (waterline, height-field raster or flat fallback), greedy
//! reordering, leave-stock lifting and finalization with entry and exit
//! motion.

mod fallback;
mod finalize;
mod motion;
mod plan;
mod raster;
mod reorder;
mod waterline;

pub use finalize::{apply_leave_stock, finalize_toolpath};
pub use motion::{apply_machine_motion, MIN_CLEARANCE_OFFSET, MIN_SAFE_GAP};
pub use plan::{build_pass_plan, PassProfile, PassRole};
pub use raster::height_field_resolution;
pub use reorder::reorder_range;

use std::sync::Arc;

use millpath_math::Aabb;
use millpath_mesh::Mesh;
use tracing::{debug, info, warn};

use crate::control::{JobControl, PassProgress};
use crate::dropcutter::HeightFieldCache;
use crate::error::{CamError, Result};
use crate::params::UserParams;
use crate::strategy::{DefaultStrategy, StrategyKind, StrategyPredictor, StrategyStep};
use crate::toolpath::{Polyline, Toolpath};

/// Plans toolpaths for meshes. Cheap to share; holds only the height
/// field cache.
#[derive(Debug, Clone)]
pub struct ToolpathGenerator {
    cache: Arc<HeightFieldCache>,
}

impl Default for ToolpathGenerator {
    fn default() -> Self {
        Self::new(Arc::new(HeightFieldCache::default()))
    }
}

impl ToolpathGenerator {
    /// Generator sharing `cache` with other generators.
    pub fn new(cache: Arc<HeightFieldCache>) -> Self {
        Self { cache }
    }

    /// The height field cache.
    pub fn cache(&self) -> &Arc<HeightFieldCache> {
        &self.cache
    }

    /// Plan a complete toolpath for `mesh`.
    ///
    /// Only an invalid tool diameter or unusable settings are errors. An
    /// empty or invalid mesh yields an empty, finalized toolpath, and a
    /// cancelled request yields `Toolpath::default()`.
    pub fn generate(
        &self,
        mesh: &Mesh,
        params: &UserParams,
        predictor: &dyn StrategyPredictor,
        control: &JobControl,
    ) -> Result<Toolpath> {
        params.validate()?;
        match self.run(mesh, params, predictor, control) {
            Err(CamError::Cancelled) => {
                info!("toolpath generation cancelled");
                Ok(Toolpath::default())
            }
            other => other,
        }
    }

    fn run(
        &self,
        mesh: &Mesh,
        params: &UserParams,
        predictor: &dyn StrategyPredictor,
        control: &JobControl,
    ) -> Result<Toolpath> {
        let bounds = match mesh.bounds() {
            Some(b) if mesh.is_valid() => b,
            _ => {
                warn!("mesh is empty or invalid; emitting an empty toolpath");
                let mut toolpath = Toolpath::default();
                finalize_toolpath(&mut toolpath, params);
                return Ok(toolpath);
            }
        };
        control.check()?;
        control.report(0);

        let steps = decide(mesh, params, predictor);
        let plan = build_pass_plan(params, &steps);
        info!(
            passes = plan.len(),
            triangles = mesh.num_triangles(),
            tool = params.tool_diameter,
            "pass plan ready"
        );

        let mut toolpath = Toolpath {
            strategy_steps: plan.iter().map(PassProfile::to_step).collect(),
            ..Default::default()
        };
        let mut ranges = Vec::with_capacity(plan.len());
        for profile in &plan {
            control.check()?;
            let progress = control.pass(profile.index, plan.len());
            let mut cuts = self.pass_geometry(mesh, &bounds, params, profile, &progress)?;
            if cuts.is_empty() {
                debug!(pass = profile.index, "no surface passes; using flat fallback");
                cuts = fallback::fallback_pass(mesh, params, profile, &progress)?;
            }
            control.check()?;

            for cut in &mut cuts {
                cut.step = Some(profile.index);
            }
            info!(
                pass = profile.index,
                role = profile.role.label(),
                kind = profile.kind.label(),
                stepover = profile.stepover,
                stepdown = profile.stepdown,
                polylines = cuts.len(),
                "pass generated"
            );
            let start = toolpath.polylines.len();
            toolpath.polylines.extend(cuts);
            ranges.push(start..toolpath.polylines.len());
        }

        if !toolpath.is_empty() {
            let mut seed = None;
            for range in ranges.into_iter().filter(|r| !r.is_empty()) {
                seed = Some(reorder_range(&mut toolpath.polylines[range], seed));
            }
            apply_leave_stock(&mut toolpath, mesh, params);
        }
        control.check()?;

        finalize_toolpath(&mut toolpath, params);
        control.report(100);
        info!(
            polylines = toolpath.polylines.len(),
            cuts = toolpath.cut_count(),
            length = toolpath.length(),
            "toolpath ready"
        );
        Ok(toolpath)
    }

    fn pass_geometry(
        &self,
        mesh: &Mesh,
        bounds: &Aabb,
        params: &UserParams,
        profile: &PassProfile,
        progress: &PassProgress,
    ) -> Result<Vec<Polyline>> {
        match profile.kind {
            StrategyKind::Waterline => waterline::waterline_pass(mesh, params, profile, progress),
            StrategyKind::Raster if params.use_height_field => {
                let resolution = height_field_resolution(profile.stepover);
                match self.cache.acquire(mesh, resolution, progress.control()) {
                    Some(hit) => {
                        debug!(resolution, reused = hit.reused, "height field acquired");
                        raster::raster_pass(bounds, &hit.field, params, profile, progress)
                    }
                    None => {
                        progress.check()?;
                        Ok(Vec::new())
                    }
                }
            }
            StrategyKind::Raster => Ok(Vec::new()),
        }
    }
}

fn decide(mesh: &Mesh, params: &UserParams, predictor: &dyn StrategyPredictor) -> Vec<StrategyStep> {
    if let Some(steps) = params.active_override() {
        debug!(steps = steps.len(), "using strategy override");
        return steps.to_vec();
    }
    match predictor.predict(mesh, params) {
        Ok(decision) => decision.steps,
        Err(err) => {
            warn!(error = %err, "strategy predictor failed; using default strategy");
            DefaultStrategy::decision(params).steps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{FixedStrategy, StrategyDecision};
    use std::sync::atomic::AtomicBool;

    struct Failing;

    impl StrategyPredictor for Failing {
        fn predict(&self, _mesh: &Mesh, _params: &UserParams) -> Result<StrategyDecision> {
            Err(CamError::Strategy("model unavailable".into()))
        }
    }

    fn bump() -> Mesh {
        // A 20 x 20 square with a raised centre vertex.
        Mesh::from_positions(
            vec![
                0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 20.0, 20.0, 0.0, 0.0, 20.0, 0.0, 10.0, 10.0, 4.0,
            ],
            vec![0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4],
        )
    }

    fn params() -> UserParams {
        let mut p = UserParams {
            tool_diameter: 4.0,
            step_over: 2.0,
            max_depth_per_pass: 2.0,
            ..Default::default()
        };
        p.stock.top_z = 5.0;
        p.machine.clearance_z = 8.0;
        p.machine.safe_z = 12.0;
        p
    }

    #[test]
    fn test_invalid_diameter_is_error() {
        let p = UserParams {
            tool_diameter: -1.0,
            ..Default::default()
        };
        let result = ToolpathGenerator::default().generate(&bump(), &p, &DefaultStrategy, &JobControl::new());
        assert_eq!(result, Err(CamError::InvalidToolDiameter(-1.0)));
    }

    #[test]
    fn test_empty_mesh_gives_finalized_empty_path() {
        let tp = ToolpathGenerator::default()
            .generate(&Mesh::new(), &params(), &DefaultStrategy, &JobControl::new())
            .unwrap();
        assert!(tp.is_empty());
        assert_eq!(tp.feed, 800.0);
        assert_eq!(tp.machine.clearance_z, 8.0);
    }

    #[test]
    fn test_cancelled_returns_default() {
        let flag = AtomicBool::new(true);
        let control = JobControl::new().with_cancel(&flag);
        let tp = ToolpathGenerator::default()
            .generate(&bump(), &params(), &DefaultStrategy, &control)
            .unwrap();
        assert_eq!(tp, Toolpath::default());
    }

    #[test]
    fn test_failing_predictor_falls_back_to_default() {
        let tp = ToolpathGenerator::default()
            .generate(&bump(), &params(), &Failing, &JobControl::new())
            .unwrap();
        assert_eq!(tp.strategy_steps.len(), 2);
        assert!(!tp.strategy_steps[0].finish_pass);
        assert_eq!(tp.strategy_steps[0].angle_deg, 45.0);
        assert!(tp.cut_count() > 0);
    }

    #[test]
    fn test_override_beats_predictor() {
        let mut p = params();
        p.strategy_override = Some(vec![StrategyStep {
            kind: StrategyKind::Waterline,
            ..Default::default()
        }]);
        let tp = ToolpathGenerator::default()
            .generate(&bump(), &p, &Failing, &JobControl::new())
            .unwrap();
        assert_eq!(tp.strategy_steps.len(), 1);
        assert_eq!(tp.strategy_steps[0].kind, StrategyKind::Waterline);
        assert!(tp.polylines.iter().all(|pl| pl.step == Some(0)));
    }

    #[test]
    fn test_height_field_disabled_uses_fallback() {
        let mut p = params();
        p.use_height_field = false;
        let predictor = FixedStrategy::new(vec![StrategyStep::default()]);
        let tp = ToolpathGenerator::default()
            .generate(&bump(), &p, &predictor, &JobControl::new())
            .unwrap();
        let cut_z: Vec<f64> = tp
            .cuts()
            .filter(|c| c.points.iter().all(|q| (q.z - c.points[0].z).abs() < 1e-9))
            .map(|c| c.points[0].z)
            .collect();
        assert!(cut_z.iter().any(|z| z.abs() < 1e-9));
    }

    #[test]
    fn test_cache_is_reused_across_requests() {
        let cache = Arc::new(HeightFieldCache::default());
        let generator = ToolpathGenerator::new(Arc::clone(&cache));
        let mesh = bump();
        let predictor = FixedStrategy::new(vec![StrategyStep::default()]);
        generator
            .generate(&mesh, &params(), &predictor, &JobControl::new())
            .unwrap();
        assert_eq!(cache.len(), 1);
        generator
            .generate(&mesh, &params(), &predictor, &JobControl::new())
            .unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_progress_ends_at_100() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let control = JobControl::new().with_progress(&sink);
        ToolpathGenerator::default()
            .generate(&bump(), &params(), &DefaultStrategy, &control)
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
