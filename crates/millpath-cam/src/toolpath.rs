//! Toolpath representation.

use millpath_math::{Point3, POSITION_EPSILON};
use serde::{Deserialize, Serialize};

use crate::params::{Machine, Stock};
use crate::strategy::StrategyStep;

/// How a polyline is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionType {
    /// Cutting move at the programmed feed.
    #[default]
    Cut,
    /// Non-cutting link. Posted like a rapid.
    Link,
    /// Rapid traverse.
    Rapid,
}

/// An ordered run of points sharing one motion type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    /// Motion type.
    pub motion: MotionType,
    /// Points in travel order (mm).
    pub points: Vec<Point3>,
    /// Index into [`Toolpath::strategy_steps`] of the pass that owns this polyline.
    #[serde(default)]
    pub step: Option<usize>,
}

impl Polyline {
    /// A polyline with the given motion and points.
    pub fn new(motion: MotionType, points: Vec<Point3>) -> Self {
        Self {
            motion,
            points,
            step: None,
        }
    }

    /// A cut polyline.
    pub fn cut(points: Vec<Point3>) -> Self {
        Self::new(MotionType::Cut, points)
    }

    /// True for anything that is not a cut.
    pub fn is_rapid(&self) -> bool {
        self.motion != MotionType::Cut
    }

    /// First point.
    pub fn start(&self) -> Option<&Point3> {
        self.points.first()
    }

    /// Last point.
    pub fn end(&self) -> Option<&Point3> {
        self.points.last()
    }

    /// 3D length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Reverse travel direction.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }
}

/// Drop consecutive points closer than [`POSITION_EPSILON`].
pub(crate) fn prune_duplicates(points: &mut Vec<Point3>) {
    if points.len() < 2 {
        return;
    }
    let mut kept: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points.drain(..) {
        match kept.last() {
            Some(prev) if (p - prev).norm() <= POSITION_EPSILON => {}
            _ => kept.push(p),
        }
    }
    *points = kept;
}

/// A complete, ordered toolpath with the settings it was finalized against.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Toolpath {
    /// Polylines in execution order.
    pub polylines: Vec<Polyline>,
    /// Cutting feed after machine clamping (mm/min).
    pub feed: f64,
    /// Spindle speed after machine clamping (rpm).
    pub spindle: f64,
    /// Rapid traverse rate (mm/min).
    pub rapid_feed: f64,
    /// Machine the path was finalized against.
    pub machine: Machine,
    /// Stock the path was finalized against.
    pub stock: Stock,
    /// Normalized steps, one per planned pass.
    #[serde(default)]
    pub strategy_steps: Vec<StrategyStep>,
}

impl Toolpath {
    /// True when there are no polylines.
    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty()
    }

    /// Number of cut polylines.
    pub fn cut_count(&self) -> usize {
        self.polylines.iter().filter(|p| p.motion == MotionType::Cut).count()
    }

    /// Total number of points.
    pub fn point_count(&self) -> usize {
        self.polylines.iter().map(|p| p.points.len()).sum()
    }

    /// Total 3D travel length, rapids included.
    pub fn length(&self) -> f64 {
        self.polylines.iter().map(Polyline::length).sum()
    }

    /// Iterator over cut polylines.
    pub fn cuts(&self) -> impl Iterator<Item = &Polyline> {
        self.polylines.iter().filter(|p| p.motion == MotionType::Cut)
    }
}
