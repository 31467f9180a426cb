//! Cooperative cancellation and progress reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::error::{CamError, Result};

/// Caller-owned cancel flag and progress sink for one generation request.
///
/// Progress is clamped to 0..=100 and never goes backwards within one
/// `JobControl`.
#[derive(Default)]
pub struct JobControl<'a> {
    cancel: Option<&'a AtomicBool>,
    progress: Option<&'a (dyn Fn(u8) + Sync)>,
    last: AtomicU8,
}

impl<'a> JobControl<'a> {
    /// No cancellation and no progress reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `flag` for cancellation.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Report progress through `callback`.
    pub fn with_progress(mut self, callback: &'a (dyn Fn(u8) + Sync)) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The raw cancel flag, for components that take one directly.
    pub fn cancel_flag(&self) -> Option<&'a AtomicBool> {
        self.cancel
    }

    /// True once the caller has raised the cancel flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// `Err(Cancelled)` once the caller has raised the cancel flag.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CamError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report overall progress.
    pub fn report(&self, percent: i64) {
        let Some(callback) = self.progress else {
            return;
        };
        let value = percent.clamp(0, 100) as u8;
        let previous = self.last.fetch_max(value, Ordering::Relaxed);
        if value > previous || (value == 0 && previous == 0) {
            callback(value);
        }
    }

    /// Progress sink for pass `index` of `count`, mapped onto 0..=99.
    pub fn pass(&self, index: usize, count: usize) -> PassProgress<'_, 'a> {
        let count = count.max(1);
        PassProgress {
            control: self,
            start: index as f64 / count as f64 * 100.0,
            span: 100.0 / count as f64,
        }
    }
}

impl fmt::Debug for JobControl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobControl")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("last", &self.last.load(Ordering::Relaxed))
            .finish()
    }
}

/// Per-pass view of a [`JobControl`].
#[derive(Debug, Clone, Copy)]
pub struct PassProgress<'c, 'a> {
    control: &'c JobControl<'a>,
    start: f64,
    span: f64,
}

impl PassProgress<'_, '_> {
    /// Report local progress (0..=100) within the pass.
    pub fn report(&self, local: i64) {
        let normalized = local.clamp(0, 100) as f64 / 100.0;
        let value = (self.start + self.span * normalized).min(99.0);
        self.control.report(value as i64);
    }

    /// See [`JobControl::check`].
    pub fn check(&self) -> Result<()> {
        self.control.check()
    }

    /// The underlying control.
    pub fn control(&self) -> &JobControl<'_> {
        self.control
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_check_follows_flag() {
        let flag = AtomicBool::new(false);
        let control = JobControl::new().with_cancel(&flag);
        assert!(control.check().is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(control.check(), Err(CamError::Cancelled));
    }

    #[test]
    fn test_progress_monotone_and_clamped() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let control = JobControl::new().with_progress(&sink);
        control.report(0);
        control.report(40);
        control.report(20);
        control.report(250);
        assert_eq!(*seen.lock().unwrap(), vec![0, 40, 100]);
    }

    #[test]
    fn test_pass_progress_capped_below_100() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: u8| seen.lock().unwrap().push(p);
        let control = JobControl::new().with_progress(&sink);
        control.pass(0, 2).report(50);
        control.pass(1, 2).report(100);
        assert_eq!(*seen.lock().unwrap(), vec![25, 99]);
    }

    #[test]
    fn test_no_callback_is_silent() {
        let control = JobControl::new();
        control.report(50);
        assert!(!control.is_cancelled());
    }
}
