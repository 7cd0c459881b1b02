//! Stage observation hooks.
//!
//! The builder calls a [`PipelineObserver`] around every stage of a pass and
//! once more with the finished list. [`NoopObserver`] is the default;
//! [`StageTimingObserver`] collects one [`StageReport`] per stage.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::state::PipelineState;
use crate::render::RenderList;

/// Per-stage timing and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    elapsed_us: u64,
    entries: Option<usize>,
    groups: Option<usize>,
    excluded: Option<usize>,
    promoted: Option<usize>,
    dissolved: Option<usize>,
}

impl StageReport {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            elapsed_us: elapsed.as_micros() as u64,
            ..Self::default()
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Top-level entries after the stage.
    pub fn entries(&self) -> Option<usize> {
        self.entries
    }

    pub fn groups(&self) -> Option<usize> {
        self.groups
    }

    /// Leaves excluded by a filter chain or dropped as duplicate summaries.
    pub fn excluded(&self) -> Option<usize> {
        self.excluded
    }

    pub fn promoted(&self) -> Option<usize> {
        self.promoted
    }

    pub fn dissolved(&self) -> Option<usize> {
        self.dissolved
    }
}

/// Builder for [`StageReport`]s carrying counters.
#[derive(Debug, Clone)]
pub struct StageReportBuilder {
    report: StageReport,
}

impl StageReportBuilder {
    pub fn new(elapsed: Duration) -> Self {
        Self {
            report: StageReport::new(elapsed),
        }
    }

    pub fn entries(mut self, n: usize) -> Self {
        self.report.entries = Some(n);
        self
    }

    pub fn groups(mut self, n: usize) -> Self {
        self.report.groups = Some(n);
        self
    }

    pub fn excluded(mut self, n: usize) -> Self {
        self.report.excluded = Some(n);
        self
    }

    pub fn promoted(mut self, n: usize) -> Self {
        self.report.promoted = Some(n);
        self
    }

    pub fn dissolved(mut self, n: usize) -> Self {
        self.report.dissolved = Some(n);
        self
    }

    pub fn build(self) -> StageReport {
        self.report
    }
}

/// Wall-clock timer for one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageClock(Instant);

impl StageClock {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Hooks invoked by the builder during a pass. All methods default to no-ops.
pub trait PipelineObserver {
    fn on_stage_start(&mut self, _stage: PipelineState) {}

    fn on_stage_end(&mut self, _stage: PipelineState, _report: &StageReport) {}

    /// Called after the render listener, once per completed pass.
    fn on_pass_complete(&mut self, _iteration: u64, _list: &RenderList) {}
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Observer recording a report per stage and the number of completed passes.
#[derive(Debug, Clone, Default)]
pub struct StageTimingObserver {
    reports: Vec<(PipelineState, StageReport)>,
    passes: u64,
}

impl StageTimingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[(PipelineState, StageReport)] {
        &self.reports
    }

    /// The most recent report for `stage`.
    pub fn report_for(&self, stage: PipelineState) -> Option<&StageReport> {
        self.reports
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|(_, report)| report)
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Total time spent in stages across all recorded passes.
    pub fn total_elapsed_us(&self) -> u64 {
        self.reports.iter().map(|(_, r)| r.elapsed_us()).sum()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
        self.passes = 0;
    }
}

impl PipelineObserver for StageTimingObserver {
    fn on_stage_end(&mut self, stage: PipelineState, report: &StageReport) {
        self.reports.push((stage, report.clone()));
    }

    fn on_pass_complete(&mut self, _iteration: u64, _list: &RenderList) {
        self.passes += 1;
    }
}
