//! The list builder: runs one pass through every stage of the pipeline.
//!
//! A pass turns the current leaf set into a sorted, grouped
//! [`RenderList`]. Stages run strictly in [`PipelineState::PASS_STAGES`]
//! order; before and after each one the builder checks the
//! [`InvalidationInbox`] for an out-of-order invalidation and notifies the
//! [`PipelineObserver`].
//!
//! A pass that fails leaves the builder idle and delivers nothing.
//! Invalidations that arrive in time schedule another pass, which runs
//! right after the current one, up to
//! [`ListBuilderConfig::max_consecutive_rebuilds`] times in a row.

use std::fmt;
use std::sync::Arc;

use super::filtering;
use super::grouping;
use super::invalidation::InvalidationInbox;
use super::observer::{NoopObserver, PipelineObserver, StageClock, StageReport, StageReportBuilder};
use super::promotion;
use super::registry::{fire, LifecycleListeners, PluggableRegistry};
use super::sorting;
use super::state::PipelineState;
use super::traits::{NotifComparator, NotifFilter, NotifPromoter, NotifSectioner};
use crate::clock::{Clock, SystemClock};
use crate::dispatch::RenderListListener;
use crate::entry::{EntryArena, EntryView, GroupEntry, Leaf, ListEntry};
use crate::errors::{ListBuilderError, Result};
use crate::render::RenderList;
use crate::types::{EntryKey, GroupKey, ListBuilderConfig, Notification};

/// Returns the inbox to idle if a pass ends early, by error or by panic.
struct PassGuard {
    inbox: Arc<InvalidationInbox>,
    armed: bool,
}

impl PassGuard {
    fn new(inbox: &Arc<InvalidationInbox>) -> Self {
        Self {
            inbox: inbox.clone(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        if self.armed {
            log_warn!(state = %self.inbox.state(), "pass aborted");
            self.inbox.abort();
        }
    }
}

fn count_groups(top_level: &[ListEntry]) -> usize {
    top_level.iter().filter(|entry| entry.is_group()).count()
}

#[cfg(feature = "tracing")]
fn log_parenting_changes(arena: &EntryArena) {
    for leaf in arena.leaves() {
        if leaf.parent() != leaf.previous_parent() {
            tracing::trace!(
                entry = %leaf.key(),
                from = ?leaf.previous_parent(),
                to = ?leaf.parent(),
                "parent changed"
            );
        }
    }
    for group in arena.groups() {
        if group.parent() != group.previous_parent() {
            tracing::trace!(
                entry = %group.key(),
                from = ?group.previous_parent(),
                to = ?group.parent(),
                "parent changed"
            );
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn log_parenting_changes(_arena: &EntryArena) {}

// ============================================================================
// ListBuilder
// ============================================================================

/// Staged builder for the notification list.
///
/// Owns the entry arena, the pluggable chains and the lifecycle listeners.
/// Feed it with [`begin_dispatch`](Self::begin_dispatch) and
/// [`submit_full_leaf_set`](Self::submit_full_leaf_set); results arrive at
/// the render listener. To let pluggables trigger rebuilds on their own,
/// wrap the builder in a [`ListBuilderHandle`](crate::ListBuilderHandle).
pub struct ListBuilder {
    config: ListBuilderConfig,
    clock: Arc<dyn Clock>,
    arena: EntryArena,
    registry: PluggableRegistry,
    listeners: LifecycleListeners,
    render_listener: Option<Box<dyn RenderListListener>>,
    observer: Box<dyn PipelineObserver + Send>,
    inbox: Arc<InvalidationInbox>,
    iteration: u64,
    has_leaf_set: bool,
    /// Whether the latest pass ran to completion. Parents left by an aborted
    /// pass are not committed as previous parents.
    last_pass_completed: bool,
}

impl fmt::Debug for ListBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListBuilder")
            .field("config", &self.config)
            .field("state", &self.inbox.state())
            .field("iteration", &self.iteration)
            .field("leaves", &self.arena.len())
            .field("registry", &self.registry)
            .field("listeners", &self.listeners)
            .field("has_render_listener", &self.render_listener.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ListBuilder {
    fn default() -> Self {
        let inbox = Arc::new(InvalidationInbox::new());
        Self {
            config: ListBuilderConfig::default(),
            clock: Arc::new(SystemClock::new()),
            arena: EntryArena::new(),
            registry: PluggableRegistry::new(inbox.clone()),
            listeners: LifecycleListeners::default(),
            render_listener: None,
            observer: Box::new(NoopObserver),
            inbox,
            iteration: 0,
            has_leaf_set: false,
            last_pass_completed: true,
        }
    }
}

impl ListBuilder {
    /// Create a builder reading time from the system clock.
    pub fn new(config: ListBuilderConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a builder with an explicit time source for filters.
    pub fn with_clock(config: ListBuilderConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            ..Self::default()
        })
    }

    // ─── Registration ───────────────────────────────────────────────────

    pub fn add_pre_group_filter(&mut self, filter: Arc<dyn NotifFilter>) {
        self.registry.add_pre_group_filter(filter);
    }

    pub fn add_promoter(&mut self, promoter: Arc<dyn NotifPromoter>) {
        self.registry.add_promoter(promoter);
    }

    pub fn set_sectioner(&mut self, sectioner: Arc<dyn NotifSectioner>) {
        self.registry.set_sectioner(sectioner);
    }

    pub fn set_comparators(&mut self, comparators: Vec<Arc<dyn NotifComparator>>) {
        self.registry.set_comparators(comparators);
    }

    pub fn add_pre_render_filter(&mut self, filter: Arc<dyn NotifFilter>) {
        self.registry.add_pre_render_filter(filter);
    }

    /// Called with the top-level list once groups are formed and pruned.
    pub fn add_on_before_transform_groups_listener(
        &mut self,
        listener: impl FnMut(&[EntryView<'_>]) + Send + 'static,
    ) {
        self.listeners
            .before_transform_groups
            .push(Box::new(listener));
    }

    /// Called with the top-level list after promotion, before sorting.
    pub fn add_on_before_sort_listener(
        &mut self,
        listener: impl FnMut(&[EntryView<'_>]) + Send + 'static,
    ) {
        self.listeners.before_sort.push(Box::new(listener));
    }

    /// Called with the final top-level list, before it is delivered.
    pub fn add_on_before_render_list_listener(
        &mut self,
        listener: impl FnMut(&[EntryView<'_>]) + Send + 'static,
    ) {
        self.listeners.before_render.push(Box::new(listener));
    }

    /// Set the consumer of finished lists, replacing any previous one.
    pub fn set_on_render_list_listener(&mut self, listener: impl RenderListListener + 'static) {
        self.render_listener = Some(Box::new(listener));
    }

    pub fn set_observer(&mut self, observer: impl PipelineObserver + Send + 'static) {
        self.observer = Box::new(observer);
    }

    // ─── Inspection ─────────────────────────────────────────────────────

    pub fn config(&self) -> &ListBuilderConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.inbox.state()
    }

    /// Number of passes started so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn arena(&self) -> &EntryArena {
        &self.arena
    }

    pub fn leaf(&self, key: &EntryKey) -> Option<&Leaf> {
        self.arena.leaf(key)
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupEntry> {
        self.arena.group(key)
    }

    pub fn registry(&self) -> &PluggableRegistry {
        &self.registry
    }

    /// Whether an invalidation is waiting for the next pass.
    pub fn has_pending_rebuild(&self) -> bool {
        self.inbox.rebuild_requested()
    }

    pub(crate) fn inbox(&self) -> &Arc<InvalidationInbox> {
        &self.inbox
    }

    // ─── Dispatch boundary ──────────────────────────────────────────────

    /// The entry source is about to deliver a new leaf set.
    ///
    /// Invalidations received from now until the build are absorbed by it.
    pub fn begin_dispatch(&mut self) -> Result<()> {
        let state = self.inbox.state();
        if state.is_in_flight() {
            return Err(ListBuilderError::overlapping_build(state));
        }
        self.inbox.set_state(PipelineState::BuildPending);
        Ok(())
    }

    /// Replace the leaf set and build the list.
    ///
    /// Leaves whose key was already known keep their persistent annotations.
    pub fn submit_full_leaf_set(
        &mut self,
        records: impl IntoIterator<Item = Notification>,
    ) -> Result<()> {
        let state = self.inbox.state();
        if state.is_in_flight() {
            return Err(ListBuilderError::overlapping_build(state));
        }
        let stats = self.arena.replace_leaf_set(records);
        log_debug!(
            added = stats.added,
            retained = stats.retained,
            removed = stats.removed,
            "leaf set replaced"
        );
        if stats.duplicates > 0 {
            log_warn!(
                duplicates = stats.duplicates,
                "duplicate keys in leaf set; first occurrence kept"
            );
        }
        self.has_leaf_set = true;
        self.build_list()
    }

    /// Run a pass if an invalidation is pending and the builder is idle.
    ///
    /// Returns whether a pass ran. Before the first leaf set arrives there is
    /// nothing to rebuild and the request is dropped.
    pub fn rebuild_if_invalidated(&mut self) -> Result<bool> {
        if self.inbox.state() != PipelineState::Idle || !self.inbox.rebuild_requested() {
            return Ok(false);
        }
        if !self.has_leaf_set {
            self.inbox.take_rebuild_request();
            log_debug!("invalidated before the first leaf set; nothing to rebuild");
            return Ok(false);
        }
        self.build_list()?;
        Ok(true)
    }

    // ─── Passes ─────────────────────────────────────────────────────────

    fn build_list(&mut self) -> Result<()> {
        let limit = self.config.max_consecutive_rebuilds;
        let mut rebuilds = 0;
        loop {
            self.run_pass()?;
            if !self.inbox.take_rebuild_request() {
                return Ok(());
            }
            rebuilds += 1;
            if rebuilds > limit {
                log_error!(limit, "invalidations kept scheduling rebuilds");
                return Err(ListBuilderError::rebuild_limit_exceeded(limit));
            }
            log_debug!(rebuilds, "rebuilding after invalidation");
        }
    }

    /// Run one stage: check for violations, time the body, report.
    fn stage<T>(
        &mut self,
        stage: PipelineState,
        body: impl FnOnce(&mut Self, &StageClock) -> (T, StageReport),
    ) -> Result<T> {
        trace_stage!(stage.as_str());
        self.inbox.check()?;
        self.inbox.set_state(stage);
        self.observer.on_stage_start(stage);
        let timer = StageClock::start();
        let (out, report) = body(self, &timer);
        self.observer.on_stage_end(stage, &report);
        self.inbox.check()?;
        Ok(out)
    }

    fn run_pass(&mut self) -> Result<()> {
        let guard = PassGuard::new(&self.inbox);
        self.iteration += 1;
        let iteration = self.iteration;
        let keep_childless = self.config.keep_childless_summaries;
        let after_completed_pass = std::mem::replace(&mut self.last_pass_completed, false);
        log_debug!(iteration, leaves = self.arena.len(), "starting pass");

        self.inbox.begin_pass();
        self.registry.clear_invalidations();

        self.stage(PipelineState::BuildStarted, |b, timer| {
            if after_completed_pass {
                b.arena.begin_pass(iteration);
            } else {
                b.arena.reset_pass(iteration);
            }
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(b.arena.len())
                .build();
            ((), report)
        })?;

        let included = self.stage(PipelineState::PreGroupFilter, |b, timer| {
            let now = b.clock.uptime_millis();
            let (included, excluded) = filtering::filter_pre_group(
                &mut b.arena,
                b.registry.pre_group_filters(),
                now,
                iteration,
            );
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(included.len())
                .excluded(excluded)
                .build();
            (included, report)
        })?;

        let mut top_level = self.stage(PipelineState::GroupTransform, |b, timer| {
            let (mut top_level, stats) = grouping::group_leaves(&mut b.arena, &included, iteration);
            let dissolved = grouping::prune_incomplete_groups(
                &mut b.arena,
                &mut top_level,
                iteration,
                keep_childless,
            );
            fire(
                &mut b.listeners.before_transform_groups,
                &b.arena.views(&top_level),
            );
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(top_level.len())
                .groups(count_groups(&top_level))
                .excluded(stats.discarded_summaries)
                .dissolved(dissolved)
                .build();
            (top_level, report)
        })?;

        self.stage(PipelineState::Promote, |b, timer| {
            let promoted =
                promotion::promote_children(&mut b.arena, &mut top_level, b.registry.promoters());
            let dissolved = grouping::prune_incomplete_groups(
                &mut b.arena,
                &mut top_level,
                iteration,
                keep_childless,
            );
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(top_level.len())
                .groups(count_groups(&top_level))
                .promoted(promoted)
                .dissolved(dissolved)
                .build();
            ((), report)
        })?;

        self.stage(PipelineState::BeforeSort, |b, timer| {
            fire(&mut b.listeners.before_sort, &b.arena.views(&top_level));
            ((), StageReport::new(timer.elapsed()))
        })?;

        self.stage(PipelineState::SectionSort, |b, timer| {
            sorting::sort_group_children(&mut b.arena, &top_level);
            sorting::section_and_sort(
                &mut b.arena,
                &mut top_level,
                b.registry.sectioner(),
                b.registry.comparators(),
            );
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(top_level.len())
                .build();
            ((), report)
        })?;

        self.stage(PipelineState::PreRenderFilter, |b, timer| {
            let now = b.clock.uptime_millis();
            let excluded = filtering::filter_pre_render(
                &mut b.arena,
                &mut top_level,
                b.registry.pre_render_filters(),
                now,
                iteration,
            );
            let dissolved = grouping::prune_incomplete_groups(
                &mut b.arena,
                &mut top_level,
                iteration,
                keep_childless,
            );
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(top_level.len())
                .excluded(excluded)
                .dissolved(dissolved)
                .build();
            ((), report)
        })?;

        self.stage(PipelineState::BeforeRender, |b, timer| {
            fire(&mut b.listeners.before_render, &b.arena.views(&top_level));
            ((), StageReport::new(timer.elapsed()))
        })?;

        let list = self.stage(PipelineState::Render, |b, timer| {
            if b.config.log_parenting_changes {
                log_parenting_changes(&b.arena);
            }
            let list = RenderList::capture(&b.arena, &top_level);
            let report = StageReportBuilder::new(timer.elapsed())
                .entries(list.len())
                .groups(count_groups(&top_level))
                .build();
            (list, report)
        })?;

        self.last_pass_completed = true;

        if let Some(listener) = self.render_listener.as_mut() {
            listener.on_render_list(&list);
        }
        self.observer.on_pass_complete(iteration, &list);
        // A render listener cannot invalidate anything in time for this pass.
        self.inbox.check()?;

        self.inbox.set_state(PipelineState::Idle);
        guard.disarm();
        log_debug!(iteration, entries = list.len(), "pass complete");
        Ok(())
    }
}
