//! The pipeline state machine.
//!
//! A pass walks the states strictly in declaration order and returns to
//! [`PipelineState::Idle`]; it never branches back. Each pluggable chain is
//! bound to one state, and the ordering of the enum is what the invalidation
//! check compares against.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the builder is in its pipeline.
///
/// Ordering follows execution order, so `a < b` means `a` runs before `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No pass in flight.
    Idle,
    /// The entry source announced a dispatch; the leaf set is on its way.
    BuildPending,
    /// Pass started: per-pass annotations are being reset.
    BuildStarted,
    PreGroupFilter,
    /// Grouping, group validation and the before-transform-groups callback.
    GroupTransform,
    Promote,
    /// The before-sort callback.
    BeforeSort,
    SectionSort,
    PreRenderFilter,
    /// The before-render callback.
    BeforeRender,
    /// Previous-parent bookkeeping and delivery to the render listener.
    Render,
}

impl PipelineState {
    /// Every stage a pass executes, in order.
    pub const PASS_STAGES: [PipelineState; 9] = [
        PipelineState::BuildStarted,
        PipelineState::PreGroupFilter,
        PipelineState::GroupTransform,
        PipelineState::Promote,
        PipelineState::BeforeSort,
        PipelineState::SectionSort,
        PipelineState::PreRenderFilter,
        PipelineState::BeforeRender,
        PipelineState::Render,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BuildPending => "build_pending",
            Self::BuildStarted => "build_started",
            Self::PreGroupFilter => "pre_group_filter",
            Self::GroupTransform => "group_transform",
            Self::Promote => "promote",
            Self::BeforeSort => "before_sort",
            Self::SectionSort => "section_sort",
            Self::PreRenderFilter => "pre_render_filter",
            Self::BeforeRender => "before_render",
            Self::Render => "render",
        }
    }

    /// Whether a pass is executing (as opposed to idle or merely pending).
    pub fn is_in_flight(&self) -> bool {
        *self >= Self::BuildStarted
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pluggable chains, each consulted at exactly one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluggableChain {
    PreGroupFilter,
    Promoter,
    Sectioner,
    Comparator,
    PreRenderFilter,
}

impl PluggableChain {
    /// The state during which this chain's output is produced.
    pub fn bound_state(&self) -> PipelineState {
        match self {
            Self::PreGroupFilter => PipelineState::PreGroupFilter,
            Self::Promoter => PipelineState::Promote,
            Self::Sectioner | Self::Comparator => PipelineState::SectionSort,
            Self::PreRenderFilter => PipelineState::PreRenderFilter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreGroupFilter => "pre_group_filter",
            Self::Promoter => "promoter",
            Self::Sectioner => "sectioner",
            Self::Comparator => "comparator",
            Self::PreRenderFilter => "pre_render_filter",
        }
    }

    /// Whether an invalidation of this chain while the pipeline is in
    /// `current` arrives too late to be honored by the in-flight pass.
    pub fn is_stale_in(&self, current: PipelineState) -> bool {
        current.is_in_flight() && self.bound_state() <= current
    }
}

impl fmt::Display for PluggableChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
