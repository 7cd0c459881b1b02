//! Pipeline stages, pluggables, and orchestration.
//!
//! ## Submodules
//!
//! - [`state`]: Pipeline states and the pluggable chains bound to them
//! - [`traits`]: Pluggable trait definitions and closure adapters
//! - [`registry`]: Pluggable chains and lifecycle listeners
//! - [`invalidation`]: Inbox deciding between rebuild and violation
//! - [`filtering`], [`grouping`], [`promotion`], [`sorting`]: Stage logic
//! - [`runner`]: The [`ListBuilder`] orchestrator
//! - [`observer`]: Stage hooks and timing reports

pub mod error_code;
pub mod filtering;
pub mod grouping;
pub mod invalidation;
pub mod observer;
pub mod promotion;
pub mod registry;
pub mod runner;
pub mod sorting;
pub mod state;
pub mod traits;

pub use invalidation::{Invalidation, InvalidationInbox, Waker};
pub use registry::{LifecycleListener, PluggableRegistry};
pub use runner::ListBuilder;
pub use state::{PipelineState, PluggableChain};
pub use traits::{
    ComparatorFn, DefaultSectioner, FilterFn, NotifComparator, NotifFilter, NotifPromoter,
    NotifSectioner, Pluggable, PluggableCore, PluggableId, PluggableTag, PromoterFn, SectionerFn,
};
