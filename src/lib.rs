//! # notif_list_builder
//!
//! A staged, pluggable pipeline that turns a flat set of notification
//! records into the sorted, grouped list a shade renders.
//!
//! Each pass runs a fixed sequence of stages: pre-group filtering, grouping,
//! promotion, sectioning and sorting, pre-render filtering, and render.
//! Policy lives in pluggables registered per stage; the builder owns the
//! entries and the stage order.
//!
//! ## Features
//!
//! - **Pluggable**: filters, promoters, a sectioner and comparators, each
//!   able to invalidate the list when its answers change
//! - **Ordered**: out-of-order invalidations fail the pass instead of
//!   producing an inconsistent list
//! - **Persistent**: leaves and groups keep their identity across passes
//! - **Observable**: stage hooks, timing reports and `tracing` spans
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use notif_list_builder::{FilterFn, Leaf, ListBuilder, ListBuilderConfig, Notification, RenderList};
//!
//! let mut builder = ListBuilder::new(ListBuilderConfig::default()).unwrap();
//! builder.add_pre_group_filter(Arc::new(FilterFn::new("HideZero", |leaf: &Leaf, _now| {
//!     leaf.id() == 0
//! })));
//! builder.set_on_render_list_listener(|list: &RenderList| {
//!     assert_eq!(list.len(), 1);
//! });
//! builder.begin_dispatch().unwrap();
//! builder
//!     .submit_full_leaf_set(vec![Notification::new("pkg", 0), Notification::new("pkg", 1)])
//!     .unwrap();
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod dispatch;
pub mod entry;
pub mod errors;
pub mod pipeline;
pub mod render;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, FakeClock, SystemClock};
pub use dispatch::{
    CollectionReadyForBuildListener, EntrySource, ListBuilderHandle, RenderListListener,
};
pub use entry::{EntryArena, EntryView, GroupEntry, Leaf, ListEntry};
pub use errors::{ListBuilderError, Result};
pub use pipeline::error_code::ErrorCode;
pub use pipeline::observer::{
    NoopObserver, PipelineObserver, StageClock, StageReport, StageReportBuilder,
    StageTimingObserver,
};
pub use pipeline::runner::ListBuilder;
pub use pipeline::state::{PipelineState, PluggableChain};
pub use pipeline::traits::{
    ComparatorFn, DefaultSectioner, FilterFn, NotifComparator, NotifFilter, NotifPromoter,
    NotifSectioner, Pluggable, PluggableCore, PluggableId, PluggableTag, PromoterFn, SectionerFn,
};
pub use render::{dump_list, GroupSnapshot, LeafSnapshot, RenderEntry, RenderList};
pub use types::{
    EntryKey, GroupKey, ListBuilderConfig, Notification, ParentRef, MIN_CHILDREN_FOR_GROUP,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
