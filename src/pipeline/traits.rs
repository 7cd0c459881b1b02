//! Pluggable trait definitions for the pipeline.
//!
//! Each trait represents one chain the builder consults at exactly one stage.
//! Pluggables are shared as `Arc<dyn ...>` so that the code which registered
//! one can keep a handle and call [`Pluggable::invalidate_list`] on it later.
//!
//! Every pluggable embeds a [`PluggableCore`] carrying its identity and its
//! link back to the builder. The builder sets that link on registration; the
//! pluggable never sees the builder itself.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::invalidation::{Invalidation, InvalidationInbox};
use super::state::PluggableChain;
use crate::entry::{EntryView, Leaf};
use crate::errors::Result;

static NEXT_PLUGGABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique pluggable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PluggableId(u64);

impl PluggableId {
    fn next() -> Self {
        Self(NEXT_PLUGGABLE_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Identity of a pluggable as recorded on the entries it acted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PluggableTag {
    id: PluggableId,
    name: Arc<str>,
}

impl PluggableTag {
    pub fn id(&self) -> PluggableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this tag identifies `pluggable`.
    pub fn is<P: Pluggable + ?Sized>(&self, pluggable: &P) -> bool {
        self.id == pluggable.core().id()
    }
}

impl fmt::Display for PluggableTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

#[derive(Debug, Clone)]
struct InvalidationSink {
    inbox: Arc<InvalidationInbox>,
    chain: PluggableChain,
}

/// State shared by every pluggable: identity, the invalidated flag, and the
/// builder link set on registration.
pub struct PluggableCore {
    tag: PluggableTag,
    invalidated: AtomicBool,
    sink: Mutex<Option<InvalidationSink>>,
}

impl fmt::Debug for PluggableCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluggableCore")
            .field("tag", &self.tag)
            .field("invalidated", &self.is_invalidated())
            .field("chain", &self.attached_chain())
            .finish()
    }
}

impl PluggableCore {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            tag: PluggableTag {
                id: PluggableId::next(),
                name: name.into(),
            },
            invalidated: AtomicBool::new(false),
            sink: Mutex::new(None),
        }
    }

    pub fn tag(&self) -> &PluggableTag {
        &self.tag
    }

    pub fn id(&self) -> PluggableId {
        self.tag.id
    }

    pub fn name(&self) -> &str {
        self.tag.name()
    }

    /// Set by `invalidate_list()`, cleared when the next pass starts.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(AtomicOrdering::Acquire)
    }

    /// The chain this pluggable is registered in, if any.
    pub fn attached_chain(&self) -> Option<PluggableChain> {
        self.sink.lock().as_ref().map(|sink| sink.chain)
    }

    /// Tell the builder this pluggable's output has changed.
    ///
    /// A pluggable that was never registered only sets its flag.
    pub fn invalidate_list(&self) -> Result<()> {
        self.invalidated.store(true, AtomicOrdering::Release);
        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => sink.inbox.post(Invalidation {
                pluggable: self.tag.clone(),
                chain: sink.chain,
            }),
            None => {
                log_debug!(pluggable = self.name(), "invalidated while unregistered");
                Ok(())
            }
        }
    }

    /// Link to a builder. Returns the chain it was previously linked to.
    pub(crate) fn attach(
        &self,
        inbox: Arc<InvalidationInbox>,
        chain: PluggableChain,
    ) -> Option<PluggableChain> {
        self.sink
            .lock()
            .replace(InvalidationSink { inbox, chain })
            .map(|previous| previous.chain)
    }

    pub(crate) fn detach(&self) {
        self.sink.lock().take();
    }

    pub(crate) fn clear_invalidated(&self) {
        self.invalidated.store(false, AtomicOrdering::Release);
    }
}

/// Common surface of every pluggable.
pub trait Pluggable: Send + Sync {
    fn core(&self) -> &PluggableCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn tag(&self) -> &PluggableTag {
        self.core().tag()
    }

    fn is_invalidated(&self) -> bool {
        self.core().is_invalidated()
    }

    /// Request a rebuild because this pluggable's answers have changed.
    ///
    /// Fails with an out-of-order error when called after this pluggable's
    /// stage already ran in the in-flight pass.
    fn invalidate_list(&self) -> Result<()> {
        self.core().invalidate_list()
    }
}

// ============================================================================
// NotifFilter: leaf exclusion (pre-group and pre-render)
// ============================================================================

/// Decides whether a leaf is excluded from the list.
///
/// Used by both filter chains. The first filter in a chain that returns
/// `true` is recorded on the leaf; later filters are not consulted for it.
/// `now` is uptime milliseconds, identical for every call in one phase.
pub trait NotifFilter: Pluggable {
    fn should_filter_out(&self, leaf: &Leaf, now: u64) -> bool;
}

// ============================================================================
// NotifPromoter: lift a group child to the top level
// ============================================================================

/// Decides whether a grouped child is shown at the top level instead.
///
/// Only children are offered; summaries and ungrouped leaves never are.
pub trait NotifPromoter: Pluggable {
    fn should_promote_to_top_level(&self, child: &Leaf) -> bool;
}

// ============================================================================
// NotifSectioner: coarse ordering bucket
// ============================================================================

/// Assigns each top-level entry a section; lower sections sort first.
pub trait NotifSectioner: Pluggable {
    fn section(&self, entry: &EntryView<'_>) -> i32;
}

// ============================================================================
// NotifComparator: fine ordering within a section
// ============================================================================

/// Orders two top-level entries of the same section.
///
/// Comparators are consulted in registration order; the first non-equal
/// answer decides.
pub trait NotifComparator: Pluggable {
    fn compare(&self, a: &EntryView<'_>, b: &EntryView<'_>) -> Ordering;
}

// ============================================================================
// Defaults and closure adapters
// ============================================================================

/// Puts everything in section 0.
#[derive(Debug)]
pub struct DefaultSectioner {
    core: PluggableCore,
}

impl DefaultSectioner {
    pub fn new() -> Self {
        Self {
            core: PluggableCore::new("DefaultSectioner"),
        }
    }
}

impl Default for DefaultSectioner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pluggable for DefaultSectioner {
    fn core(&self) -> &PluggableCore {
        &self.core
    }
}

impl NotifSectioner for DefaultSectioner {
    fn section(&self, _entry: &EntryView<'_>) -> i32 {
        0
    }
}

macro_rules! closure_pluggable {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<F> {
            core: PluggableCore,
            f: F,
        }

        impl<F> fmt::Debug for $name<F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("core", &self.core)
                    .finish_non_exhaustive()
            }
        }

        impl<F> Pluggable for $name<F>
        where
            F: Send + Sync,
        {
            fn core(&self) -> &PluggableCore {
                &self.core
            }
        }
    };
}

closure_pluggable!(
    /// A [`NotifFilter`] backed by a closure.
    FilterFn
);

closure_pluggable!(
    /// A [`NotifPromoter`] backed by a closure.
    PromoterFn
);

closure_pluggable!(
    /// A [`NotifSectioner`] backed by a closure.
    SectionerFn
);

closure_pluggable!(
    /// A [`NotifComparator`] backed by a closure.
    ComparatorFn
);

impl<F> FilterFn<F>
where
    F: Fn(&Leaf, u64) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            core: PluggableCore::new(name),
            f,
        }
    }
}

impl<F> PromoterFn<F>
where
    F: Fn(&Leaf) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            core: PluggableCore::new(name),
            f,
        }
    }
}

impl<F> SectionerFn<F>
where
    F: Fn(&EntryView<'_>) -> i32 + Send + Sync,
{
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            core: PluggableCore::new(name),
            f,
        }
    }
}

impl<F> ComparatorFn<F>
where
    F: Fn(&EntryView<'_>, &EntryView<'_>) -> Ordering + Send + Sync,
{
    pub fn new(name: impl Into<Arc<str>>, f: F) -> Self {
        Self {
            core: PluggableCore::new(name),
            f,
        }
    }
}

impl<F> NotifFilter for FilterFn<F>
where
    F: Fn(&Leaf, u64) -> bool + Send + Sync,
{
    fn should_filter_out(&self, leaf: &Leaf, now: u64) -> bool {
        (self.f)(leaf, now)
    }
}

impl<F> NotifPromoter for PromoterFn<F>
where
    F: Fn(&Leaf) -> bool + Send + Sync,
{
    fn should_promote_to_top_level(&self, child: &Leaf) -> bool {
        (self.f)(child)
    }
}

impl<F> NotifSectioner for SectionerFn<F>
where
    F: Fn(&EntryView<'_>) -> i32 + Send + Sync,
{
    fn section(&self, entry: &EntryView<'_>) -> i32 {
        (self.f)(entry)
    }
}

impl<F> NotifComparator for ComparatorFn<F>
where
    F: Fn(&EntryView<'_>, &EntryView<'_>) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &EntryView<'_>, b: &EntryView<'_>) -> Ordering {
        (self.f)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::PipelineState;
    use crate::types::Notification;

    #[test]
    fn test_ids_are_unique() {
        let a = PluggableCore::new("A");
        let b = PluggableCore::new("A");
        assert_ne!(a.id(), b.id());
        assert_ne!(a.tag(), b.tag());
    }

    #[test]
    fn test_unregistered_invalidation_only_sets_flag() {
        let filter = FilterFn::new("Never", |_: &Leaf, _| false);
        assert!(!filter.is_invalidated());
        filter.invalidate_list().unwrap();
        assert!(filter.is_invalidated());
        assert_eq!(filter.core().attached_chain(), None);
    }

    #[test]
    fn test_attach_routes_to_inbox() {
        let inbox = Arc::new(InvalidationInbox::new());
        let promoter = PromoterFn::new("Promote", |_: &Leaf| true);
        assert_eq!(promoter.core().attach(inbox.clone(), PluggableChain::Promoter), None);

        promoter.invalidate_list().unwrap();
        assert!(inbox.rebuild_requested());

        inbox.begin_pass();
        inbox.set_state(PipelineState::SectionSort);
        assert!(promoter.invalidate_list().is_err());

        promoter.core().detach();
        assert!(promoter.invalidate_list().is_ok());
    }

    #[test]
    fn test_reattach_reports_previous_chain() {
        let inbox = Arc::new(InvalidationInbox::new());
        let filter = FilterFn::new("F", |_: &Leaf, _| false);
        filter.core().attach(inbox.clone(), PluggableChain::PreGroupFilter);
        assert_eq!(
            filter.core().attach(inbox, PluggableChain::PreRenderFilter),
            Some(PluggableChain::PreGroupFilter)
        );
    }

    #[test]
    fn test_closure_adapters_delegate() {
        let leaf = Leaf::new(Notification::new("pkg", 3).with_rank(2));
        let filter = FilterFn::new("Odd", |leaf: &Leaf, now| leaf.id() % 2 == 1 && now > 10);
        assert!(filter.should_filter_out(&leaf, 11));
        assert!(!filter.should_filter_out(&leaf, 5));

        let sectioner = SectionerFn::new("ByRank", |e: &EntryView<'_>| e.representative().rank());
        assert_eq!(sectioner.section(&EntryView::Leaf(&leaf)), 2);
        assert_eq!(DefaultSectioner::new().section(&EntryView::Leaf(&leaf)), 0);

        let tag = filter.tag().clone();
        assert!(tag.is(&filter));
        assert_eq!(tag.name(), "Odd");
    }
}
