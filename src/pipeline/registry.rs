//! Registration of pluggables and lifecycle listeners.
//!
//! The registry owns the five pluggable chains and links every pluggable it
//! accepts to the builder's [`InvalidationInbox`]. Chains keep registration
//! order, which is also their evaluation order.

use std::fmt;
use std::sync::Arc;

use super::invalidation::InvalidationInbox;
use super::state::PluggableChain;
use super::traits::{
    DefaultSectioner, NotifComparator, NotifFilter, NotifPromoter, NotifSectioner, Pluggable,
    PluggableCore,
};
use crate::entry::EntryView;

/// Callback fired with the top-level list at a lifecycle point.
pub type LifecycleListener = Box<dyn FnMut(&[EntryView<'_>]) + Send>;

/// Pluggable chains, in evaluation order.
pub struct PluggableRegistry {
    inbox: Arc<InvalidationInbox>,
    pre_group_filters: Vec<Arc<dyn NotifFilter>>,
    promoters: Vec<Arc<dyn NotifPromoter>>,
    sectioner: Arc<dyn NotifSectioner>,
    comparators: Vec<Arc<dyn NotifComparator>>,
    pre_render_filters: Vec<Arc<dyn NotifFilter>>,
}

impl fmt::Debug for PluggableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<T: Pluggable + ?Sized>(chain: &[Arc<T>]) -> Vec<&str> {
            chain.iter().map(|p| p.name()).collect()
        }
        f.debug_struct("PluggableRegistry")
            .field("pre_group_filters", &names(&self.pre_group_filters))
            .field("promoters", &names(&self.promoters))
            .field("sectioner", &self.sectioner.name())
            .field("comparators", &names(&self.comparators))
            .field("pre_render_filters", &names(&self.pre_render_filters))
            .finish()
    }
}

fn attach<P: Pluggable + ?Sized>(pluggable: &P, inbox: &Arc<InvalidationInbox>, chain: PluggableChain) {
    if let Some(previous) = pluggable.core().attach(inbox.clone(), chain) {
        log_warn!(
            pluggable = pluggable.name(),
            previous = %previous,
            chain = %chain,
            "pluggable registered again; invalidations now route to the latest chain"
        );
    }
}

impl PluggableRegistry {
    pub(crate) fn new(inbox: Arc<InvalidationInbox>) -> Self {
        let sectioner: Arc<dyn NotifSectioner> = Arc::new(DefaultSectioner::new());
        attach(sectioner.as_ref(), &inbox, PluggableChain::Sectioner);
        Self {
            inbox,
            pre_group_filters: Vec::new(),
            promoters: Vec::new(),
            sectioner,
            comparators: Vec::new(),
            pre_render_filters: Vec::new(),
        }
    }

    pub fn add_pre_group_filter(&mut self, filter: Arc<dyn NotifFilter>) {
        attach(filter.as_ref(), &self.inbox, PluggableChain::PreGroupFilter);
        self.pre_group_filters.push(filter);
    }

    pub fn add_promoter(&mut self, promoter: Arc<dyn NotifPromoter>) {
        attach(promoter.as_ref(), &self.inbox, PluggableChain::Promoter);
        self.promoters.push(promoter);
    }

    /// Replace the sectioner; the previous one is unlinked.
    pub fn set_sectioner(&mut self, sectioner: Arc<dyn NotifSectioner>) {
        let previous = std::mem::replace(&mut self.sectioner, sectioner);
        previous.core().detach();
        attach(self.sectioner.as_ref(), &self.inbox, PluggableChain::Sectioner);
    }

    /// Replace the comparator chain; the previous comparators are unlinked.
    pub fn set_comparators(&mut self, comparators: Vec<Arc<dyn NotifComparator>>) {
        for previous in self.comparators.drain(..) {
            previous.core().detach();
        }
        for comparator in &comparators {
            attach(comparator.as_ref(), &self.inbox, PluggableChain::Comparator);
        }
        self.comparators = comparators;
    }

    pub fn add_pre_render_filter(&mut self, filter: Arc<dyn NotifFilter>) {
        attach(filter.as_ref(), &self.inbox, PluggableChain::PreRenderFilter);
        self.pre_render_filters.push(filter);
    }

    pub fn pre_group_filters(&self) -> &[Arc<dyn NotifFilter>] {
        &self.pre_group_filters
    }

    pub fn promoters(&self) -> &[Arc<dyn NotifPromoter>] {
        &self.promoters
    }

    pub fn sectioner(&self) -> &dyn NotifSectioner {
        self.sectioner.as_ref()
    }

    pub fn comparators(&self) -> &[Arc<dyn NotifComparator>] {
        &self.comparators
    }

    pub fn pre_render_filters(&self) -> &[Arc<dyn NotifFilter>] {
        &self.pre_render_filters
    }

    fn for_each_pluggable(&self, mut f: impl FnMut(&PluggableCore)) {
        self.pre_group_filters.iter().for_each(|p| f(p.core()));
        self.promoters.iter().for_each(|p| f(p.core()));
        f(self.sectioner.core());
        self.comparators.iter().for_each(|p| f(p.core()));
        self.pre_render_filters.iter().for_each(|p| f(p.core()));
    }

    /// Number of registered pluggables, the sectioner included.
    pub fn pluggable_count(&self) -> usize {
        let mut count = 0;
        self.for_each_pluggable(|_| count += 1);
        count
    }

    /// Reset every pluggable's invalidated flag at the start of a pass.
    pub(crate) fn clear_invalidations(&self) {
        self.for_each_pluggable(PluggableCore::clear_invalidated);
    }
}

/// Listeners for the three lifecycle points, in registration order.
#[derive(Default)]
pub(crate) struct LifecycleListeners {
    pub(crate) before_transform_groups: Vec<LifecycleListener>,
    pub(crate) before_sort: Vec<LifecycleListener>,
    pub(crate) before_render: Vec<LifecycleListener>,
}

impl fmt::Debug for LifecycleListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleListeners")
            .field("before_transform_groups", &self.before_transform_groups.len())
            .field("before_sort", &self.before_sort.len())
            .field("before_render", &self.before_render.len())
            .finish()
    }
}

pub(crate) fn fire(listeners: &mut [LifecycleListener], views: &[EntryView<'_>]) {
    for listener in listeners {
        listener(views);
    }
}
