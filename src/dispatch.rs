//! The dispatch boundary between the entry source, the builder and the
//! renderer.
//!
//! The entry source talks to the builder through
//! [`CollectionReadyForBuildListener`]; finished lists leave through
//! [`RenderListListener`]. [`ListBuilderHandle`] shares one builder between
//! the entry source and any pluggable that may invalidate it, and runs the
//! rebuild an idle invalidation asks for.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::errors::{ListBuilderError, Result};
use crate::pipeline::invalidation::{InvalidationInbox, Waker};
use crate::pipeline::runner::ListBuilder;
use crate::pipeline::state::PipelineState;
use crate::render::RenderList;
use crate::types::Notification;

/// Consumer of finished lists. Called once per completed pass.
pub trait RenderListListener: Send {
    fn on_render_list(&mut self, list: &RenderList);
}

impl<F> RenderListListener for F
where
    F: FnMut(&RenderList) + Send,
{
    fn on_render_list(&mut self, list: &RenderList) {
        self(list)
    }
}

/// What the entry source calls when its collection is ready.
pub trait CollectionReadyForBuildListener: Send + Sync {
    /// A new leaf set is about to be delivered.
    fn begin_dispatch(&self) -> Result<()>;

    /// The complete current leaf set.
    fn submit_full_leaf_set(&self, records: Vec<Notification>) -> Result<()>;
}

/// An upstream collection that feeds a builder.
pub trait EntrySource {
    fn set_on_collection_ready_listener(
        &mut self,
        listener: Arc<dyn CollectionReadyForBuildListener>,
    );
}

/// Shared, lockable [`ListBuilder`].
///
/// Every entry point takes the lock without waiting: a call that finds the
/// builder busy fails with an overlapping-build error instead of blocking.
/// Pluggable invalidations never take the lock while a pass is running.
#[derive(Debug, Clone)]
pub struct ListBuilderHandle {
    builder: Arc<Mutex<ListBuilder>>,
    inbox: Arc<InvalidationInbox>,
}

fn rebuild_waker(builder: Weak<Mutex<ListBuilder>>) -> Waker {
    Arc::new(move || {
        let Some(builder) = builder.upgrade() else {
            return Ok(());
        };
        // Whoever holds the lock picks up the request when it releases it.
        let Some(mut builder) = builder.try_lock() else {
            return Ok(());
        };
        builder.rebuild_if_invalidated().map(|_| ())
    })
}

impl ListBuilderHandle {
    pub fn new(builder: ListBuilder) -> Self {
        let inbox = builder.inbox().clone();
        let builder = Arc::new(Mutex::new(builder));
        inbox.set_waker(rebuild_waker(Arc::downgrade(&builder)));
        Self { builder, inbox }
    }

    pub fn state(&self) -> PipelineState {
        self.inbox.state()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ListBuilder>> {
        self.builder
            .try_lock()
            .ok_or_else(|| ListBuilderError::overlapping_build(self.inbox.state()))
    }

    /// Run rebuilds requested while the lock was held by someone else.
    fn settle(&self) -> Result<()> {
        while self.inbox.state() == PipelineState::Idle && self.inbox.rebuild_requested() {
            let Some(mut builder) = self.builder.try_lock() else {
                return Ok(());
            };
            if !builder.rebuild_if_invalidated()? {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Configure or inspect the builder. A rebuild requested meanwhile runs
    /// before this returns.
    pub fn with_builder<R>(&self, f: impl FnOnce(&mut ListBuilder) -> R) -> Result<R> {
        let out = {
            let mut builder = self.lock()?;
            let out = f(&mut builder);
            builder.rebuild_if_invalidated()?;
            out
        };
        self.settle()?;
        Ok(out)
    }

    pub fn begin_dispatch(&self) -> Result<()> {
        self.lock()?.begin_dispatch()
    }

    pub fn submit_full_leaf_set(&self, records: Vec<Notification>) -> Result<()> {
        self.lock()?.submit_full_leaf_set(records)?;
        self.settle()
    }

    pub fn rebuild_if_invalidated(&self) -> Result<bool> {
        let rebuilt = self.lock()?.rebuild_if_invalidated()?;
        self.settle()?;
        Ok(rebuilt)
    }

    /// Register this handle as `source`'s build listener.
    pub fn attach<S: EntrySource + ?Sized>(&self, source: &mut S) {
        source.set_on_collection_ready_listener(Arc::new(self.clone()));
    }
}

impl Drop for ListBuilderHandle {
    fn drop(&mut self) {
        // The handle stored in the waker is weak; the last strong one unhooks it.
        if Arc::strong_count(&self.builder) == 1 {
            self.inbox.clear_waker();
        }
    }
}

impl CollectionReadyForBuildListener for ListBuilderHandle {
    fn begin_dispatch(&self) -> Result<()> {
        ListBuilderHandle::begin_dispatch(self)
    }

    fn submit_full_leaf_set(&self, records: Vec<Notification>) -> Result<()> {
        ListBuilderHandle::submit_full_leaf_set(self, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Leaf;
    use crate::pipeline::traits::{FilterFn, Pluggable};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn counting_handle() -> (ListBuilderHandle, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        let counter = renders.clone();
        let mut builder = ListBuilder::default();
        builder.set_on_render_list_listener(move |_: &RenderList| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (ListBuilderHandle::new(builder), renders)
    }

    #[test]
    fn test_idle_invalidation_rebuilds_synchronously() {
        let (handle, renders) = counting_handle();
        let enabled = Arc::new(AtomicBool::new(false));
        let flag = enabled.clone();
        let filter = Arc::new(FilterFn::new("Toggle", move |_: &Leaf, _| {
            flag.load(Ordering::SeqCst)
        }));
        handle
            .with_builder(|b| b.add_pre_group_filter(filter.clone()))
            .unwrap();

        handle.begin_dispatch().unwrap();
        handle
            .submit_full_leaf_set(vec![Notification::new("p", 0)])
            .unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        enabled.store(true, Ordering::SeqCst);
        filter.invalidate_list().unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 2);
        assert_eq!(handle.state(), PipelineState::Idle);
    }

    #[test]
    fn test_invalidation_inside_with_builder_runs_after() {
        let (handle, renders) = counting_handle();
        let filter = Arc::new(FilterFn::new("Never", |_: &Leaf, _| false));
        handle
            .with_builder(|b| b.add_pre_render_filter(filter.clone()))
            .unwrap();
        handle
            .submit_full_leaf_set(vec![Notification::new("p", 0)])
            .unwrap();

        handle
            .with_builder(|_| filter.invalidate_list().unwrap())
            .unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidation_while_pending_is_absorbed() {
        let (handle, renders) = counting_handle();
        let filter = Arc::new(FilterFn::new("Never", |_: &Leaf, _| false));
        handle
            .with_builder(|b| b.add_pre_group_filter(filter.clone()))
            .unwrap();

        handle.begin_dispatch().unwrap();
        filter.invalidate_list().unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 0);
        handle
            .submit_full_leaf_set(vec![Notification::new("p", 0)])
            .unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_build_is_rejected() {
        let handle = ListBuilderHandle::new(ListBuilder::default());
        let inner = handle.clone();
        let result = handle
            .with_builder(|_| inner.submit_full_leaf_set(Vec::new()))
            .unwrap();
        assert!(matches!(
            result,
            Err(ListBuilderError::OverlappingBuild { .. })
        ));
    }

    #[test]
    fn test_attach_to_entry_source() {
        #[derive(Default)]
        struct Collection {
            listener: Option<Arc<dyn CollectionReadyForBuildListener>>,
        }
        impl EntrySource for Collection {
            fn set_on_collection_ready_listener(
                &mut self,
                listener: Arc<dyn CollectionReadyForBuildListener>,
            ) {
                self.listener = Some(listener);
            }
        }

        let (handle, renders) = counting_handle();
        let mut collection = Collection::default();
        handle.attach(&mut collection);

        let listener = collection.listener.unwrap();
        listener.begin_dispatch().unwrap();
        listener
            .submit_full_leaf_set(vec![Notification::new("p", 0)])
            .unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }
}
