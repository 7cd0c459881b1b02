//! The invalidation inbox.
//!
//! Pluggables never call into the builder. `invalidate_list()` posts a
//! message here instead, and the inbox decides on the spot, under one lock,
//! whether the message is a protocol violation (the pluggable's stage already
//! ran in the in-flight pass) or a rebuild request. The builder reads the
//! outcome at its next stage boundary.
//!
//! When the builder is idle, the inbox wakes it through an optional
//! [`Waker`] installed by the dispatch boundary, so a rebuild happens
//! synchronously inside the `invalidate_list()` call.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::state::{PipelineState, PluggableChain};
use super::traits::PluggableTag;
use crate::errors::{ListBuilderError, Result};

/// Callback that drives a rebuild while the builder is idle.
pub type Waker = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// One `invalidate_list()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub pluggable: PluggableTag,
    pub chain: PluggableChain,
}

#[derive(Debug)]
struct InboxState {
    state: PipelineState,
    rebuild_requested: bool,
    violation: Option<ListBuilderError>,
    received: u64,
}

/// Shared mailbox between pluggables and the builder.
pub struct InvalidationInbox {
    inner: Mutex<InboxState>,
    waker: Mutex<Option<Waker>>,
}

impl fmt::Debug for InvalidationInbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InvalidationInbox")
            .field("state", &inner.state)
            .field("rebuild_requested", &inner.rebuild_requested)
            .field("violation", &inner.violation)
            .field("received", &inner.received)
            .field("has_waker", &self.waker.lock().is_some())
            .finish()
    }
}

impl Default for InvalidationInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationInbox {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(InboxState {
                state: PipelineState::Idle,
                rebuild_requested: false,
                violation: None,
                received: 0,
            }),
            waker: Mutex::new(None),
        }
    }

    /// Deliver an invalidation.
    ///
    /// Returns an error when the invalidated chain's stage has already run
    /// in the in-flight pass; the same error is recorded for the builder,
    /// which fails the pass at its next boundary.
    pub fn post(&self, invalidation: Invalidation) -> Result<()> {
        let wake = {
            let mut inner = self.inner.lock();
            inner.received += 1;
            let current = inner.state;
            if invalidation.chain.is_stale_in(current) {
                let err = ListBuilderError::out_of_order_invalidation(
                    invalidation.pluggable.name(),
                    invalidation.chain,
                    current,
                );
                log_error!(
                    pluggable = invalidation.pluggable.name(),
                    chain = %invalidation.chain,
                    state = %current,
                    "out-of-order invalidation"
                );
                if inner.violation.is_none() {
                    inner.violation = Some(err.clone());
                }
                return Err(err);
            }
            log_debug!(
                pluggable = invalidation.pluggable.name(),
                chain = %invalidation.chain,
                state = %current,
                "list invalidated"
            );
            inner.rebuild_requested = true;
            current == PipelineState::Idle
        };

        if wake {
            let waker = self.waker.lock().clone();
            if let Some(waker) = waker {
                return waker();
            }
        }
        Ok(())
    }

    pub fn state(&self) -> PipelineState {
        self.inner.lock().state
    }

    pub fn rebuild_requested(&self) -> bool {
        self.inner.lock().rebuild_requested
    }

    /// Number of invalidations posted so far.
    pub fn received(&self) -> u64 {
        self.inner.lock().received
    }

    pub fn set_waker(&self, waker: Waker) {
        *self.waker.lock() = Some(waker);
    }

    pub fn clear_waker(&self) {
        *self.waker.lock() = None;
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.inner.lock().state = state;
    }

    /// Start a pass: anything requested so far is satisfied by it.
    pub(crate) fn begin_pass(&self) {
        let mut inner = self.inner.lock();
        inner.state = PipelineState::BuildStarted;
        inner.rebuild_requested = false;
        inner.violation = None;
    }

    /// Surface a violation recorded since the last check.
    pub(crate) fn check(&self) -> Result<()> {
        match self.inner.lock().violation.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) fn take_rebuild_request(&self) -> bool {
        std::mem::take(&mut self.inner.lock().rebuild_requested)
    }

    /// Return to idle after a failed pass, dropping pending work.
    pub(crate) fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.state = PipelineState::Idle;
        inner.rebuild_requested = false;
        inner.violation = None;
    }
}
