//! Group entries derived by the grouping stage.

use crate::types::{EntryKey, GroupKey, ParentRef, MIN_CHILDREN_FOR_GROUP};

/// A summary leaf plus its child leaves.
///
/// Membership is rebuilt every pass; the record itself is kept in the arena
/// under its key for as long as the group keeps appearing in the list.
#[derive(Debug, Clone)]
pub struct GroupEntry {
    key: GroupKey,
    pub(crate) summary: Option<EntryKey>,
    pub(crate) children: Vec<EntryKey>,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) previous_parent: Option<ParentRef>,
    pub(crate) first_added_iteration: Option<u64>,
    pub(crate) section: Option<i32>,
}

impl GroupEntry {
    pub(crate) fn new(key: GroupKey, iteration: u64) -> Self {
        Self {
            key,
            summary: None,
            children: Vec::new(),
            parent: None,
            previous_parent: None,
            first_added_iteration: Some(iteration),
            section: None,
        }
    }

    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn summary(&self) -> Option<&EntryKey> {
        self.summary.as_ref()
    }

    /// Children in their current order: grouping order until the sort
    /// stage, sorted order afterwards.
    pub fn children(&self) -> &[EntryKey] {
        &self.children
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn previous_parent(&self) -> Option<&ParentRef> {
        self.previous_parent.as_ref()
    }

    pub fn first_added_iteration(&self) -> Option<u64> {
        self.first_added_iteration
    }

    pub fn section(&self) -> Option<i32> {
        self.section
    }

    /// A group may be shown only with a summary and enough children.
    pub fn is_valid(&self) -> bool {
        self.summary.is_some() && self.children.len() >= MIN_CHILDREN_FOR_GROUP
    }

    /// Remember the parent from the pass that just completed.
    pub(crate) fn commit_parent(&mut self) {
        self.previous_parent = self.parent.clone();
    }

    pub(crate) fn reset_for_pass(&mut self, iteration: u64) {
        self.summary = None;
        self.children.clear();
        self.parent = None;
        self.section = None;
        if self.first_added_iteration.is_none() {
            self.first_added_iteration = Some(iteration);
        }
    }

    pub(crate) fn annul_addition(&mut self, iteration: u64) {
        self.parent = None;
        self.section = None;
        if self.first_added_iteration == Some(iteration) {
            self.first_added_iteration = None;
        }
    }
}
