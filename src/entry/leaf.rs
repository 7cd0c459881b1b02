//! Leaf entries: one per source notification, persisting across passes.

use std::sync::Arc;

use crate::pipeline::traits::PluggableTag;
use crate::types::{EntryKey, GroupKey, Notification, ParentRef};

/// A single notification in the list, plus its pass-scoped annotations.
///
/// The payload is immutable and shared; everything else is written only by
/// the builder at stage boundaries. Pluggables see `&Leaf` and cannot mutate
/// it.
#[derive(Debug, Clone)]
pub struct Leaf {
    key: EntryKey,
    group_key: Option<GroupKey>,
    notification: Arc<Notification>,
    pub(crate) parent: Option<ParentRef>,
    pub(crate) previous_parent: Option<ParentRef>,
    pub(crate) excluding_filter: Option<PluggableTag>,
    pub(crate) notif_promoter: Option<PluggableTag>,
    pub(crate) first_added_iteration: Option<u64>,
    pub(crate) section: Option<i32>,
}

impl Leaf {
    pub fn new(notification: Notification) -> Self {
        Self {
            key: notification.key(),
            group_key: notification.group_key(),
            notification: Arc::new(notification),
            parent: None,
            previous_parent: None,
            excluding_filter: None,
            notif_promoter: None,
            first_added_iteration: None,
            section: None,
        }
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Shared handle to the payload, used by render snapshots.
    pub fn notification_arc(&self) -> &Arc<Notification> {
        &self.notification
    }

    pub fn package(&self) -> &str {
        &self.notification.package
    }

    pub fn id(&self) -> i32 {
        self.notification.id
    }

    pub fn rank(&self) -> i32 {
        self.notification.rank
    }

    pub fn when(&self) -> i64 {
        self.notification.when
    }

    pub fn post_time(&self) -> i64 {
        self.notification.post_time
    }

    pub fn group_key(&self) -> Option<&GroupKey> {
        self.group_key.as_ref()
    }

    pub fn is_group_summary(&self) -> bool {
        self.notification.is_group_summary
    }

    /// Current position in the list; `None` when not part of it.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    /// Parent as of the last pass in which this leaf was part of the list.
    pub fn previous_parent(&self) -> Option<&ParentRef> {
        self.previous_parent.as_ref()
    }

    /// Filter that excluded this leaf in the current pass.
    pub fn excluding_filter(&self) -> Option<&PluggableTag> {
        self.excluding_filter.as_ref()
    }

    /// Promoter that lifted this leaf out of its group in the current pass.
    pub fn notif_promoter(&self) -> Option<&PluggableTag> {
        self.notif_promoter.as_ref()
    }

    /// Pass in which this leaf was first included; `None` until then.
    pub fn first_added_iteration(&self) -> Option<u64> {
        self.first_added_iteration
    }

    /// Section assigned in the current pass, if this leaf is top level.
    pub fn section(&self) -> Option<i32> {
        self.section
    }

    /// Swap in a newer payload for the same key, keeping annotations.
    pub(crate) fn replace_notification(&mut self, notification: Notification) {
        self.group_key = notification.group_key();
        self.notification = Arc::new(notification);
    }

    /// Remember the parent from the pass that just completed.
    pub(crate) fn commit_parent(&mut self) {
        self.previous_parent = self.parent.clone();
    }

    pub(crate) fn reset_for_pass(&mut self, iteration: u64) {
        self.parent = None;
        self.excluding_filter = None;
        self.notif_promoter = None;
        self.section = None;
        if self.first_added_iteration.is_none() {
            self.first_added_iteration = Some(iteration);
        }
    }

    /// Detach from the list; forget the addition if it happened this pass.
    pub(crate) fn annul_addition(&mut self, iteration: u64) {
        self.parent = None;
        self.section = None;
        if self.first_added_iteration == Some(iteration) {
            self.first_added_iteration = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_sets_first_added_once() {
        let mut leaf = Leaf::new(Notification::new("com.a", 0));
        leaf.reset_for_pass(3);
        assert_eq!(leaf.first_added_iteration(), Some(3));
        leaf.reset_for_pass(4);
        assert_eq!(leaf.first_added_iteration(), Some(3));
    }

    #[test]
    fn test_annul_only_rolls_back_same_pass() {
        let mut leaf = Leaf::new(Notification::new("com.a", 0));
        leaf.reset_for_pass(1);
        leaf.parent = Some(ParentRef::Root);
        leaf.annul_addition(1);
        assert!(leaf.parent().is_none());
        assert_eq!(leaf.first_added_iteration(), None);

        leaf.reset_for_pass(2);
        leaf.reset_for_pass(3);
        leaf.annul_addition(3);
        assert_eq!(leaf.first_added_iteration(), Some(2));
    }

    #[test]
    fn test_replace_notification_keeps_annotations() {
        let mut leaf = Leaf::new(Notification::new("com.a", 0));
        leaf.reset_for_pass(1);
        leaf.previous_parent = Some(ParentRef::Root);
        leaf.replace_notification(Notification::new("com.a", 0).with_rank(9).with_group("g"));
        assert_eq!(leaf.rank(), 9);
        assert!(leaf.group_key().is_some());
        assert_eq!(leaf.previous_parent(), Some(&ParentRef::Root));
        assert_eq!(leaf.first_added_iteration(), Some(1));
    }
}
