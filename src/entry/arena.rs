//! Arena owning every leaf and group the builder knows about.

use rustc_hash::FxHashMap;

use super::{EntryView, GroupEntry, Leaf, ListEntry};
use crate::types::{EntryKey, GroupKey, Notification, ParentRef};

/// Outcome of replacing the leaf set, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub retained: usize,
    pub removed: usize,
    /// Records dropped because an earlier record had the same key.
    pub duplicates: usize,
}

/// Owner of all entries, addressed by key.
///
/// Leaves are kept in submission order, which is the input order every
/// stage iterates in. Groups live in a map and are reused across passes
/// while they keep being shown.
#[derive(Debug, Default)]
pub struct EntryArena {
    leaves: Vec<Leaf>,
    index: FxHashMap<EntryKey, usize>,
    groups: FxHashMap<GroupKey, GroupEntry>,
}

impl EntryArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the leaf set with `records`.
    ///
    /// Leaves whose key survives keep their annotations and take the new
    /// payload. Within `records`, the first occurrence of a key wins.
    pub fn replace_leaf_set(
        &mut self,
        records: impl IntoIterator<Item = Notification>,
    ) -> ReconcileStats {
        let mut previous: FxHashMap<EntryKey, Leaf> = self
            .leaves
            .drain(..)
            .map(|leaf| (leaf.key().clone(), leaf))
            .collect();
        self.index.clear();

        let mut stats = ReconcileStats::default();
        for record in records {
            let key = record.key();
            if self.index.contains_key(&key) {
                stats.duplicates += 1;
                continue;
            }
            let leaf = match previous.remove(&key) {
                Some(mut leaf) => {
                    leaf.replace_notification(record);
                    stats.retained += 1;
                    leaf
                }
                None => {
                    stats.added += 1;
                    Leaf::new(record)
                }
            };
            self.index.insert(key, self.leaves.len());
            self.leaves.push(leaf);
        }
        stats.removed = previous.len();
        stats
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves in submission order.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> {
        self.leaves.iter()
    }

    pub fn leaf(&self, key: &EntryKey) -> Option<&Leaf> {
        self.index.get(key).map(|&i| &self.leaves[i])
    }

    pub(crate) fn leaf_mut(&mut self, key: &EntryKey) -> Option<&mut Leaf> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.leaves[i]),
            None => None,
        }
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupEntry> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupEntry> {
        self.groups.values()
    }

    pub(crate) fn group_mut(&mut self, key: &GroupKey) -> Option<&mut GroupEntry> {
        self.groups.get_mut(key)
    }

    /// Fetch the group record for `key`, creating it if this is its first
    /// appearance.
    pub(crate) fn ensure_group(&mut self, key: &GroupKey, iteration: u64) -> &mut GroupEntry {
        self.groups
            .entry(key.clone())
            .or_insert_with(|| GroupEntry::new(key.clone(), iteration))
    }

    /// Start a pass after a completed one.
    ///
    /// Every leaf and every retained group records its current parent as its
    /// previous parent before the per-pass annotations are reset.
    pub(crate) fn begin_pass(&mut self, iteration: u64) {
        for group in self.groups.values_mut() {
            group.commit_parent();
        }
        for leaf in &mut self.leaves {
            leaf.commit_parent();
        }
        self.reset_pass(iteration);
    }

    /// Reset per-pass annotations without touching previous parents.
    ///
    /// Used after an aborted pass, whose parents were never completed.
    /// Groups that were not part of the last built list are freed here, so a
    /// dissolved group stays inspectable until the next pass starts.
    pub(crate) fn reset_pass(&mut self, iteration: u64) {
        self.groups.retain(|_, group| group.previous_parent.is_some());
        for group in self.groups.values_mut() {
            group.reset_for_pass(iteration);
        }
        for leaf in &mut self.leaves {
            leaf.reset_for_pass(iteration);
        }
    }

    /// Resolve a list entry to a view. Groups without a summary have no
    /// representative and resolve to `None`.
    pub fn view(&self, entry: &ListEntry) -> Option<EntryView<'_>> {
        match entry {
            ListEntry::Leaf(key) => self.leaf(key).map(EntryView::Leaf),
            ListEntry::Group(key) => {
                let group = self.group(key)?;
                let summary = self.leaf(group.summary()?)?;
                Some(EntryView::Group { group, summary })
            }
        }
    }

    pub fn views(&self, list: &[ListEntry]) -> Vec<EntryView<'_>> {
        list.iter().filter_map(|entry| self.view(entry)).collect()
    }

    pub(crate) fn set_leaf_parent(&mut self, key: &EntryKey, parent: Option<ParentRef>) {
        if let Some(leaf) = self.leaf_mut(key) {
            leaf.parent = parent;
        }
    }

    pub(crate) fn set_parent(&mut self, entry: &ListEntry, parent: Option<ParentRef>) {
        match entry {
            ListEntry::Leaf(key) => self.set_leaf_parent(key, parent),
            ListEntry::Group(key) => {
                if let Some(group) = self.group_mut(key) {
                    group.parent = parent;
                }
            }
        }
    }

    pub(crate) fn annul_leaf(&mut self, key: &EntryKey, iteration: u64) {
        if let Some(leaf) = self.leaf_mut(key) {
            leaf.annul_addition(iteration);
        }
    }

    pub(crate) fn annul_group(&mut self, key: &GroupKey, iteration: u64) {
        if let Some(group) = self.group_mut(key) {
            group.annul_addition(iteration);
        }
    }

    pub(crate) fn set_section(&mut self, entry: &ListEntry, section: i32) {
        match entry {
            ListEntry::Leaf(key) => {
                if let Some(leaf) = self.leaf_mut(key) {
                    leaf.section = Some(section);
                }
            }
            ListEntry::Group(key) => {
                if let Some(group) = self.group_mut(key) {
                    group.section = Some(section);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notif(pkg: &str, id: i32) -> Notification {
        Notification::new(pkg, id)
    }

    #[test]
    fn test_replace_leaf_set_reconciles() {
        let mut arena = EntryArena::new();
        let stats = arena.replace_leaf_set(vec![notif("a", 0), notif("a", 1)]);
        assert_eq!(stats, ReconcileStats { added: 2, ..Default::default() });

        arena.begin_pass(1);
        let stats = arena.replace_leaf_set(vec![notif("a", 1).with_rank(5), notif("b", 0)]);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.retained, 1);
        assert_eq!(stats.removed, 1);

        let kept = arena.leaf(&EntryKey::for_notification("a", 1)).unwrap();
        assert_eq!(kept.rank(), 5);
        assert_eq!(kept.first_added_iteration(), Some(1));
        assert!(arena.leaf(&EntryKey::for_notification("a", 0)).is_none());
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let mut arena = EntryArena::new();
        let stats =
            arena.replace_leaf_set(vec![notif("a", 0).with_rank(1), notif("a", 0).with_rank(2)]);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.leaves().next().unwrap().rank(), 1);
    }

    #[test]
    fn test_leaves_keep_submission_order() {
        let mut arena = EntryArena::new();
        arena.replace_leaf_set(vec![notif("c", 0), notif("a", 0), notif("b", 0)]);
        let keys: Vec<&str> = arena.leaves().map(|l| l.key().as_str()).collect();
        assert_eq!(keys, vec!["c:0", "a:0", "b:0"]);
    }

    #[test]
    fn test_group_view_needs_summary() {
        let mut arena = EntryArena::new();
        arena.replace_leaf_set(vec![notif("a", 0).with_group("g").as_group_summary()]);
        let gk = GroupKey::for_group("a", "g");
        arena.ensure_group(&gk, 1);
        assert!(arena.view(&ListEntry::Group(gk.clone())).is_none());

        arena.group_mut(&gk).unwrap().summary = Some(EntryKey::for_notification("a", 0));
        let view = arena.view(&ListEntry::Group(gk)).unwrap();
        assert!(view.is_group());
        assert_eq!(view.representative().id(), 0);
    }

    #[test]
    fn test_begin_pass_frees_unshown_groups() {
        let mut arena = EntryArena::new();
        let shown = GroupKey::for_group("a", "shown");
        let dropped = GroupKey::for_group("a", "dropped");
        arena.ensure_group(&shown, 1).parent = Some(ParentRef::Root);
        arena.ensure_group(&dropped, 1);

        arena.begin_pass(2);
        assert!(arena.group(&shown).is_some());
        assert!(arena.group(&dropped).is_none());
        assert!(arena.group(&shown).unwrap().parent().is_none());
    }

    #[test]
    fn test_begin_pass_commits_previous_parents() {
        let mut arena = EntryArena::new();
        arena.replace_leaf_set(vec![notif("a", 0), notif("a", 1)]);
        let shown = EntryKey::for_notification("a", 0);
        let hidden = EntryKey::for_notification("a", 1);
        let gk = GroupKey::for_group("a", "g");

        arena.begin_pass(1);
        arena.set_leaf_parent(&shown, Some(ParentRef::Root));
        arena.set_leaf_parent(&hidden, Some(ParentRef::Root));
        arena.ensure_group(&gk, 1).parent = Some(ParentRef::Root);

        arena.begin_pass(2);
        arena.set_leaf_parent(&shown, Some(ParentRef::Root));
        assert_eq!(arena.leaf(&hidden).unwrap().previous_parent(), Some(&ParentRef::Root));
        assert!(arena.leaf(&hidden).unwrap().parent().is_none());
        assert_eq!(arena.group(&gk).unwrap().previous_parent(), Some(&ParentRef::Root));

        arena.begin_pass(3);
        assert_eq!(arena.leaf(&shown).unwrap().previous_parent(), Some(&ParentRef::Root));
        assert!(arena.leaf(&hidden).unwrap().previous_parent().is_none());
        assert!(arena.group(&gk).is_none());
    }

    #[test]
    fn test_reset_pass_keeps_previous_parents() {
        let mut arena = EntryArena::new();
        arena.replace_leaf_set(vec![notif("a", 0)]);
        let key = EntryKey::for_notification("a", 0);

        arena.begin_pass(1);
        arena.set_leaf_parent(&key, Some(ParentRef::Root));
        arena.begin_pass(2);
        arena.set_leaf_parent(&key, None);

        arena.reset_pass(3);
        assert_eq!(arena.leaf(&key).unwrap().previous_parent(), Some(&ParentRef::Root));
    }
}
