//! Grouping stage: fold grouped leaves into [`GroupEntry`]s.
//!
//! [`group_leaves`] builds the raw top-level list; [`prune_incomplete_groups`]
//! enforces the group validity rule and is shared by every stage that can
//! shrink a group (grouping, promotion, pre-render filtering).
//!
//! [`GroupEntry`]: crate::entry::GroupEntry

use rustc_hash::FxHashSet;

use crate::entry::{EntryArena, ListEntry};
use crate::types::{EntryKey, ParentRef};

/// Counters reported by the grouping stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingStats {
    pub groups: usize,
    pub discarded_summaries: usize,
}

/// Build the top-level list from the included leaves, in input order.
///
/// A group takes the slot of its first member. When a group has several
/// summary candidates, the one with the latest post time wins (the earlier
/// candidate on a tie) and the others are dropped from the list.
pub fn group_leaves(
    arena: &mut EntryArena,
    included: &[EntryKey],
    iteration: u64,
) -> (Vec<ListEntry>, GroupingStats) {
    let mut top_level = Vec::with_capacity(included.len());
    let mut seen = FxHashSet::default();
    let mut stats = GroupingStats::default();

    for key in included {
        let Some(leaf) = arena.leaf(key) else {
            continue;
        };
        let Some(group_key) = leaf.group_key().cloned() else {
            arena.set_leaf_parent(key, Some(ParentRef::Root));
            top_level.push(ListEntry::Leaf(key.clone()));
            continue;
        };
        let is_summary = leaf.is_group_summary();
        let post_time = leaf.post_time();

        if seen.insert(group_key.clone()) {
            top_level.push(ListEntry::Group(group_key.clone()));
        }

        if is_summary {
            let incumbent = arena.ensure_group(&group_key, iteration).summary.clone();
            if let Some(incumbent) = incumbent {
                let incumbent_time = arena.leaf(&incumbent).map_or(i64::MIN, |l| l.post_time());
                stats.discarded_summaries += 1;
                if post_time <= incumbent_time {
                    log_debug!(
                        group = %group_key,
                        kept = %incumbent,
                        dropped = %key,
                        "duplicate group summary"
                    );
                    arena.annul_leaf(key, iteration);
                    continue;
                }
                log_debug!(
                    group = %group_key,
                    kept = %key,
                    dropped = %incumbent,
                    "duplicate group summary"
                );
                arena.annul_leaf(&incumbent, iteration);
            }
            arena.ensure_group(&group_key, iteration).summary = Some(key.clone());
        } else {
            arena.ensure_group(&group_key, iteration).children.push(key.clone());
        }
        arena.set_leaf_parent(key, Some(ParentRef::Group(group_key)));
    }

    stats.groups = seen.len();
    (top_level, stats)
}

/// Dissolve every group that fails the validity rule, in place.
///
/// A dissolved group's children take its slot at the top level and its
/// summary is dropped. With `keep_childless_summaries`, a summary that has no
/// children at all is shown on its own instead. Surviving groups are parented
/// to the root. Returns the number of groups dissolved.
pub fn prune_incomplete_groups(
    arena: &mut EntryArena,
    top_level: &mut Vec<ListEntry>,
    iteration: u64,
    keep_childless_summaries: bool,
) -> usize {
    let entries = std::mem::take(top_level);
    top_level.reserve(entries.len());
    let mut dissolved = 0;

    for entry in entries {
        let group_key = match entry {
            ListEntry::Leaf(_) => {
                top_level.push(entry);
                continue;
            }
            ListEntry::Group(group_key) => group_key,
        };
        let Some(group) = arena.group_mut(&group_key) else {
            continue;
        };
        if group.is_valid() {
            group.parent = Some(ParentRef::Root);
            top_level.push(ListEntry::Group(group_key));
            continue;
        }

        let summary = group.summary.take();
        let children = std::mem::take(&mut group.children);
        arena.annul_group(&group_key, iteration);
        dissolved += 1;
        log_trace!(
            group = %group_key,
            children = children.len(),
            has_summary = summary.is_some(),
            "dissolving group"
        );

        if let Some(summary) = summary {
            if children.is_empty() && keep_childless_summaries {
                arena.set_leaf_parent(&summary, Some(ParentRef::Root));
                top_level.push(ListEntry::Leaf(summary));
            } else {
                arena.annul_leaf(&summary, iteration);
            }
        }
        for child in children {
            arena.set_leaf_parent(&child, Some(ParentRef::Root));
            top_level.push(ListEntry::Leaf(child));
        }
    }
    dissolved
}
