//! Filter stages.
//!
//! Both filter chains use the same rule: filters run in registration order
//! and the first one that excludes a leaf is recorded on it. The pre-group
//! chain sees every leaf; the pre-render chain sees the leaves that survived
//! to the sorted list, group summaries and children included.

use std::sync::Arc;

use super::traits::{NotifFilter, PluggableTag};
use crate::entry::{EntryArena, Leaf, ListEntry};
use crate::types::EntryKey;

/// The first filter in `filters` that excludes `leaf`.
pub fn first_excluding_filter(
    leaf: &Leaf,
    now: u64,
    filters: &[Arc<dyn NotifFilter>],
) -> Option<PluggableTag> {
    filters
        .iter()
        .find(|filter| filter.should_filter_out(leaf, now))
        .map(|filter| filter.tag().clone())
}

fn exclude(arena: &mut EntryArena, key: &EntryKey, tag: PluggableTag, iteration: u64) {
    if let Some(leaf) = arena.leaf_mut(key) {
        log_trace!(leaf = %key, filter = %tag, "filtered out");
        leaf.excluding_filter = Some(tag);
        leaf.annul_addition(iteration);
    }
}

/// Run the pre-group chain over every leaf, in input order.
///
/// Returns the keys of the leaves that passed and the number excluded.
pub fn filter_pre_group(
    arena: &mut EntryArena,
    filters: &[Arc<dyn NotifFilter>],
    now: u64,
    iteration: u64,
) -> (Vec<EntryKey>, usize) {
    let decisions: Vec<(EntryKey, Option<PluggableTag>)> = arena
        .leaves()
        .map(|leaf| (leaf.key().clone(), first_excluding_filter(leaf, now, filters)))
        .collect();

    let mut included = Vec::with_capacity(decisions.len());
    let mut excluded = 0;
    for (key, decision) in decisions {
        match decision {
            Some(tag) => {
                exclude(arena, &key, tag, iteration);
                excluded += 1;
            }
            None => included.push(key),
        }
    }
    (included, excluded)
}

/// Run the pre-render chain over the sorted list.
///
/// Excluded top-level leaves are removed; excluded group members are removed
/// from their group. Groups are not pruned here. Returns the number of leaves
/// excluded.
pub fn filter_pre_render(
    arena: &mut EntryArena,
    top_level: &mut Vec<ListEntry>,
    filters: &[Arc<dyn NotifFilter>],
    now: u64,
    iteration: u64,
) -> usize {
    if filters.is_empty() {
        return 0;
    }

    let mut excluded = 0;
    let entries = std::mem::take(top_level);
    top_level.reserve(entries.len());

    for entry in entries {
        match entry {
            ListEntry::Leaf(key) => {
                let decision = arena
                    .leaf(&key)
                    .and_then(|leaf| first_excluding_filter(leaf, now, filters));
                match decision {
                    Some(tag) => {
                        exclude(arena, &key, tag, iteration);
                        excluded += 1;
                    }
                    None => top_level.push(ListEntry::Leaf(key)),
                }
            }
            ListEntry::Group(group_key) => {
                let Some(group) = arena.group(&group_key) else {
                    continue;
                };
                let members: Vec<EntryKey> =
                    group.summary().into_iter().chain(group.children()).cloned().collect();
                let summary = group.summary().cloned();

                let mut dropped = Vec::new();
                for member in members {
                    let decision = arena
                        .leaf(&member)
                        .and_then(|leaf| first_excluding_filter(leaf, now, filters));
                    if let Some(tag) = decision {
                        exclude(arena, &member, tag, iteration);
                        dropped.push(member);
                    }
                }
                excluded += dropped.len();

                if !dropped.is_empty() {
                    if let Some(group) = arena.group_mut(&group_key) {
                        if summary.as_ref().is_some_and(|s| dropped.contains(s)) {
                            group.summary = None;
                        }
                        group.children.retain(|child| !dropped.contains(child));
                    }
                }
                top_level.push(ListEntry::Group(group_key));
            }
        }
    }
    excluded
}
