//! Section/sort stage.
//!
//! Children inside each group are ordered by the built-in rule. Top-level
//! entries are sectioned once each, then ordered by section, the comparator
//! chain, and finally the built-in rule applied to their representative
//! leaves. Every sort is stable, so fully tied entries keep their input
//! order.

use std::cmp::Ordering;
use std::sync::Arc;

use super::traits::{NotifComparator, NotifSectioner};
use crate::entry::{EntryArena, EntryView, Leaf, ListEntry};
use crate::types::GroupKey;

/// Built-in ordering: rank ascending, then display time descending.
pub fn fallback_order(a: &Leaf, b: &Leaf) -> Ordering {
    a.rank()
        .cmp(&b.rank())
        .then_with(|| b.when().cmp(&a.when()))
}

/// Order two top-level entries of the same section.
pub fn compare_entries(
    a: &EntryView<'_>,
    b: &EntryView<'_>,
    comparators: &[Arc<dyn NotifComparator>],
) -> Ordering {
    comparators
        .iter()
        .map(|comparator| comparator.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| fallback_order(a.representative(), b.representative()))
}

/// Sort the children of every group in `top_level`.
pub fn sort_group_children(arena: &mut EntryArena, top_level: &[ListEntry]) {
    for entry in top_level {
        let ListEntry::Group(group_key) = entry else {
            continue;
        };
        sort_children_of(arena, group_key);
    }
}

fn sort_children_of(arena: &mut EntryArena, group_key: &GroupKey) {
    let Some(group) = arena.group_mut(group_key) else {
        return;
    };
    let mut children = std::mem::take(&mut group.children);
    children.sort_by(|a, b| match (arena.leaf(a), arena.leaf(b)) {
        (Some(a), Some(b)) => fallback_order(a, b),
        _ => Ordering::Equal,
    });
    if let Some(group) = arena.group_mut(group_key) {
        group.children = children;
    }
}

/// Section every top-level entry and sort the list.
///
/// The sectioner is called exactly once per entry; the result is recorded
/// on the entry.
pub fn section_and_sort(
    arena: &mut EntryArena,
    top_level: &mut Vec<ListEntry>,
    sectioner: &dyn NotifSectioner,
    comparators: &[Arc<dyn NotifComparator>],
) {
    let sections: Vec<i32> = top_level
        .iter()
        .map(|entry| arena.view(entry).map_or(0, |view| sectioner.section(&view)))
        .collect();
    for (entry, &section) in top_level.iter().zip(&sections) {
        arena.set_section(entry, section);
    }

    let mut order: Vec<usize> = (0..top_level.len()).collect();
    {
        let views: Vec<Option<EntryView<'_>>> =
            top_level.iter().map(|entry| arena.view(entry)).collect();
        order.sort_by(|&a, &b| {
            sections[a].cmp(&sections[b]).then_with(|| match (&views[a], &views[b]) {
                (Some(va), Some(vb)) => compare_entries(va, vb, comparators),
                _ => Ordering::Equal,
            })
        });
    }

    let sorted: Vec<ListEntry> = order.into_iter().map(|i| top_level[i].clone()).collect();
    *top_level = sorted;
}
