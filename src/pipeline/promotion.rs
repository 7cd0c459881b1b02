//! Promotion stage: lift selected group children to the top level.

use std::sync::Arc;

use super::traits::NotifPromoter;
use crate::entry::{EntryArena, ListEntry};
use crate::types::{GroupKey, ParentRef};

/// Offer every child of every group to the promoter chain.
///
/// The first promoter that accepts a child is recorded on it; later
/// promoters are not asked. Promoted children are appended to the top level
/// in group order. Groups left too small are not pruned here.
pub fn promote_children(
    arena: &mut EntryArena,
    top_level: &mut Vec<ListEntry>,
    promoters: &[Arc<dyn NotifPromoter>],
) -> usize {
    if promoters.is_empty() {
        return 0;
    }

    let groups: Vec<GroupKey> = top_level
        .iter()
        .filter_map(|entry| match entry {
            ListEntry::Group(key) => Some(key.clone()),
            ListEntry::Leaf(_) => None,
        })
        .collect();

    let mut promoted = Vec::new();
    for group_key in groups {
        let Some(group) = arena.group_mut(&group_key) else {
            continue;
        };
        let children = std::mem::take(&mut group.children);
        let mut kept = Vec::with_capacity(children.len());

        for child in children {
            let winner = arena.leaf(&child).and_then(|leaf| {
                promoters
                    .iter()
                    .find(|promoter| promoter.should_promote_to_top_level(leaf))
                    .map(|promoter| promoter.tag().clone())
            });
            match winner {
                Some(tag) => {
                    if let Some(leaf) = arena.leaf_mut(&child) {
                        log_trace!(leaf = %child, promoter = %tag, "promoted to top level");
                        leaf.notif_promoter = Some(tag);
                        leaf.parent = Some(ParentRef::Root);
                    }
                    promoted.push(ListEntry::Leaf(child));
                }
                None => kept.push(child),
            }
        }

        if let Some(group) = arena.group_mut(&group_key) {
            group.children = kept;
        }
    }

    let count = promoted.len();
    top_level.extend(promoted);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Leaf;
    use crate::pipeline::grouping::group_leaves;
    use crate::pipeline::traits::{Pluggable, PromoterFn};
    use crate::types::{EntryKey, Notification};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (EntryArena, Vec<ListEntry>) {
        let mut arena = EntryArena::new();
        arena.replace_leaf_set(vec![
            Notification::new("pkg", 0).with_group("g").as_group_summary(),
            Notification::new("pkg", 1).with_group("g"),
            Notification::new("pkg", 2).with_group("g"),
            Notification::new("pkg", 3).with_group("g"),
            Notification::new("pkg", 4),
        ]);
        arena.begin_pass(1);
        let included: Vec<EntryKey> = arena.leaves().map(|l| l.key().clone()).collect();
        let (top_level, _) = group_leaves(&mut arena, &included, 1);
        (arena, top_level)
    }

    #[test]
    fn test_promoted_children_are_appended() {
        let (mut arena, mut top_level) = setup();
        let promoter: Arc<dyn NotifPromoter> =
            Arc::new(PromoterFn::new("Even", |leaf: &Leaf| leaf.id() % 2 == 0));

        let count = promote_children(&mut arena, &mut top_level, &[promoter.clone()]);
        assert_eq!(count, 1);
        assert_eq!(top_level.last(), Some(&ListEntry::Leaf(EntryKey::for_notification("pkg", 2))));

        let leaf = arena.leaf(&EntryKey::for_notification("pkg", 2)).unwrap();
        assert_eq!(leaf.parent(), Some(&ParentRef::Root));
        assert!(leaf.notif_promoter().unwrap().is(promoter.as_ref()));

        let group = arena.group(&GroupKey::for_group("pkg", "g")).unwrap();
        assert_eq!(group.children().len(), 2);
    }

    #[test]
    fn test_first_promoter_preempts_later_ones() {
        let (mut arena, mut top_level) = setup();
        let second_calls = Arc::new(AtomicUsize::new(0));
        let counter = second_calls.clone();

        let first: Arc<dyn NotifPromoter> =
            Arc::new(PromoterFn::new("One", |leaf: &Leaf| leaf.id() == 1));
        let second: Arc<dyn NotifPromoter> = Arc::new(PromoterFn::new("Any", move |_: &Leaf| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        }));

        promote_children(&mut arena, &mut top_level, &[first.clone(), second]);
        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
        let leaf = arena.leaf(&EntryKey::for_notification("pkg", 1)).unwrap();
        assert_eq!(leaf.notif_promoter().map(|t| t.name()), Some(first.name()));
    }

    #[test]
    fn test_no_promoters_is_a_no_op() {
        let (mut arena, mut top_level) = setup();
        let before = top_level.clone();
        assert_eq!(promote_children(&mut arena, &mut top_level, &[]), 0);
        assert_eq!(top_level, before);
    }
}
