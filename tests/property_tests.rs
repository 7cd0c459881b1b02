//! Property-based tests using proptest

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use notif_list_builder::*;
use parking_lot::Mutex;
use proptest::prelude::*;

const PACKAGES: [&str; 3] = ["com.alpha", "com.beta", "org.gamma"];

fn notification_strategy() -> impl Strategy<Value = (usize, Option<usize>, bool, i32, i64, i64)> {
    (
        0usize..PACKAGES.len(),
        prop::option::of(0usize..2),
        any::<bool>(),
        0i32..20,
        0i64..50,
        0i64..50,
    )
}

fn leaf_set_strategy() -> impl Strategy<Value = Vec<Notification>> {
    prop::collection::vec(notification_strategy(), 0..40).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(id, (package, group, summary, rank, when, post_time))| {
                let mut n = Notification::new(PACKAGES[package], id as i32)
                    .with_rank(rank)
                    .with_when(when)
                    .with_post_time(post_time);
                if let Some(group) = group {
                    n = n.with_group(format!("g{group}"));
                    if summary {
                        n = n.as_group_summary();
                    }
                }
                n
            })
            .collect()
    })
}

fn package_section(package: &str) -> i32 {
    PACKAGES.iter().position(|p| *p == package).unwrap_or(PACKAGES.len()) as i32
}

/// A builder sectioned by package whose latest list lands in the returned slot.
fn capturing_builder() -> (ListBuilder, Arc<Mutex<Option<RenderList>>>) {
    let slot = Arc::new(Mutex::new(None));
    let sink = slot.clone();
    let mut builder = ListBuilder::default();
    builder.set_sectioner(Arc::new(SectionerFn::new("ByPackage", |e: &EntryView<'_>| {
        package_section(e.representative().package())
    })));
    builder.set_on_render_list_listener(move |list: &RenderList| {
        *sink.lock() = Some(list.clone());
    });
    (builder, slot)
}

fn build(records: &[Notification]) -> RenderList {
    let (mut builder, slot) = capturing_builder();
    builder.begin_dispatch().unwrap();
    builder.submit_full_leaf_set(records.to_vec()).unwrap();
    let list = slot.lock().take().unwrap();
    list
}

fn fallback(a: &Notification, b: &Notification) -> Ordering {
    a.rank.cmp(&b.rank).then(b.when.cmp(&a.when))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn test_no_leaf_is_rendered_twice(records in leaf_set_strategy()) {
        let list = build(&records);
        let mut seen = HashSet::new();
        for leaf in list.leaves() {
            prop_assert!(seen.insert(leaf.key.clone()), "{} rendered twice", leaf.key);
        }
    }

    #[test]
    fn test_every_non_summary_leaf_is_rendered(records in leaf_set_strategy()) {
        let list = build(&records);
        let rendered: HashSet<EntryKey> = list.leaves().map(|l| l.key.clone()).collect();
        for n in records.iter().filter(|n| !n.is_group_summary) {
            prop_assert!(rendered.contains(&n.key()), "{} missing", n.key());
        }
    }

    #[test]
    fn test_groups_are_well_formed(records in leaf_set_strategy()) {
        let list = build(&records);
        for entry in &list {
            match entry {
                RenderEntry::Leaf(leaf) => {
                    prop_assert_eq!(&leaf.parent, &Some(ParentRef::Root));
                }
                RenderEntry::Group(group) => {
                    let own = Some(ParentRef::Group(group.key.clone()));
                    prop_assert!(group.summary.notification.is_group_summary);
                    prop_assert!(group.children.len() >= MIN_CHILDREN_FOR_GROUP);
                    prop_assert_eq!(&group.summary.parent, &own);
                    for child in &group.children {
                        prop_assert_eq!(&child.parent, &own);
                        prop_assert_eq!(child.notification.group_key(), Some(group.key.clone()));
                    }
                }
            }
        }
    }

    #[test]
    fn test_top_level_is_sorted_by_section_then_rank(records in leaf_set_strategy()) {
        let list = build(&records);
        for pair in list.entries().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let order = a
                .section()
                .cmp(&b.section())
                .then_with(|| fallback(&a.representative().notification, &b.representative().notification));
            prop_assert_ne!(order, Ordering::Greater, "{} before {}", a.key_str(), b.key_str());
        }
    }

    #[test]
    fn test_group_children_are_sorted(records in leaf_set_strategy()) {
        let list = build(&records);
        for group in list.iter().filter_map(|e| e.as_group()) {
            for pair in group.children.windows(2) {
                prop_assert_ne!(
                    fallback(&pair[0].notification, &pair[1].notification),
                    Ordering::Greater
                );
            }
        }
    }

    #[test]
    fn test_rebuilding_the_same_set_is_stable(records in leaf_set_strategy()) {
        let (mut builder, slot) = capturing_builder();
        builder.submit_full_leaf_set(records.clone()).unwrap();
        let first = slot.lock().take().unwrap();
        builder.begin_dispatch().unwrap();
        builder.submit_full_leaf_set(records).unwrap();
        let second = slot.lock().take().unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_pre_group_excluded_leaves_are_absent(
        records in leaf_set_strategy(),
        modulus in 2i32..5
    ) {
        let (mut builder, slot) = capturing_builder();
        builder.add_pre_group_filter(Arc::new(FilterFn::new("RankModulus", move |leaf: &Leaf, _| {
            leaf.rank() % modulus == 0
        })));
        builder.submit_full_leaf_set(records.clone()).unwrap();
        let list = slot.lock().take().unwrap();

        for leaf in list.leaves() {
            prop_assert_ne!(leaf.notification.rank % modulus, 0);
        }
        for n in records.iter().filter(|n| n.rank % modulus == 0) {
            let leaf = builder.leaf(&n.key());
            prop_assert!(leaf.map_or(true, |l| l.parent().is_none()));
        }
    }

    #[test]
    fn test_builder_is_idle_after_every_pass(records in leaf_set_strategy()) {
        let (mut builder, _slot) = capturing_builder();
        builder.submit_full_leaf_set(records).unwrap();
        prop_assert_eq!(builder.state(), PipelineState::Idle);
        prop_assert_eq!(builder.iteration(), 1);
    }
}
