//! Benchmarks for notif_list_builder

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use notif_list_builder::*;
use std::sync::Arc;

const PACKAGES: [&str; 5] = [
    "com.mail",
    "com.chat",
    "org.calendar",
    "com.news",
    "com.music",
];

/// A leaf set where roughly a third of the notifications sit in groups of
/// four children plus a summary.
fn sample_leaf_set(size: usize) -> Vec<Notification> {
    (0..size)
        .map(|i| {
            let package = PACKAGES[i % PACKAGES.len()];
            let n = Notification::new(package, i as i32)
                .with_rank((i * 7 % 101) as i32)
                .with_when((i * 13 % 97) as i64)
                .with_post_time(i as i64);
            match i % 15 {
                0 => n.with_group(format!("thread_{}", i / 15)).as_group_summary(),
                1..=4 => n.with_group(format!("thread_{}", i / 15)),
                _ => n,
            }
        })
        .collect()
}

fn configured_builder() -> ListBuilder {
    let mut builder = ListBuilder::default();
    builder.add_pre_group_filter(Arc::new(FilterFn::new("Muted", |leaf: &Leaf, _| {
        leaf.package() == "com.news" && leaf.rank() % 3 == 0
    })));
    builder.add_promoter(Arc::new(PromoterFn::new("Starred", |leaf: &Leaf| {
        leaf.id() % 11 == 0
    })));
    builder.set_sectioner(Arc::new(SectionerFn::new("ByPackage", |e: &EntryView<'_>| {
        PACKAGES
            .iter()
            .position(|p| *p == e.representative().package())
            .unwrap_or(PACKAGES.len()) as i32
    })));
    builder.set_comparators(vec![Arc::new(ComparatorFn::new(
        "Recent",
        |a: &EntryView<'_>, b: &EntryView<'_>| {
            b.representative()
                .post_time()
                .cmp(&a.representative().post_time())
        },
    ))]);
    builder.add_pre_render_filter(Arc::new(FilterFn::new("Stale", |leaf: &Leaf, now| {
        leaf.when() as u64 > now.saturating_add(90)
    })));
    builder
}

fn benchmark_build(c: &mut Criterion) {
    let records = sample_leaf_set(200);
    let mut builder = configured_builder();

    c.bench_function("build_200", |b| {
        b.iter(|| {
            builder
                .submit_full_leaf_set(black_box(records.clone()))
                .unwrap()
        })
    });

    let mut group = c.benchmark_group("build_by_size");
    for size in [10, 100, 1000, 5000].iter() {
        let records = sample_leaf_set(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            let mut builder = configured_builder();
            b.iter(|| builder.submit_full_leaf_set(black_box(records.clone())).unwrap())
        });
    }
    group.finish();
}

fn benchmark_cold_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_build_by_size");
    for size in [100, 1000].iter() {
        let records = sample_leaf_set(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                let mut builder = configured_builder();
                builder.submit_full_leaf_set(black_box(records.clone())).unwrap();
                builder
            })
        });
    }
    group.finish();
}

fn benchmark_invalidation(c: &mut Criterion) {
    let records = sample_leaf_set(500);
    let filter = Arc::new(FilterFn::new("Toggle", |leaf: &Leaf, _| leaf.id() % 2 == 0));
    let mut builder = configured_builder();
    builder.add_pre_group_filter(filter.clone());
    let handle = ListBuilderHandle::new(builder);
    handle.submit_full_leaf_set(records).unwrap();

    c.bench_function("invalidate_and_rebuild_500", |b| {
        b.iter(|| filter.invalidate_list().unwrap())
    });
}

fn benchmark_render_dump(c: &mut Criterion) {
    let records = sample_leaf_set(500);
    let mut builder = configured_builder();
    let slot = Arc::new(parking_lot::Mutex::new(RenderList::default()));
    let sink = slot.clone();
    builder.set_on_render_list_listener(move |list: &RenderList| {
        *sink.lock() = list.clone();
    });
    builder.submit_full_leaf_set(records).unwrap();
    let list = slot.lock().clone();

    c.bench_function("dump_list_500", |b| b.iter(|| dump_list(black_box(&list))));
    c.bench_function("to_json_500", |b| b.iter(|| black_box(&list).to_json().unwrap()));
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_cold_build,
    benchmark_invalidation,
    benchmark_render_dump
);
criterion_main!(benches);
