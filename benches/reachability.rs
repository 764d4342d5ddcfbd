//! Performance benchmarks for access derivation.
//!
//! Run with: `cargo bench --bench reachability`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use access_graph_kernel::AccessManager;

type Engine = AccessManager<String, String, String, String>;

/// A user at the bottom of a `depth`-long chain of nested groups, with the
/// outermost group holding the component grant.
fn build_chain(depth: usize) -> (Engine, String) {
    let mgr: Engine = AccessManager::new();
    mgr.add_user("u1".to_string(), None).unwrap();

    let groups: Vec<String> = (0..depth).map(|i| format!("g{i}")).collect();
    for g in &groups {
        mgr.add_group(g.clone(), None).unwrap();
    }
    mgr.add_user_to_group_mapping("u1".to_string(), groups[0].clone(), None).unwrap();
    for pair in groups.windows(2) {
        mgr.add_group_to_group_mapping(pair[0].clone(), pair[1].clone(), None).unwrap();
    }
    mgr.add_group_to_component_mapping(groups[depth - 1].clone(), "billing".to_string(), "read".to_string(), None)
        .unwrap();

    (mgr, "u1".to_string())
}

/// A bench fixture where `fan_out` groups each directly grant one of
/// `fan_out` components, and the user belongs to every group.
fn build_fan_out(fan_out: usize) -> (Engine, String) {
    let mgr: Engine = AccessManager::new();
    mgr.add_user("u1".to_string(), None).unwrap();
    for i in 0..fan_out {
        let group = format!("g{i}");
        mgr.add_group(group.clone(), None).unwrap();
        mgr.add_user_to_group_mapping("u1".to_string(), group.clone(), None).unwrap();
        mgr.add_group_to_component_mapping(group, format!("component{i}"), "read".to_string(), None).unwrap();
    }
    (mgr, "u1".to_string())
}

fn bench_indirect_group_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("indirect_group_resolution");

    for depth in [1, 10, 50, 200] {
        let (mgr, user) = build_chain(depth);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("depth", depth), &user, |b, user| {
            b.iter(|| black_box(mgr.get_user_to_group_mappings(user, true)))
        });
    }

    group.finish();
}

fn bench_component_access_through_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("component_access_through_chain");

    for depth in [1, 10, 50, 200] {
        let (mgr, user) = build_chain(depth);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("depth", depth), &user, |b, user| {
            b.iter(|| {
                black_box(mgr.has_access_to_application_component(
                    user,
                    &"billing".to_string(),
                    &"read".to_string(),
                ))
            })
        });
    }

    group.finish();
}

fn bench_accessible_components_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("accessible_components_fan_out");

    for fan_out in [1, 10, 50, 200] {
        let (mgr, user) = build_fan_out(fan_out);

        group.throughput(Throughput::Elements(fan_out as u64));
        group.bench_with_input(BenchmarkId::new("fan_out", fan_out), &user, |b, user| {
            b.iter(|| black_box(mgr.get_application_components_accessible_by_user(user)))
        });
    }

    group.finish();
}

/// Concurrent read queries against a fixed chain, scaled across reader
/// threads; mutations never run concurrently with this benchmark, so it
/// measures `RwLock` read-side contention in isolation.
fn bench_concurrent_query_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_query_contention");

    for num_threads in [1, 2, 4, 8] {
        let (mgr, user) = build_chain(50);
        let mgr = Arc::new(mgr);

        group.bench_function(BenchmarkId::new("threads", num_threads), |b| {
            b.iter(|| {
                thread::scope(|scope| {
                    for _ in 0..num_threads {
                        let mgr = Arc::clone(&mgr);
                        let user = user.clone();
                        scope.spawn(move || {
                            black_box(mgr.get_application_components_accessible_by_user(&user));
                        });
                    }
                });
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_indirect_group_resolution,
    bench_component_access_through_chain,
    bench_accessible_components_fan_out,
    bench_concurrent_query_contention,
);
criterion_main!(benches);
