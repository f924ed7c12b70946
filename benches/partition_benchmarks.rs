//! Partitioning throughput for the strategies that run on every dispatch

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use oracle_dispatch::partition::{
    default_threshold, make_partitions, sort_by_target, NodeMapping, Strategy,
};
use oracle_dispatch::query::{render_query_file, Query};
use std::hint::black_box;

const NODES: u64 = 1_000_000;

/// Deterministic pseudo-random queries with clustered targets
fn synthetic_queries(count: usize) -> Vec<Query> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let source = state % NODES;
            let target = (state >> 20) % (NODES / 50) * 50;
            Query::new(source, target)
        })
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("make_partitions");
    let hosts = 8;

    let mut mapping = NodeMapping::new(hosts);
    for node in 0..NODES {
        mapping.assign(node, (node % hosts as u64) as usize);
    }

    for count in [10_000usize, 100_000] {
        let queries = synthetic_queries(count);
        let strategies = [
            Strategy::Range { parts: hosts },
            Strategy::All {
                parts: hosts,
                threshold: default_threshold(count, hosts),
            },
            Strategy::Mod {
                modulus: hosts as u64,
            },
            Strategy::Div {
                divisor: NODES / hosts as u64,
                parts: hosts,
            },
            Strategy::Alloc {
                boundaries: (1..=hosts as u64).map(|i| i * NODES / hosts as u64).collect(),
            },
            Strategy::Topology {
                mapping: mapping.clone(),
            },
        ];

        for strategy in &strategies {
            group.bench_with_input(
                BenchmarkId::new(strategy.name(), count),
                &queries,
                |b, queries| b.iter(|| black_box(make_partitions(queries, strategy).unwrap())),
            );
        }
    }

    group.finish();
}

fn bench_sort_and_render(c: &mut Criterion) {
    let queries = synthetic_queries(100_000);
    let parts = make_partitions(&queries, &Strategy::Range { parts: 8 }).unwrap();

    c.bench_function("sort_by_target", |b| {
        b.iter_batched(
            || parts.clone(),
            |mut parts| {
                sort_by_target(&mut parts);
                black_box(parts)
            },
            criterion::BatchSize::LargeInput,
        )
    });

    c.bench_function("render_query_file", |b| {
        b.iter(|| black_box(render_query_file(&parts[0])))
    });
}

criterion_group!(benches, bench_strategies, bench_sort_and_render);
criterion_main!(benches);
