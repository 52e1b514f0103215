//! # Store Benchmarks
//!
//! Performance benchmarks for savant-core store operations.
//!
//! Run with: `cargo bench -p savant-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use savant_core::{
    KnowledgeGraphStore, Mutation, MutationBatch, Properties, PropertyValue, export_graph,
};
use std::hint::black_box;

/// A batch creating `size` nodes chained by NEXT links.
fn chain_batch(prefix: &str, size: usize) -> MutationBatch {
    let mut batch = MutationBatch::new();
    for i in 0..size {
        let mut props = Properties::new();
        props.insert("rank".to_string(), PropertyValue::Int(i as i64));
        batch.push(Mutation::add_node(format!("{}{}", prefix, i), &["Topic"], props));
        if i > 0 {
            batch.push(Mutation::add_relationship(
                format!("{}{}", prefix, i - 1),
                format!("{}{}", prefix, i),
                "NEXT",
            ));
        }
    }
    batch
}

/// A store already holding `size` chained nodes.
fn populated_store(size: usize) -> KnowledgeGraphStore {
    let store = KnowledgeGraphStore::new();
    store
        .apply_mutations(&chain_batch("base", size))
        .expect("seed");
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_apply_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_batch");

    for size in [100, 1000, 10000].iter() {
        let batch = chain_batch("n", *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let store = KnowledgeGraphStore::new();
                black_box(store.apply_mutations(&batch).expect("apply"))
            });
        });
    }

    group.finish();
}

fn bench_small_batch_on_large_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_batch_on_large_graph");

    for size in [1000, 10000].iter() {
        let store = populated_store(*size);
        let mut round = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                round += 1;
                let batch = chain_batch(&format!("r{}-", round), 5);
                black_box(store.apply_mutations(&batch).expect("apply"))
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let store = populated_store(10000);
    c.bench_function("snapshot_10000", |b| {
        b.iter(|| black_box(store.snapshot()));
    });
}

fn bench_export(c: &mut Criterion) {
    let store = populated_store(10000);
    c.bench_function("export_10000", |b| {
        b.iter(|| black_box(export_graph(&store.snapshot()).expect("export")));
    });
}

criterion_group!(
    benches,
    bench_apply_batch,
    bench_small_batch_on_large_graph,
    bench_snapshot,
    bench_export
);
criterion_main!(benches);
