//! Benchmarks for the placement matrix
//!
//! Measures performance of:
//! - BFS open-slot search at different tree sizes
//! - Bounded ancestor walks
//! - Commission splits

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use trellis_matrix::{ancestor_chain, find_open_slot, CommissionTable, Matrix};

/// Benchmark finding the next open slot
fn bench_find_open_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_open_slot");

    for &size in &[10usize, 100, 1_000, 10_000] {
        let mut matrix = Matrix::filled(size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| find_open_slot(&mut matrix, black_box(&0)))
        });
    }
    group.finish();
}

/// Benchmark the depth-capped ancestor walk from deep nodes
fn bench_ancestor_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("ancestor_chain");

    for &size in &[100usize, 10_000, 100_000] {
        let mut matrix = Matrix::filled(size);
        let leaf = size - 1;
        let parent = matrix.parent_of(leaf).unwrap_or(0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &parent, |b, &p| {
            b.iter(|| ancestor_chain(&mut matrix, black_box(&p)))
        });
    }
    group.finish();
}

/// Benchmark building trees by repeated insertion
fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill");
    group.sample_size(20);

    for &size in &[100usize, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| Matrix::filled(black_box(n)))
        });
    }
    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let table = CommissionTable::new([1000, 500, 300, 200, 100]).unwrap();
    c.bench_function("commission_split", |b| {
        b.iter(|| table.split(black_box(1_234_567), black_box(5)))
    });
}

criterion_group!(
    benches,
    bench_find_open_slot,
    bench_ancestor_chain,
    bench_fill,
    bench_split,
);
criterion_main!(benches);
