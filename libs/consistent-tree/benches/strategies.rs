use std::collections::BTreeSet;
use std::hint::black_box;
use std::thread;

use consistent_tree::{
    ConsistentTree, Optimistic, Spinning, Strategy, Unsynchronized, WholeStructure,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::seq::SliceRandom;

const SIZES: [u32; 3] = [100, 1_000, 10_000];

fn shuffled(n: u32) -> Vec<u32> {
    let mut values: Vec<_> = (0..n).collect();
    values.shuffle(&mut rand::rng());
    values
}

fn insert<S: Strategy>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("insert/{}", S::NAME));
    for size in SIZES {
        let values = shuffled(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| {
                let tree = ConsistentTree::<u32, S>::new();
                for value in values {
                    tree.insert(black_box(*value));
                }
                tree
            });
        });
    }
    group.finish();
}

fn find<S: Strategy>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find/{}", S::NAME));
    for size in SIZES {
        let values = shuffled(size);
        let tree: ConsistentTree<u32, S> = values.iter().copied().collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| {
                for value in values {
                    black_box(tree.contains(value));
                }
            });
        });
    }
    group.finish();
}

fn walk<S: Strategy>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("walk/{}", S::NAME));
    for size in SIZES {
        let tree: ConsistentTree<u32, S> = (0..size).collect();
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| tree.iter().fold(0_u64, |acc, v| acc + u64::from(v)));
        });
    }
    group.finish();
}

/// Four readers walking the tree while one writer erases and reinserts.
fn contended<S: Strategy>(c: &mut Criterion)
where
    ConsistentTree<u32, S>: Sync,
{
    let values = shuffled(10_000);
    let tree: ConsistentTree<u32, S> = values.iter().copied().collect();

    c.bench_function(&format!("contended/{}", S::NAME), |b| {
        b.iter(|| {
            thread::scope(|s| {
                s.spawn(|| {
                    for value in &values[..1000] {
                        tree.erase(value);
                        tree.insert(*value);
                    }
                });
                for _ in 0..4 {
                    s.spawn(|| black_box(tree.iter().count()));
                }
            });
        });
    });
}

fn btreeset_baseline(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert/btreeset");
    for size in SIZES {
        let values = shuffled(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| {
                let mut set = BTreeSet::new();
                for value in values {
                    set.insert(black_box(*value));
                }
                set
            });
        });
    }
    group.finish();
}

criterion_group!(
    sequential,
    insert::<Unsynchronized>,
    insert::<WholeStructure>,
    insert::<Optimistic>,
    insert::<Spinning>,
    btreeset_baseline,
    find::<Unsynchronized>,
    find::<WholeStructure>,
    find::<Spinning>,
    walk::<Unsynchronized>,
    walk::<WholeStructure>,
);
criterion_group!(
    concurrent,
    contended::<WholeStructure>,
    contended::<Optimistic>,
    contended::<Spinning>,
);
criterion_main!(sequential, concurrent);
