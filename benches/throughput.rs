//! Submission and drain throughput of the task pool

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use prio_pool::prelude::*;
use std::time::Duration;

fn drain(pool: &TaskPool, tasks: usize, priority_of: impl Fn(usize) -> TaskPriority) {
    for i in 0..tasks {
        pool.submit(
            move || {
                black_box(i * 2);
                Ok(())
            },
            priority_of(i),
            None,
        )
        .expect("submit");
    }
    pool.wait_all(Duration::ZERO);
}

fn bench_single_tier(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_tier");

    for threads in [1, 4, 8].iter() {
        let pool = TaskPool::with_threads(*threads).expect("Failed to create pool");
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, _| {
            b.iter(|| drain(&pool, 1_000, |_| TaskPriority::Normal))
        });
        pool.shutdown();
    }

    group.finish();
}

fn bench_mixed_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_tiers");

    for threads in [1, 4, 8].iter() {
        let pool = TaskPool::with_threads(*threads).expect("Failed to create pool");
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, _| {
            b.iter(|| drain(&pool, 1_000, |i| TaskPriority::ALL[i % 4]))
        });
        pool.purge_finished();
        pool.shutdown();
    }

    group.finish();
}

criterion_group!(benches, bench_single_tier, bench_mixed_tiers);
criterion_main!(benches);
