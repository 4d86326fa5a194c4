//! Benchmarks for submission and dispatch overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use threadpool_executor::prelude::*;

fn bench_submit_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_join_1000");

    for threads in [1usize, 4, 8] {
        let pool = Executor::with_threads(threads).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                let futures: Vec<_> = (0..1000u64)
                    .map(|x| pool.submit(move || black_box(x * x)).unwrap())
                    .collect();
                futures
                    .into_iter()
                    .map(|f| f.join().unwrap())
                    .sum::<u64>()
            });
        });

        pool.shutdown();
    }

    group.finish();
}

fn bench_terminate(c: &mut Criterion) {
    let pool = Executor::with_threads(1).unwrap();

    c.bench_function("terminate_1000_queued", |b| {
        b.iter(|| {
            let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
            let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
            let blocker = pool
                .submit(move || {
                    let _ = started_tx.send(());
                    release_rx.recv().ok()
                })
                .unwrap();
            // the worker must hold the blocker before anything is queued
            started_rx.recv().unwrap();

            for x in 0..1000u64 {
                pool.submit(move || black_box(x)).unwrap();
            }
            let cancelled = pool.terminate();
            release_tx.send(()).unwrap();
            blocker.wait();
            cancelled
        });
    });
}

criterion_group!(benches, bench_submit_join, bench_terminate);
criterion_main!(benches);
