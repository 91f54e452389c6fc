use criterion::{criterion_group, criterion_main, Criterion};
use pact::prelude::*;

fn settle_and_read(c: &mut Criterion) {
    let pool = WorkerPool::new(4);
    c.bench_function("resolve_and_value", |b| {
        b.iter(|| {
            let (deferred, promise) = Deferred::new(&pool);
            deferred.resolve(1);
            promise.value()
        });
    });
}

fn chained_settlement(c: &mut Criterion) {
    let pool = WorkerPool::new(4);
    c.bench_function("then_chain_depth_8", |b| {
        b.iter(|| {
            let (deferred, promise) = Deferred::new(&pool);
            let mut tail = promise;
            for _ in 0..8 {
                tail = tail.then(|n| Ok(n + 1));
            }
            deferred.resolve(0);
            tail.value()
        });
    });
}

fn submission_burst(c: &mut Criterion) {
    c.bench_function("submit_100_and_drain", |b| {
        b.iter(|| {
            let pool = WorkerPool::new(4);
            for _ in 0..100 {
                pool.submit(|| {});
            }
            pool.wait_until_idle();
        });
    });
}

criterion_group!(benches, settle_and_read, chained_settlement, submission_burst);
criterion_main!(benches);
