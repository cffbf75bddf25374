//! Throughput benchmarks for the bounded queue.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use cpumon_sync::prelude::*;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

fn bench_uncontended(c: &mut Criterion) {
    let queue = match BoundedQueue::new(10) {
        Ok(queue) => queue,
        Err(e) => panic!("queue creation failed: {e}"),
    };
    let stop = StopToken::default();

    c.bench_function("push_pop_uncontended", |b| {
        b.iter(|| {
            let pushed = queue.push_blocking(black_box(42_u64), &stop);
            black_box(pushed.is_ok());
            black_box(queue.pop_blocking(&stop))
        });
    });

    c.bench_function("lock_insert_extract", |b| {
        b.iter(|| {
            let mut guard = queue.lock();
            black_box(guard.insert(black_box(7_u64)).is_ok());
            black_box(guard.extract())
        });
    });
}

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_handoff");

    for capacity in [1_usize, 10, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = match BoundedQueue::new(capacity) {
                        Ok(queue) => Arc::new(queue),
                        Err(e) => panic!("queue creation failed: {e}"),
                    };
                    let stop = StopToken::new([Arc::clone(&queue) as Arc<dyn Wake>]);

                    let producer = {
                        let queue = Arc::clone(&queue);
                        let stop = stop.clone();
                        thread::spawn(move || {
                            for value in 0..1_000_u32 {
                                if queue.push_blocking(value, &stop).is_err() {
                                    break;
                                }
                            }
                        })
                    };

                    for _ in 0..1_000_u32 {
                        black_box(queue.pop_blocking(&stop));
                    }
                    black_box(producer.join().is_ok())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_handoff);
criterion_main!(benches);
