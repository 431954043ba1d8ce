//! Mutex vs spinlock under the ring's SPSC workload.

use std::thread;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ph_lockring::{AnyLock, EventLog, LockStrategy, MutexLock, RawLock, RingBuffer, SpinLock};

const STRATEGIES: [LockStrategy; 2] = [LockStrategy::Mutex, LockStrategy::Spin];

// ============================================================================
// Uncontended: both operations on one thread
// ============================================================================

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    group.bench_function("spin/u32", |b| {
        let ring = RingBuffer::<u32, 1024, SpinLock>::new();
        b.iter(|| {
            ring.enqueue(black_box(42));
            black_box(ring.dequeue().unwrap())
        });
    });

    group.bench_function("mutex/u32", |b| {
        let ring = RingBuffer::<u32, 1024, MutexLock>::new();
        b.iter(|| {
            ring.enqueue(black_box(42));
            black_box(ring.dequeue().unwrap())
        });
    });

    group.bench_function("spin/u32+event_log", |b| {
        let log = EventLog::new();
        let ring = RingBuffer::<u32, 1024, _, _>::with_trace(SpinLock::new(), &log);
        b.iter(|| {
            ring.enqueue(black_box(42));
            black_box(ring.dequeue().unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Cross-thread: one producer, one busy-waiting consumer
// ============================================================================

fn bench_cross_thread(c: &mut Criterion) {
    const COUNT: u32 = 100_000;

    let mut group = c.benchmark_group("cross_thread");
    group.throughput(Throughput::Elements(COUNT as u64));

    for strategy in STRATEGIES {
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy),
            &strategy,
            |b, &strategy| {
                b.iter(|| {
                    let ring = RingBuffer::<u32, 256, _>::with_lock(AnyLock::new(strategy));
                    thread::scope(|s| {
                        s.spawn(|| {
                            let producer = ring.producer();
                            for v in 0..COUNT {
                                producer.push(v);
                            }
                            producer.finish();
                        });
                        black_box(ring.consumer().count());
                    });
                    black_box(ring.lock().stats())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_cross_thread);
criterion_main!(benches);
