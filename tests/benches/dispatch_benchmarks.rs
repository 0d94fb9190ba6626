//! # Herald Dispatch Benchmarks
//!
//! | Path | Expectation |
//! |------|-------------|
//! | Publish, no subscribers | one read lock and a map miss |
//! | Publish, N subscribers | linear in N, no lock held while handlers run |
//! | Register / unregister | linear in the records of the affected types |
//! | Failure isolation | a panicking handler costs one unwind, not the pass |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use herald_bus::{Discovery, EventBus, Subscriber};
use herald_tests::fixtures::{PlayerDied, ScoreEvent};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FAN_OUT: [usize; 4] = [1, 10, 100, 1000];

/// Counts scores without allocating.
struct Tally {
    total: AtomicU64,
}

impl Tally {
    fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
        }
    }
}

impl Subscriber for Tally {
    fn discover(d: &mut Discovery<Self>) {
        d.handler("OnScoreEvent", 1.0, |t: &Tally, e: &ScoreEvent| {
            t.total.fetch_add(u64::from(e.points), Ordering::Relaxed);
        });
    }
}

fn quiet_bus() -> EventBus {
    EventBus::builder()
        .name("bench")
        .on_failure(|_| {})
        .build()
        .unwrap_or_default()
}

// ============================================================================
// PUBLISH
// ============================================================================

fn bench_publish_unrouted(c: &mut Criterion) {
    let bus = quiet_bus();
    let event = PlayerDied {
        player: "nobody".to_string(),
    };

    c.bench_function("publish_unrouted", |b| {
        b.iter(|| black_box(bus.publish(black_box(&event))))
    });
}

fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish-fan-out");
    group.measurement_time(Duration::from_secs(5));

    for size in FAN_OUT {
        // Declarative owners.
        let bus = quiet_bus();
        let owners: Vec<Arc<Tally>> = (0..size).map(|_| Arc::new(Tally::new())).collect();
        for owner in &owners {
            bus.register(owner).unwrap();
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("declarative", size), &bus, |b, bus| {
            b.iter(|| black_box(bus.publish(&ScoreEvent { points: 1 })))
        });

        // Direct closures at random priorities.
        let bus = quiet_bus();
        let counter = Arc::new(AtomicU64::new(0));
        let mut rng = rand::thread_rng();
        for _ in 0..size {
            let counter = Arc::clone(&counter);
            let priority = f64::from(rng.gen_range(-100i32..100));
            let _ = bus.subscribe::<ScoreEvent, _>(priority, move |e| {
                counter.fetch_add(u64::from(e.points), Ordering::Relaxed);
            })
            .unwrap();
        }

        group.bench_with_input(BenchmarkId::new("direct", size), &bus, |b, bus| {
            b.iter(|| black_box(bus.publish(&ScoreEvent { points: 1 })))
        });
        drop(owners);
    }

    group.finish();
}

fn bench_publish_with_failures(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish-failures");
    // Silence the default hook so unwinding is what gets measured.
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));

    for failing in [0usize, 1, 10] {
        let bus = quiet_bus();
        for _ in 0..failing {
            let _ = bus.subscribe::<ScoreEvent, _>(2.0, |_| panic!("bench failure"))
                .unwrap();
        }
        for _ in 0..10 {
            let _ = bus.subscribe::<ScoreEvent, _>(1.0, |e| {
                black_box(e.points);
            })
            .unwrap();
        }

        group.bench_with_input(BenchmarkId::new("panicking", failing), &bus, |b, bus| {
            b.iter(|| black_box(bus.publish(&ScoreEvent { points: 1 })))
        });
    }

    group.finish();
    std::panic::set_hook(previous);
}

// ============================================================================
// REGISTRATION
// ============================================================================

fn bench_register_unregister(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    for held in [0usize, 100, 1000] {
        let bus = quiet_bus();
        let background: Vec<Arc<Tally>> = (0..held).map(|_| Arc::new(Tally::new())).collect();
        for owner in &background {
            bus.register(owner).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("register_then_unregister", held), &bus, |b, bus| {
            b.iter(|| {
                let owner = Arc::new(Tally::new());
                bus.register(&owner).unwrap();
                black_box(bus.unregister(&owner))
            })
        });

        group.bench_with_input(BenchmarkId::new("subscribe_then_unsubscribe", held), &bus, |b, bus| {
            b.iter(|| {
                let handle = bus.subscribe::<ScoreEvent, _>(0.5, |_| {}).unwrap();
                black_box(bus.unsubscribe(&handle))
            })
        });
        drop(background);
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_publish_unrouted,
    bench_publish_fan_out,
    bench_publish_with_failures,
    bench_register_unregister
);
criterion_main!(benches);
