//! # Concurrent Register / Publish
//!
//! Publishers on several threads race writers that register and unregister.
//! Every pass must still observe one consistent, priority-ordered snapshot.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use herald_bus::EventBus;
    use rand::Rng;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const PUBLISHERS: usize = 4;
    const PUBLISHES_PER_THREAD: usize = 500;

    fn is_descending(priorities: &[f64]) -> bool {
        priorities.windows(2).all(|w| w[0] >= w[1])
    }

    fn churn<O: herald_bus::Subscriber>(bus: &EventBus, owner: Arc<O>) -> usize {
        bus.register(&owner).unwrap();
        bus.unregister(&owner)
    }

    #[test]
    fn test_publish_order_holds_under_concurrent_registration() {
        let bus = Arc::new(EventBus::new());
        let high = Arc::new(Tagged::<3>);
        let low = Arc::new(Tagged::<1>);
        bus.register(&high).unwrap();
        bus.register(&low).unwrap();

        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let bus = Arc::clone(&bus);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                while !stop.load(Ordering::Relaxed) {
                    let removed = match rng.gen_range(0..3) {
                        0 => churn(&bus, Arc::new(Tagged::<0>)),
                        1 => churn(&bus, Arc::new(Tagged::<2>)),
                        _ => churn(&bus, Arc::new(Tagged::<4>)),
                    };
                    assert_eq!(removed, 1);
                }
            })
        };

        let violations = Arc::new(AtomicUsize::new(0));
        let publishers: Vec<_> = (0..PUBLISHERS)
            .map(|_| {
                let bus = Arc::clone(&bus);
                let violations = Arc::clone(&violations);
                thread::spawn(move || {
                    for _ in 0..PUBLISHES_PER_THREAD {
                        let tracer = Tracer::default();
                        let report = bus.publish(&tracer);
                        let seen = tracer.priorities();
                        if !is_descending(&seen) || seen.len() != report.delivered {
                            violations.fetch_add(1, Ordering::Relaxed);
                        }
                        if !seen.contains(&3.0) || !seen.contains(&1.0) {
                            violations.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();

        for handle in publishers {
            handle.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        assert_eq!(violations.load(Ordering::Relaxed), 0);
        assert_eq!(bus.total_subscriptions(), 2);
        assert_eq!(bus.metrics().events_published, (PUBLISHERS * PUBLISHES_PER_THREAD) as u64);
    }

    #[test]
    fn test_parallel_registration_loses_nothing() {
        let bus = Arc::new(EventBus::new());
        let log = journal();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bus = Arc::clone(&bus);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    let mut owners = Vec::new();
                    for _ in 0..25 {
                        let board = Arc::new(Leaderboard { journal: Arc::clone(&log) });
                        bus.register(&board).unwrap();
                        owners.push(board);
                    }
                    owners
                })
            })
            .collect();

        let owners: Vec<Arc<Leaderboard>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(bus.subscriber_count::<ScoreEvent>(), 200);
        let report = bus.publish(&ScoreEvent { points: 1 });
        assert_eq!(report.delivered, 200);
        assert_eq!(log.lock().len(), 200);

        let removed: usize = owners.iter().map(|o| bus.unregister(o)).sum();
        assert_eq!(removed, 200);
        assert_eq!(bus.total_subscriptions(), 0);
    }

    #[test]
    fn test_bus_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventBus>();
    }
}
