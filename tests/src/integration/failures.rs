//! # Failure Isolation
//!
//! A failing subscriber is reported once and never stops the pass.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use herald_bus::{Discovery, DispatchFailure, EventBus, FailureCause, Subscriber};
    use herald_telemetry::init_test_logging;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Seen {
        bus: String,
        handler: String,
        owner: &'static str,
        panicked: bool,
        message: String,
    }

    fn capturing_bus() -> (EventBus, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bus = EventBus::builder()
            .name("failures")
            .on_failure(move |failure: &DispatchFailure| {
                let message = match &failure.cause {
                    FailureCause::Panicked(msg) => msg.clone(),
                    FailureCause::Errored(err) => format!("{err:#}"),
                };
                sink.lock().push(Seen {
                    bus: failure.bus.clone(),
                    handler: failure.handler.clone(),
                    owner: failure.owner_type,
                    panicked: failure.is_panic(),
                    message,
                });
            })
            .build()
            .unwrap();
        (bus, seen)
    }

    /// Refuses scores above its limit.
    struct Referee {
        limit: u32,
    }

    impl Subscriber for Referee {
        fn discover(d: &mut Discovery<Self>) {
            d.fallible_handler("OnScoreEvent", 1.5, |r: &Referee, e: &ScoreEvent| {
                anyhow::ensure!(e.points <= r.limit, "score {} over limit {}", e.points, r.limit);
                Ok(())
            });
        }
    }

    /// Panics on any death.
    struct Fragile;

    impl Subscriber for Fragile {
        fn discover(d: &mut Discovery<Self>) {
            d.handler("OnPlayerDied", 10.0, |_: &Fragile, e: &PlayerDied| {
                panic!("cannot cope with {}", e.player);
            });
        }
    }

    #[test]
    fn test_error_is_reported_once_and_pass_continues() {
        init_test_logging();
        let (bus, seen) = capturing_bus();
        let log = journal();

        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();
        let referee = Arc::new(Referee { limit: 5 });
        bus.register(&referee).unwrap();
        let leaderboard = Arc::new(Leaderboard { journal: Arc::clone(&log) });
        bus.register(&leaderboard).unwrap();

        let report = bus.publish(&ScoreEvent { points: 9 });
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(*log.lock(), vec!["hud:9", "leaderboard:9"]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].bus, "failures");
        assert_eq!(seen[0].handler, "OnScoreEvent");
        assert!(seen[0].owner.ends_with("Referee"));
        assert!(!seen[0].panicked);
        assert_eq!(seen[0].message, "score 9 over limit 5");
    }

    #[test]
    fn test_panic_is_reported_once_and_pass_continues() {
        init_test_logging();
        let (bus, seen) = capturing_bus();
        let log = journal();

        let fragile = Arc::new(Fragile);
        bus.register(&fragile).unwrap();
        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();

        bus.publish(&PlayerDied { player: "dee".to_string() });
        assert_eq!(*log.lock(), vec!["hud:died:dee"]);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].panicked);
        assert_eq!(seen[0].message, "cannot cope with dee");
    }

    #[test]
    fn test_failing_subscriber_stays_registered() {
        let (bus, seen) = capturing_bus();
        let fragile = Arc::new(Fragile);
        bus.register(&fragile).unwrap();

        for i in 0..3 {
            bus.publish(&PlayerDied { player: format!("p{i}") });
        }
        assert_eq!(seen.lock().len(), 3);
        assert_eq!(bus.subscriber_count::<PlayerDied>(), 1);
        assert_eq!(bus.metrics().failures, 3);
    }

    #[test]
    fn test_default_handler_logs_and_continues() {
        init_test_logging();
        let bus = EventBus::new();
        let log = journal();
        let fragile = Arc::new(Fragile);
        bus.register(&fragile).unwrap();
        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();

        let report = bus.publish(&PlayerDied { player: "eve".to_string() });
        assert_eq!(report.failed, 1);
        assert_eq!(*log.lock(), vec!["hud:died:eve"]);
    }
}
