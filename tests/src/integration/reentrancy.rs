//! # Re-entrant Dispatch
//!
//! Handlers that call back into the bus while a dispatch pass is running.
//! The pass in flight always works from its own snapshot; the mutation
//! shows up on the next publish.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use herald_bus::{Discovery, EventBus, OwnerId, Subscriber, SubscriptionHandle};
    use parking_lot::Mutex;
    use std::sync::{mpsc, Arc, OnceLock, Weak};
    use std::thread;
    use std::time::Duration;

    /// Unregisters itself the first time it sees a death.
    struct OneShot {
        bus: Weak<EventBus>,
        me: OnceLock<OwnerId>,
        journal: Journal,
    }

    impl Subscriber for OneShot {
        fn discover(d: &mut Discovery<Self>) {
            d.handler("OnPlayerDied", 5.0, |this: &OneShot, e: &PlayerDied| {
                this.journal.lock().push(format!("oneshot:{}", e.player));
                if let (Some(bus), Some(me)) = (this.bus.upgrade(), this.me.get()) {
                    bus.unregister_owner(*me);
                }
            });
        }
    }

    /// Registers a fresh leaderboard every time it sees a score.
    struct Spawner {
        bus: Weak<EventBus>,
        journal: Journal,
        spawned: Mutex<Vec<Arc<Leaderboard>>>,
    }

    impl Subscriber for Spawner {
        fn discover(d: &mut Discovery<Self>) {
            d.handler("OnScoreEvent", 9.0, |this: &Spawner, _: &ScoreEvent| {
                let Some(bus) = this.bus.upgrade() else {
                    return;
                };
                let board = Arc::new(Leaderboard {
                    journal: Arc::clone(&this.journal),
                });
                bus.register(&board).unwrap();
                this.spawned.lock().push(board);
            });
        }
    }

    /// Announces a death on the bus when the last closure holding it goes.
    struct Obituary {
        bus: Weak<EventBus>,
        player: String,
    }

    impl Drop for Obituary {
        fn drop(&mut self) {
            if let Some(bus) = self.bus.upgrade() {
                bus.publish(&PlayerDied {
                    player: self.player.clone(),
                });
            }
        }
    }

    #[test]
    fn test_declarative_owner_unregisters_itself() {
        let bus = Arc::new(EventBus::new());
        let log = journal();

        let oneshot = Arc::new(OneShot {
            bus: Arc::downgrade(&bus),
            me: OnceLock::new(),
            journal: Arc::clone(&log),
        });
        oneshot.me.set(OwnerId::of(&oneshot)).unwrap();
        bus.register(&oneshot).unwrap();
        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();

        let first = bus.publish(&PlayerDied { player: "ann".to_string() });
        let second = bus.publish(&PlayerDied { player: "ben".to_string() });

        assert_eq!(first.delivered, 2);
        assert_eq!(second.delivered, 1);
        assert_eq!(
            *log.lock(),
            vec!["oneshot:ann", "hud:died:ann", "hud:died:ben"]
        );
    }

    #[test]
    fn test_handle_unsubscribes_itself_without_skipping_next() {
        let bus = Arc::new(EventBus::new());
        let log = journal();
        let handle_slot: Arc<OnceLock<SubscriptionHandle>> = Arc::new(OnceLock::new());

        let weak = Arc::downgrade(&bus);
        let slot = Arc::clone(&handle_slot);
        let own_log = Arc::clone(&log);
        let handle = bus
            .subscribe::<ScoreEvent, _>(1.0, move |_| {
                own_log.lock().push("self".to_string());
                if let (Some(bus), Some(handle)) = (weak.upgrade(), slot.get()) {
                    bus.unsubscribe(handle);
                }
            })
            .unwrap();
        handle_slot.set(handle).unwrap();

        let next_log = Arc::clone(&log);
        let _next = bus
            .subscribe::<ScoreEvent, _>(0.5, move |_| next_log.lock().push("next".to_string()))
            .unwrap();

        bus.publish(&ScoreEvent { points: 1 });
        bus.publish(&ScoreEvent { points: 2 });
        assert_eq!(*log.lock(), vec!["self", "next", "next"]);
    }

    #[test]
    fn test_registration_during_dispatch_applies_to_next_pass() {
        let bus = Arc::new(EventBus::new());
        let log = journal();
        let spawner = Arc::new(Spawner {
            bus: Arc::downgrade(&bus),
            journal: Arc::clone(&log),
            spawned: Mutex::new(Vec::new()),
        });
        bus.register(&spawner).unwrap();

        let first = bus.publish(&ScoreEvent { points: 1 });
        assert_eq!(first.subscribers, 1);
        assert!(log.lock().is_empty());

        let second = bus.publish(&ScoreEvent { points: 2 });
        assert_eq!(second.subscribers, 2);
        assert_eq!(*log.lock(), vec!["leaderboard:2"]);
        assert_eq!(spawner.spawned.lock().len(), 2);
    }

    #[test]
    fn test_nested_publish_completes_inner_pass_first() {
        let bus = Arc::new(EventBus::new());
        let log = journal();

        let weak = Arc::downgrade(&bus);
        let outer_log = Arc::clone(&log);
        let _outer = bus
            .subscribe::<ScoreEvent, _>(1.0, move |e| {
                outer_log.lock().push("outer:before".to_string());
                if let Some(bus) = weak.upgrade() {
                    bus.publish(&PlayerDied {
                        player: format!("p{}", e.points),
                    });
                }
                outer_log.lock().push("outer:after".to_string());
            })
            .unwrap();
        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();

        bus.publish(&ScoreEvent { points: 7 });
        assert_eq!(
            *log.lock(),
            vec!["hud:7", "outer:before", "hud:died:p7", "outer:after"]
        );
    }

    #[test]
    fn test_dropping_owner_mid_pass_skips_it() {
        let bus = Arc::new(EventBus::new());
        let log = journal();
        let victim: Arc<Mutex<Option<Arc<Leaderboard>>>> = Arc::new(Mutex::new(Some(Arc::new(
            Leaderboard {
                journal: Arc::clone(&log),
            },
        ))));

        let holder = Arc::clone(&victim);
        let _killer = bus
            .subscribe::<ScoreEvent, _>(10.0, move |_| {
                holder.lock().take();
            })
            .unwrap();
        if let Some(board) = victim.lock().as_ref() {
            bus.register(board).unwrap();
        }

        let report = bus.publish(&ScoreEvent { points: 4 });
        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_state_released_by_unsubscribe_can_publish() {
        let bus = Arc::new(EventBus::new());
        let log = journal();
        let hud = Arc::new(Hud { journal: Arc::clone(&log) });
        bus.register(&hud).unwrap();

        let obituary = Obituary {
            bus: Arc::downgrade(&bus),
            player: "zed".to_string(),
        };
        let handle = bus
            .subscribe::<ScoreEvent, _>(0.0, move |_| {
                let _held = &obituary;
            })
            .unwrap();

        let (done, finished) = mpsc::channel();
        let worker = Arc::clone(&bus);
        thread::spawn(move || {
            let _ = done.send(worker.unsubscribe(&handle));
        });

        assert_eq!(finished.recv_timeout(Duration::from_secs(5)), Ok(true));
        assert_eq!(*log.lock(), vec!["hud:died:zed"]);
    }
}
