//! # Herald Bus - In-Process Typed Event Bus
//!
//! Components register interest in typed event payloads and are notified in
//! a deterministic, priority-controlled order when such payloads are
//! published.
//!
//! ## Dispatch Model
//!
//! ```text
//! ┌──────────────┐   register()    ┌──────────────────────────┐
//! │  Subscriber  │ ──────────────▶ │       Type Registry       │
//! │   (owner)    │                 │  TypeId → [records...]    │
//! └──────────────┘                 │  priority ↓, owner name ↑ │
//!                                  └────────────┬─────────────┘
//! ┌──────────────┐   publish()                  │ snapshot
//! │  Publisher   │ ─────────────────────────────▼
//! └──────────────┘                 ┌──────────────────────────┐
//!                                  │        Dispatcher         │
//!                                  │ invoke in order, isolate  │
//!                                  │ failures → FailureHandler │
//!                                  └──────────────────────────┘
//! ```
//!
//! ## Ordering Rules
//!
//! - **Routing:** by exact runtime type; subtypes do not receive supertype events.
//! - **Priority:** higher value first; exact comparison, no epsilon.
//! - **Tie-break:** owner type name without module path, ascending; then insertion order.
//! - **Snapshot:** mutations made during a dispatch pass apply to later passes.
//!
//! ## Example
//!
//! ```
//! use herald_bus::{Discovery, Event, EventBus, Subscriber};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! struct ScoreEvent { points: u32 }
//! impl Event for ScoreEvent {}
//!
//! #[derive(Default)]
//! struct Scoreboard { total: AtomicU32 }
//!
//! impl Subscriber for Scoreboard {
//!     fn discover(d: &mut Discovery<Self>) {
//!         d.handler("OnScoreEvent", 1.0, |s: &Scoreboard, e: &ScoreEvent| {
//!             s.total.fetch_add(e.points, Ordering::Relaxed);
//!         });
//!     }
//! }
//!
//! let bus = EventBus::new();
//! let board = Arc::new(Scoreboard::default());
//! bus.register(&board).unwrap();
//!
//! let report = bus.publish(&ScoreEvent { points: 10 });
//! assert_eq!(report.delivered, 1);
//! assert_eq!(board.total.load(Ordering::Relaxed), 10);
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod failure;
pub mod metrics;
pub mod registry;
pub mod subscriber;
pub mod validator;

// Re-export main types
pub use bus::{EventBus, EventBusBuilder, Registration};
pub use config::{BusConfig, BusConfigBuilder, RejectionPolicy};
pub use discovery::{Discovery, HandlerCandidate, Layer, Receiver, ReturnShape, Subscriber};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{ConfigError, RegistrationError, Rejection};
pub use events::{Event, EventType, Lineage, TypeKind};
pub use failure::{log_failure, DispatchFailure, FailureCause, FailureHandler};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use registry::TypeRegistry;
pub use subscriber::{
    Invocation, Origin, OwnerId, OwnerRef, Priority, SubscriberRecord, SubscriptionHandle,
    SubscriptionId,
};
pub use validator::{RegistrationValidator, HANDLER_PREFIX};
