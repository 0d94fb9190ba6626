//! # Dispatcher
//!
//! Walks one snapshot of subscriber records in order, synchronously, on the
//! caller's thread. Each invocation is isolated: a panic or returned error is
//! turned into a [`DispatchFailure`], handed to the failure handler exactly
//! once, and dispatch moves on to the next record.
//!
//! The dispatcher never sees the registry lock. The facade copies the slot
//! under the lock and passes the copy in.

use crate::failure::{logging_handler, panic_message, DispatchFailure, FailureCause, FailureHandler};
use crate::metrics::BusMetrics;
use crate::subscriber::{Invocation, SubscriberRecord};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Records in the snapshot
    pub subscribers: usize,
    /// Handlers that ran to completion
    pub delivered: usize,
    /// Handlers that panicked or returned an error
    pub failed: usize,
    /// Records whose owner was already dropped
    pub skipped: usize,
}

impl DispatchReport {
    /// True when no subscriber existed for the event.
    #[must_use]
    pub fn is_unrouted(&self) -> bool {
        self.subscribers == 0
    }

    /// True when every subscriber in the snapshot ran cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Invokes snapshots of subscriber records with failure isolation.
pub struct Dispatcher {
    bus: String,
    on_failure: FailureHandler,
    metrics: Arc<BusMetrics>,
    trace_dispatch: bool,
}

impl Dispatcher {
    pub fn new(
        bus: impl Into<String>,
        on_failure: Option<FailureHandler>,
        metrics: Arc<BusMetrics>,
        trace_dispatch: bool,
    ) -> Self {
        Self {
            bus: bus.into(),
            on_failure: on_failure.unwrap_or_else(logging_handler),
            metrics,
            trace_dispatch,
        }
    }

    /// Invoke every record in `snapshot`, in order, with `event`.
    pub fn dispatch(&self, snapshot: &[Arc<SubscriberRecord>], event: &dyn Any) -> DispatchReport {
        let mut report = DispatchReport {
            subscribers: snapshot.len(),
            ..DispatchReport::default()
        };

        for record in snapshot {
            if self.trace_dispatch {
                trace!(
                    bus = %self.bus,
                    event_type = record.event().name(),
                    owner = record.owner().type_name(),
                    handler = record.handler(),
                    priority = record.priority().value(),
                    "Invoking subscriber"
                );
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| record.invoke(event)));
            let cause = match outcome {
                Ok(Ok(Invocation::Delivered)) => {
                    report.delivered += 1;
                    self.metrics.record_delivery();
                    continue;
                }
                Ok(Ok(Invocation::OwnerDropped)) => {
                    report.skipped += 1;
                    self.metrics.record_owner_dropped();
                    continue;
                }
                Ok(Err(err)) => FailureCause::Errored(err),
                Err(payload) => FailureCause::Panicked(panic_message(payload.as_ref())),
            };

            report.failed += 1;
            self.metrics.record_failure();
            self.report_failure(&DispatchFailure::new(&self.bus, record, cause));
        }

        report
    }

    fn report_failure(&self, failure: &DispatchFailure) {
        let handled = panic::catch_unwind(AssertUnwindSafe(|| (self.on_failure)(failure)));
        if let Err(payload) = handled {
            error!(
                bus = %self.bus,
                failure = %failure,
                panic = %panic_message(payload.as_ref()),
                "Failure handler panicked"
            );
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bus", &self.bus)
            .field("trace_dispatch", &self.trace_dispatch)
            .finish_non_exhaustive()
    }
}
