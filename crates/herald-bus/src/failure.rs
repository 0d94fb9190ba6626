//! # Dispatch Failures
//!
//! A subscriber that panics or returns an error is reported here. Failures
//! are soft: they go to the configured [`FailureHandler`] and never reach the
//! publisher.

use crate::subscriber::{SubscriberRecord, SubscriptionId};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// What went wrong inside a subscriber.
#[derive(Debug, Error)]
pub enum FailureCause {
    /// The handler panicked; carries the panic message.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The handler returned an error.
    #[error("returned error: {0:#}")]
    Errored(anyhow::Error),
}

/// One failed invocation.
#[derive(Debug, Error)]
#[error("subscriber `{handler}` of `{owner_type}` failed on `{event_type}`: {cause}")]
pub struct DispatchFailure {
    /// Name of the bus that dispatched the event.
    pub bus: String,
    pub subscription: SubscriptionId,
    pub event_type: &'static str,
    pub owner_type: &'static str,
    pub handler: String,
    pub priority: f64,
    #[source]
    pub cause: FailureCause,
}

impl DispatchFailure {
    pub(crate) fn new(bus: &str, record: &SubscriberRecord, cause: FailureCause) -> Self {
        Self {
            bus: bus.to_string(),
            subscription: record.id(),
            event_type: record.event().name(),
            owner_type: record.owner().type_name(),
            handler: record.handler().to_string(),
            priority: record.priority().value(),
            cause,
        }
    }

    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self.cause, FailureCause::Panicked(_))
    }
}

/// Callback receiving every dispatch failure.
pub type FailureHandler = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// Default strategy: log and continue.
pub fn log_failure(failure: &DispatchFailure) {
    error!(
        bus = %failure.bus,
        subscription = %failure.subscription,
        event_type = failure.event_type,
        owner = failure.owner_type,
        handler = %failure.handler,
        priority = failure.priority,
        cause = %failure.cause,
        "Subscriber failed during dispatch"
    );
}

/// The default handler as a shareable value.
#[must_use]
pub fn logging_handler() -> FailureHandler {
    Arc::new(log_failure)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
