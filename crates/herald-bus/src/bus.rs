//! # Event Bus
//!
//! The public face of the crate. Owns the type registry behind one
//! `parking_lot::RwLock` and composes discovery, validation and dispatch.
//!
//! ## Locking
//!
//! - `register`, `subscribe*`, `unregister*` and `prune_dropped` take the
//!   write lock for the registry mutation only.
//! - `publish` takes the read lock just long enough to copy the slot.
//! - Discovery, validation and `Event::supertype` resolution run before the
//!   write lock is taken. Under the lock the registry only compares
//!   resolved lineages and reorders records.
//! - Records removed under the lock are dropped after it is released, so
//!   state captured by a handler may call back into the bus from `Drop`.
//! - No lock is held while handlers or the failure handler run, so handlers
//!   may re-enter the bus. Mutations made from inside a handler affect later
//!   dispatch passes, never the one in flight.

use crate::config::{BusConfig, RejectionPolicy};
use crate::discovery::{flatten, Discovery, Subscriber};
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::{ConfigError, RegistrationError};
use crate::events::{EventType, Lineage};
use crate::failure::{DispatchFailure, FailureHandler};
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::registry::TypeRegistry;
use crate::subscriber::{
    Invocation, Origin, OwnerId, OwnerRef, Priority, SubscriberRecord, SubscriptionHandle,
    SubscriptionId, Target,
};
use crate::validator::RegistrationValidator;
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of a declarative [`EventBus::register`] call.
#[derive(Debug)]
pub struct Registration {
    /// Type name of the registered owner.
    pub owner_type: &'static str,
    /// One handle per inserted subscription, in discovery order.
    pub accepted: Vec<SubscriptionHandle>,
    /// Candidates rejected under [`RejectionPolicy::SkipInvalid`].
    pub skipped: Vec<RegistrationError>,
}

impl Registration {
    /// True when no candidate was skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// In-process publish/subscribe bus.
pub struct EventBus {
    config: BusConfig,
    registry: RwLock<TypeRegistry>,
    validator: RegistrationValidator,
    dispatcher: Dispatcher,
    metrics: Arc<BusMetrics>,
}

impl EventBus {
    /// Bus with default configuration and the logging failure handler.
    #[must_use]
    pub fn new() -> Self {
        Self::assemble(BusConfig::default(), None)
    }

    /// Bus with a validated configuration.
    pub fn with_config(config: BusConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, None))
    }

    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    fn assemble(config: BusConfig, on_failure: Option<FailureHandler>) -> Self {
        let metrics = Arc::new(BusMetrics::new());
        Self {
            registry: RwLock::new(TypeRegistry::new()),
            validator: RegistrationValidator::new(config.default_priority),
            dispatcher: Dispatcher::new(
                config.name.clone(),
                on_failure,
                Arc::clone(&metrics),
                config.trace_dispatch,
            ),
            metrics,
            config,
        }
    }

    /// Discover, validate and insert every handler of `owner`.
    ///
    /// Under [`RejectionPolicy::AbortAll`] the first rejected candidate fails
    /// the call and nothing from this owner is inserted. Under
    /// [`RejectionPolicy::SkipInvalid`] valid candidates are inserted and the
    /// rejections are returned in [`Registration::skipped`].
    ///
    /// Registering the same owner twice yields two subscriptions per handler.
    pub fn register<O: Subscriber>(&self, owner: &Arc<O>) -> Result<Registration, RegistrationError> {
        let owner_type = type_name::<O>();
        let (candidates, shadowed) = flatten(Discovery::<O>::scan());
        for name in &shadowed {
            debug!(bus = %self.config.name, owner = owner_type, handler = %name, "Base handler overridden");
        }

        let mut records = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();

        for candidate in &candidates {
            let accepted = match self.validator.accept(candidate) {
                Ok(accepted) => accepted,
                Err(reason) => {
                    let err = RegistrationError::rejected(owner_type, candidate.name(), reason);
                    self.refuse(owner_type, err, &mut skipped)?;
                    continue;
                }
            };

            let weak = Arc::downgrade(owner);
            let bound = accepted.target;
            let target: Target = Arc::new(move |event: &dyn Any| -> anyhow::Result<Invocation> {
                let Some(owner) = weak.upgrade() else {
                    return Ok(Invocation::OwnerDropped);
                };
                bound(&*owner, event).map(|()| Invocation::Delivered)
            });

            records.push(SubscriberRecord::new(
                OwnerRef::shared(owner),
                accepted.event,
                accepted.name,
                accepted.priority,
                Origin::Declarative,
                target,
            ));
        }

        let abort = self.config.rejection_policy == RejectionPolicy::AbortAll;
        let (accepted, conflicts, pruned) = {
            let mut registry = self.registry.write();
            let pruned = self.prune_locked(&mut registry);

            let mut held: Vec<Lineage> = registry.declarative_lineages().cloned().collect();
            let mut admitted = Vec::with_capacity(records.len());
            let mut conflicts = Vec::new();
            for record in records {
                match RegistrationValidator::check_exclusive(record.lineage(), &held) {
                    Ok(()) => {
                        if !held.iter().any(|lineage| lineage.event() == record.event()) {
                            held.push(record.lineage().clone());
                        }
                        admitted.push(record);
                    }
                    Err(reason) => {
                        conflicts.push(RegistrationError::rejected(owner_type, record.handler(), reason));
                        if abort {
                            break;
                        }
                    }
                }
            }

            let accepted: Vec<SubscriptionHandle> = if abort && !conflicts.is_empty() {
                Vec::new()
            } else {
                admitted
                    .into_iter()
                    .map(|record| {
                        let handle = record.handle();
                        registry.insert(Arc::new(record));
                        handle
                    })
                    .collect()
            };
            (accepted, conflicts, pruned)
        };
        self.settle_pruned(pruned);
        for err in conflicts {
            self.refuse(owner_type, err, &mut skipped)?;
        }

        self.metrics.record_registrations(accepted.len());
        debug!(
            bus = %self.config.name,
            owner = owner_type,
            accepted = accepted.len(),
            skipped = skipped.len(),
            "Registered owner"
        );

        Ok(Registration {
            owner_type,
            accepted,
            skipped,
        })
    }

    /// Apply the rejection policy to one refused candidate: `Err` aborts the
    /// registration, `Ok` records the skip.
    fn refuse(
        &self,
        owner_type: &'static str,
        err: RegistrationError,
        skipped: &mut Vec<RegistrationError>,
    ) -> Result<(), RegistrationError> {
        match self.config.rejection_policy {
            RejectionPolicy::AbortAll => {
                debug!(bus = %self.config.name, owner = owner_type, error = %err, "Registration aborted");
                Err(err)
            }
            RejectionPolicy::SkipInvalid => {
                warn!(bus = %self.config.name, owner = owner_type, error = %err, "Skipping invalid handler");
                skipped.push(err);
                Ok(())
            }
        }
    }

    /// Subscribe a free-standing closure to `T`. No naming or hierarchy
    /// checks apply; only a NaN priority is refused.
    pub fn subscribe<T, F>(&self, priority: f64, handler: F) -> Result<SubscriptionHandle, RegistrationError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let owner = type_name::<F>();
        self.subscribe_detached::<T, _>(priority, owner, move |event: &T| {
            handler(event);
            Ok(())
        })
    }

    /// Like [`subscribe`](Self::subscribe) for a handler that may fail.
    /// Returned errors go to the failure handler.
    pub fn try_subscribe<T, F>(&self, priority: f64, handler: F) -> Result<SubscriptionHandle, RegistrationError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_detached::<T, _>(priority, type_name::<F>(), handler)
    }

    fn subscribe_detached<T, F>(
        &self,
        priority: f64,
        owner: &'static str,
        handler: F,
    ) -> Result<SubscriptionHandle, RegistrationError>
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let priority = Priority::new(priority)?;
        let id = SubscriptionId::new();
        let target: Target = Arc::new(move |event: &dyn Any| -> anyhow::Result<Invocation> {
            handler(downcast::<T>(event)?).map(|()| Invocation::Delivered)
        });

        let record = SubscriberRecord::with_id(
            id,
            OwnerRef::detached(id, owner),
            EventType::raw::<T>(),
            owner,
            priority,
            Origin::Direct,
            target,
        );
        Ok(self.insert_direct(record))
    }

    /// Subscribe a closure on behalf of `owner`. The bus holds the owner
    /// weakly; [`unregister`](Self::unregister) removes the subscription
    /// along with any declarative ones.
    pub fn subscribe_owned<O, T, F>(
        &self,
        owner: &Arc<O>,
        priority: f64,
        handler: F,
    ) -> Result<SubscriptionHandle, RegistrationError>
    where
        O: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&O, &T) + Send + Sync + 'static,
    {
        let priority = Priority::new(priority)?;
        let weak = Arc::downgrade(owner);
        let target: Target = Arc::new(move |event: &dyn Any| -> anyhow::Result<Invocation> {
            let Some(owner) = weak.upgrade() else {
                return Ok(Invocation::OwnerDropped);
            };
            handler(&*owner, downcast::<T>(event)?);
            Ok(Invocation::Delivered)
        });

        let record = SubscriberRecord::new(
            OwnerRef::shared(owner),
            EventType::raw::<T>(),
            type_name::<F>(),
            priority,
            Origin::Direct,
            target,
        );
        Ok(self.insert_direct(record))
    }

    fn insert_direct(&self, record: SubscriberRecord) -> SubscriptionHandle {
        let handle = record.handle();
        let owner = record.owner().type_name();
        let priority = record.priority().value();
        let pruned = {
            let mut registry = self.registry.write();
            let pruned = self.prune_locked(&mut registry);
            registry.insert(Arc::new(record));
            pruned
        };
        self.settle_pruned(pruned);

        self.metrics.record_registrations(1);
        debug!(
            bus = %self.config.name,
            subscription = %handle.id(),
            event_type = handle.event().name(),
            owner,
            priority,
            "Subscribed"
        );
        handle
    }

    /// Remove every subscription owned by `owner`, across all event types.
    pub fn unregister<O: ?Sized>(&self, owner: &Arc<O>) -> usize {
        self.unregister_owner(OwnerId::of(owner))
    }

    /// Remove every subscription owned by the owner with this identity.
    pub fn unregister_owner(&self, owner: OwnerId) -> usize {
        let (retired, pruned) = {
            let mut registry = self.registry.write();
            let retired = registry.remove_by_owner(owner);
            (retired, self.prune_locked(&mut registry))
        };
        let removed = retired.len();
        drop(retired);
        self.settle_pruned(pruned);

        self.metrics.record_unregistrations(removed);
        debug!(bus = %self.config.name, ?owner, removed, "Unregistered owner");
        removed
    }

    /// Remove exactly the subscription identified by `handle`.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let (retired, pruned) = {
            let mut registry = self.registry.write();
            let retired = registry.remove_by_handle(handle.id());
            (retired, self.prune_locked(&mut registry))
        };
        let removed = retired.is_some();
        drop(retired);
        self.settle_pruned(pruned);

        if removed {
            self.metrics.record_unregistrations(1);
        }
        debug!(bus = %self.config.name, subscription = %handle.id(), removed, "Unsubscribed");
        removed
    }

    /// Deliver `event` to the subscribers of its exact type, in order.
    ///
    /// Never fails: an event with no subscribers is a no-op, and subscriber
    /// failures are routed to the failure handler.
    pub fn publish<E: Any + Send + Sync>(&self, event: &E) -> DispatchReport {
        let snapshot = self.registry.read().snapshot(TypeId::of::<E>());
        self.metrics.record_publish(snapshot.len());
        if snapshot.is_empty() {
            return DispatchReport::default();
        }
        self.dispatcher.dispatch(&snapshot, event)
    }

    /// Drop the records of owners that no longer exist.
    pub fn prune_dropped(&self) -> usize {
        let pruned = self.registry.write().prune_dropped();
        let removed = pruned.len();
        self.settle_pruned(pruned);
        removed
    }

    /// Subscriptions currently registered for `E`.
    #[must_use]
    pub fn subscriber_count<E: Any>(&self) -> usize {
        self.registry.read().slot_len(TypeId::of::<E>())
    }

    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.registry.read().len()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    fn prune_locked(&self, registry: &mut TypeRegistry) -> Vec<Arc<SubscriberRecord>> {
        if self.config.prune_dropped_owners {
            registry.prune_dropped()
        } else {
            Vec::new()
        }
    }

    /// Count and drop pruned records. Call with the registry lock released.
    fn settle_pruned(&self, pruned: Vec<Arc<SubscriberRecord>>) {
        let removed = pruned.len();
        drop(pruned);
        if removed > 0 {
            self.metrics.record_unregistrations(removed);
            debug!(bus = %self.config.name, removed, "Pruned dropped owners");
        }
    }
}

fn downcast<T: Any>(event: &dyn Any) -> anyhow::Result<&T> {
    event
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("event routed to subscriber of `{}`", type_name::<T>()))
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("registry", &*self.registry.read())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EventBus`].
#[derive(Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    on_failure: Option<FailureHandler>,
}

impl EventBusBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn default_priority(mut self, priority: f64) -> Self {
        self.config.default_priority = priority;
        self
    }

    #[must_use]
    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.config.rejection_policy = policy;
        self
    }

    #[must_use]
    pub fn prune_dropped_owners(mut self, enabled: bool) -> Self {
        self.config.prune_dropped_owners = enabled;
        self
    }

    #[must_use]
    pub fn trace_dispatch(mut self, enabled: bool) -> Self {
        self.config.trace_dispatch = enabled;
        self
    }

    /// Callback for subscriber failures. Defaults to
    /// [`log_failure`](crate::log_failure).
    #[must_use]
    pub fn on_failure<F>(mut self, handler: F) -> Self
    where
        F: Fn(&DispatchFailure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<EventBus, ConfigError> {
        self.config.validate()?;
        Ok(EventBus::assemble(self.config, self.on_failure))
    }
}

impl fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("config", &self.config)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}
