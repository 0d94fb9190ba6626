//! # Subscriber Records
//!
//! Immutable descriptions of registered listeners, plus the opaque handle
//! returned to direct-mode callers.

use crate::events::{EventType, Lineage};
use crate::error::RegistrationError;
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Outcome of a successful invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// The handler ran.
    Delivered,
    /// The owning entity has been dropped; nothing ran.
    OwnerDropped,
}

/// Pre-resolved callable stored in a record.
pub(crate) type Target = Arc<dyn Fn(&dyn Any) -> anyhow::Result<Invocation> + Send + Sync>;

/// Unique identifier of one subscription. Serializes as its UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a registering entity: the address of its `Arc` allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
    /// Identity of a shared owner.
    #[must_use]
    pub fn of<O: ?Sized>(owner: &Arc<O>) -> Self {
        Self(Arc::as_ptr(owner) as *const () as usize)
    }
}

/// Opaque reference to the entity that owns a subscription.
///
/// The registry never keeps an owner alive; it only holds a `Weak` to it.
#[derive(Clone)]
pub struct OwnerRef {
    id: OwnerId,
    type_name: &'static str,
    short_name: String,
    alive: Option<Weak<dyn Any + Send + Sync>>,
}

impl OwnerRef {
    pub(crate) fn shared<O: Any + Send + Sync>(owner: &Arc<O>) -> Self {
        let weak: Weak<O> = Arc::downgrade(owner);
        let alive: Weak<dyn Any + Send + Sync> = weak;
        Self {
            id: OwnerId::of(owner),
            type_name: type_name::<O>(),
            short_name: short_type_name(type_name::<O>()),
            alive: Some(alive),
        }
    }

    /// Owner of a free-standing closure, named after the closure's type.
    pub(crate) fn detached(id: SubscriptionId, type_name: &'static str) -> Self {
        // `Arc` data pointers sit behind two counters and are always even.
        let bytes = id.0.as_u128();
        Self {
            id: OwnerId((bytes as usize) | 1),
            type_name,
            short_name: short_type_name(type_name),
            alive: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Fully qualified owner type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Owner type name without module paths; the tie-break key. Moving a
    /// type to another module does not change where it dispatches.
    #[must_use]
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// False once a shared owner has been dropped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match &self.alive {
            Some(weak) => weak.strong_count() > 0,
            None => true,
        }
    }
}

/// Strip the module path from every segment of a type name, keeping generic
/// arguments: `app::hud::Panel<core::Score>` becomes `Panel<Score>`.
fn short_type_name(full: &str) -> String {
    let mut short = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || matches!(c, '_' | '{' | '}') {
            segment.push(c);
        } else {
            short.push_str(&segment);
            segment.clear();
            short.push(c);
        }
    }
    short.push_str(&segment);
    short
}

impl fmt::Debug for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRef")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Dispatch priority. Higher values are notified first.
///
/// NaN is rejected; `-0.0` is stored as `0.0` so the two compare equal, as
/// they do under IEEE comparison. No epsilon is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Priority(f64);

impl Priority {
    pub const DEFAULT: Priority = Priority(0.0);

    /// Validate a raw priority value.
    pub fn new(value: f64) -> Result<Self, RegistrationError> {
        if value.is_nan() {
            return Err(RegistrationError::InvalidPriority { value });
        }
        Ok(Self(if value == 0.0 { 0.0 } else { value }))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        // NaN is excluded at construction.
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

impl TryFrom<f64> for Priority {
    type Error = RegistrationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// How a record entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Derived from a discovery scan; subject to supertype exclusivity.
    Declarative,
    /// Registered directly as a closure.
    Direct,
}

/// One registered listener for one event type.
pub struct SubscriberRecord {
    id: SubscriptionId,
    owner: OwnerRef,
    lineage: Lineage,
    handler: String,
    priority: Priority,
    origin: Origin,
    target: Target,
}

impl SubscriberRecord {
    pub(crate) fn new(
        owner: OwnerRef,
        event: EventType,
        handler: impl Into<String>,
        priority: Priority,
        origin: Origin,
        target: Target,
    ) -> Self {
        Self::with_id(SubscriptionId::new(), owner, event, handler, priority, origin, target)
    }

    pub(crate) fn with_id(
        id: SubscriptionId,
        owner: OwnerRef,
        event: EventType,
        handler: impl Into<String>,
        priority: Priority,
        origin: Origin,
        target: Target,
    ) -> Self {
        Self {
            id,
            owner,
            lineage: event.lineage(),
            handler: handler.into(),
            priority,
            origin,
            target,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    #[must_use]
    pub fn event(&self) -> EventType {
        self.lineage.event()
    }

    /// Event type with its supertype chain, resolved at construction.
    #[must_use]
    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Dispatch order: priority descending, then short owner type name
    /// ascending. Records equal on both compare equal.
    #[must_use]
    pub fn dispatch_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.owner.short_name.cmp(&other.owner.short_name))
    }

    pub(crate) fn invoke(&self, event: &dyn Any) -> anyhow::Result<Invocation> {
        (self.target)(event)
    }

    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id,
            event: self.event(),
        }
    }
}

impl fmt::Debug for SubscriberRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRecord")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("event", &self.event())
            .field("handler", &self.handler)
            .field("priority", &self.priority)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Opaque token identifying one subscription, usable with
/// [`EventBus::unsubscribe`](crate::EventBus::unsubscribe).
#[must_use = "dropping the handle makes precise unsubscription impossible"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    event: EventType,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event type the subscription listens to.
    #[must_use]
    pub fn event(&self) -> EventType {
        self.event
    }
}
