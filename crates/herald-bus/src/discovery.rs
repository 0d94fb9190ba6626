//! # Handler Discovery
//!
//! The contract through which an owner describes its candidate handlers to
//! [`EventBus::register`](crate::EventBus::register).
//!
//! The bus never introspects types itself. Each owner implements
//! [`Subscriber::discover`] and reports, per hierarchy layer, the handler
//! metadata the validator needs: name, declared parameter types, return shape,
//! receiver kind and priority, plus an already-bound invocation target.
//!
//! Rust has no inheritance, so a "base type" is an embedded value the owner
//! exposes through a projection. [`Discovery::inherit`] walks into it and
//! appends its layers after the owner's own, giving most-derived-to-base order.
//!
//! ```
//! use herald_bus::{Discovery, Event, Subscriber};
//!
//! struct ScoreEvent { points: u32 }
//! impl Event for ScoreEvent {}
//!
//! #[derive(Default)]
//! struct Scoreboard { total: std::sync::atomic::AtomicU32 }
//!
//! impl Subscriber for Scoreboard {
//!     fn discover(d: &mut Discovery<Self>) {
//!         d.handler("OnScoreEvent", 2.0, |board: &Scoreboard, e: &ScoreEvent| {
//!             board.total.fetch_add(e.points, std::sync::atomic::Ordering::Relaxed);
//!         });
//!     }
//! }
//! ```

use crate::events::{Event, EventType};
use std::any::{type_name, Any};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An entity whose handlers are found by declarative discovery.
pub trait Subscriber: Send + Sync + 'static {
    /// Report this type's candidate handlers (and any embedded base types).
    fn discover(discovery: &mut Discovery<Self>)
    where
        Self: Sized;
}

/// Declared return shape of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// Returns nothing.
    Unit,
    /// Returns a value of the named type.
    Value(&'static str),
}

/// Whether a handler needs an owning instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Bound to the owner (`&self`).
    Instance,
    /// Callable without an owner.
    Static,
}

pub(crate) type OwnerTarget<O> = Arc<dyn Fn(&O, &dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// Metadata and target of one discovered handler.
pub struct HandlerCandidate<O> {
    name: String,
    params: Vec<EventType>,
    returns: ReturnShape,
    receiver: Receiver,
    priority: Option<f64>,
    target: Option<OwnerTarget<O>>,
}

impl<O: 'static> HandlerCandidate<O> {
    /// Metadata only. Used by table-driven or generated collaborators; the
    /// candidate is rejected at registration unless a target is bound.
    #[must_use]
    pub fn describe(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnShape::Unit,
            receiver: Receiver::Instance,
            priority: None,
            target: None,
        }
    }

    /// An instance handler for event `E`.
    #[must_use]
    pub fn method<E, F>(name: impl Into<String>, handler: F) -> Self
    where
        E: Event,
        F: Fn(&O, &E) + Send + Sync + 'static,
    {
        Self::fallible(name, move |owner: &O, event: &E| {
            handler(owner, event);
            Ok(())
        })
    }

    /// An instance handler for event `E` that may fail.
    #[must_use]
    pub fn fallible<E, F>(name: impl Into<String>, handler: F) -> Self
    where
        E: Event,
        F: Fn(&O, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let target: OwnerTarget<O> = Arc::new(move |owner: &O, event: &dyn Any| -> anyhow::Result<()> {
            let event = event.downcast_ref::<E>().ok_or_else(|| {
                anyhow::anyhow!("event routed to handler for `{}`", type_name::<E>())
            })?;
            handler(owner, event)
        });

        Self {
            name: name.into(),
            params: vec![EventType::of::<E>()],
            returns: ReturnShape::Unit,
            receiver: Receiver::Instance,
            priority: None,
            target: Some(target),
        }
    }

    #[must_use]
    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Append a declared parameter type.
    #[must_use]
    pub fn param(mut self, param: EventType) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn returns(mut self, returns: ReturnShape) -> Self {
        self.returns = returns;
        self
    }

    #[must_use]
    pub fn receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    /// Re-home this candidate onto an owner that embeds `O`.
    fn project<P: 'static>(self, project: fn(&P) -> &O) -> HandlerCandidate<P> {
        let target = self.target.map(|inner| -> OwnerTarget<P> {
            Arc::new(move |owner: &P, event: &dyn Any| inner(project(owner), event))
        });

        HandlerCandidate {
            name: self.name,
            params: self.params,
            returns: self.returns,
            receiver: self.receiver,
            priority: self.priority,
            target,
        }
    }
}

impl<O> HandlerCandidate<O> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[EventType] {
        &self.params
    }

    #[must_use]
    pub fn return_shape(&self) -> ReturnShape {
        self.returns
    }

    #[must_use]
    pub fn receiver_kind(&self) -> Receiver {
        self.receiver
    }

    /// Priority declared by the collaborator, if any.
    #[must_use]
    pub fn declared_priority(&self) -> Option<f64> {
        self.priority
    }

    pub(crate) fn target(&self) -> Option<&OwnerTarget<O>> {
        self.target.as_ref()
    }
}

impl<O> fmt::Debug for HandlerCandidate<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCandidate")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("receiver", &self.receiver)
            .field("priority", &self.priority)
            .field("bound", &self.target.is_some())
            .finish()
    }
}

/// Candidates declared by one type of an owner's hierarchy.
pub struct Layer<O> {
    type_name: &'static str,
    candidates: Vec<HandlerCandidate<O>>,
}

impl<O> Layer<O> {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn candidates(&self) -> &[HandlerCandidate<O>] {
        &self.candidates
    }
}

/// Collector passed to [`Subscriber::discover`].
pub struct Discovery<O> {
    own: Vec<HandlerCandidate<O>>,
    bases: Vec<Layer<O>>,
}

impl<O: Subscriber> Discovery<O> {
    /// Run discovery for `O` and return its layers, most-derived first.
    #[must_use]
    pub fn scan() -> Vec<Layer<O>> {
        let mut discovery = Self {
            own: Vec::new(),
            bases: Vec::new(),
        };
        O::discover(&mut discovery);

        let mut layers = Vec::with_capacity(discovery.bases.len() + 1);
        layers.push(Layer {
            type_name: type_name::<O>(),
            candidates: discovery.own,
        });
        layers.extend(discovery.bases);
        layers
    }

    /// Declare an instance handler for `E` with an explicit priority.
    pub fn handler<E, F>(&mut self, name: impl Into<String>, priority: f64, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(&O, &E) + Send + Sync + 'static,
    {
        self.candidate(HandlerCandidate::method(name, handler).priority(priority))
    }

    /// Declare a fallible instance handler for `E` with an explicit priority.
    pub fn fallible_handler<E, F>(
        &mut self,
        name: impl Into<String>,
        priority: f64,
        handler: F,
    ) -> &mut Self
    where
        E: Event,
        F: Fn(&O, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.candidate(HandlerCandidate::fallible(name, handler).priority(priority))
    }

    /// Declare an arbitrary candidate.
    pub fn candidate(&mut self, candidate: HandlerCandidate<O>) -> &mut Self {
        self.own.push(candidate);
        self
    }

    /// Walk into an embedded base type; its layers follow this one's.
    pub fn inherit<B: Subscriber>(&mut self, project: fn(&O) -> &B) -> &mut Self {
        for layer in Discovery::<B>::scan() {
            self.bases.push(Layer {
                type_name: layer.type_name,
                candidates: layer
                    .candidates
                    .into_iter()
                    .map(|candidate| candidate.project(project))
                    .collect(),
            });
        }
        self
    }
}

/// Flatten layers in order, dropping base candidates overridden by name in a
/// more-derived layer. Returns the kept candidates and the shadowed names.
pub(crate) fn flatten<O>(layers: Vec<Layer<O>>) -> (Vec<HandlerCandidate<O>>, Vec<String>) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    let mut shadowed = Vec::new();

    for layer in layers {
        let mut declared_here = Vec::with_capacity(layer.candidates.len());
        for candidate in layer.candidates {
            if seen.contains(&candidate.name) {
                shadowed.push(format!("{}::{}", layer.type_name, candidate.name));
                continue;
            }
            declared_here.push(candidate.name.clone());
            kept.push(candidate);
        }
        seen.extend(declared_here);
    }

    (kept, shadowed)
}
