//! # Event Types
//!
//! Identity and hierarchy metadata for the payloads routed through the bus.
//!
//! Routing only needs a `TypeId`: direct subscriptions and `publish` accept any
//! `T: Any + Send + Sync`. Declarative registration additionally inspects the
//! event's supertype chain, which is supplied through the [`Event`] trait.

use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A payload type that can be targeted by declarative handlers.
///
/// Most events keep the default (no supertype). An event that refines another
/// one names its direct supertype:
///
/// ```
/// use herald_bus::{Event, EventType};
///
/// struct ScoreEvent { points: u32 }
/// impl Event for ScoreEvent {}
///
/// struct BonusScoreEvent { multiplier: u32 }
/// impl Event for BonusScoreEvent {
///     fn supertype() -> Option<EventType> {
///         Some(EventType::of::<ScoreEvent>())
///     }
/// }
///
/// let bonus = EventType::of::<BonusScoreEvent>();
/// assert!(bonus.is_subtype_of(&EventType::of::<ScoreEvent>()));
/// ```
pub trait Event: Any + Send + Sync {
    /// Direct supertype of this event, if it refines another event type.
    fn supertype() -> Option<EventType>
    where
        Self: Sized,
    {
        None
    }
}

/// Structural category of a type, as seen by the registration validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// A concrete, structured payload type.
    Concrete,
    /// A scalar such as an integer, float, bool or char.
    Primitive,
    /// A trait object (`dyn Trait`).
    Interface,
    /// A type the discovery collaborator declares as abstract.
    Abstract,
}

/// Runtime descriptor of an event type.
///
/// Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    supertype: fn() -> Option<EventType>,
}

fn no_supertype() -> Option<EventType> {
    None
}

impl EventType {
    /// Descriptor for a declared event type, including its hierarchy.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: type_name::<E>(),
            kind: TypeKind::Concrete,
            supertype: <E as Event>::supertype,
        }
    }

    /// Descriptor for an arbitrary type with no hierarchy information.
    ///
    /// Scalars are classified as [`TypeKind::Primitive`] and trait objects as
    /// [`TypeKind::Interface`]; everything else is [`TypeKind::Concrete`].
    #[must_use]
    pub fn raw<T: ?Sized + 'static>() -> Self {
        let id = TypeId::of::<T>();
        let name = type_name::<T>();
        let kind = if is_primitive(id) {
            TypeKind::Primitive
        } else if name.starts_with("dyn ") {
            TypeKind::Interface
        } else {
            TypeKind::Concrete
        };

        Self {
            id,
            name,
            kind,
            supertype: no_supertype,
        }
    }

    /// Override the structural kind (e.g. to mark a type abstract).
    #[must_use]
    pub fn with_kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    /// The routing key.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path, `dyn` prefix or generic arguments.
    #[must_use]
    pub fn simple_name(&self) -> &'static str {
        simple_name(self.name)
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Direct supertype, if any.
    #[must_use]
    pub fn supertype(&self) -> Option<EventType> {
        (self.supertype)()
    }

    /// Iterate over the strict ancestors, nearest first.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.supertype(),
            // Guards against a malformed cyclic `supertype` chain.
            remaining: MAX_HIERARCHY_DEPTH,
        }
    }

    /// Whether `self` is a strict subtype of `other`.
    #[must_use]
    pub fn is_subtype_of(&self, other: &EventType) -> bool {
        self.ancestors().any(|ancestor| ancestor.id == other.id)
    }

    /// Whether the two types are related by strict sub/supertyping.
    #[must_use]
    pub fn is_related_to(&self, other: &EventType) -> bool {
        self.is_subtype_of(other) || other.is_subtype_of(self)
    }

    /// Resolve the supertype chain once. Comparisons between lineages run no
    /// `supertype` fns, so they are safe under the registry lock.
    #[must_use]
    pub fn lineage(&self) -> Lineage {
        Lineage {
            event: *self,
            ancestors: self.ancestors().map(|ancestor| ancestor.id).collect(),
        }
    }
}

/// An event type with its ancestor chain already resolved.
#[derive(Debug, Clone)]
pub struct Lineage {
    event: EventType,
    ancestors: Vec<TypeId>,
}

impl Lineage {
    #[must_use]
    pub fn event(&self) -> EventType {
        self.event
    }

    /// Whether this type is a strict subtype of `other`.
    #[must_use]
    pub fn descends_from(&self, other: &Lineage) -> bool {
        self.ancestors.contains(&other.event.id)
    }
}

/// Maximum supertype chain length that is followed.
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Iterator over an event type's supertype chain.
pub struct Ancestors {
    next: Option<EventType>,
    remaining: usize,
}

impl Iterator for Ancestors {
    type Item = EventType;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next.take()?;
        self.next = current.supertype();
        Some(current)
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn simple_name(full: &'static str) -> &'static str {
    let trimmed = full.strip_prefix("dyn ").unwrap_or(full);
    let base = match trimmed.find('<') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    base.rsplit("::").next().unwrap_or(base)
}

fn is_primitive(id: TypeId) -> bool {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<()>(),
        TypeId::of::<str>(),
        TypeId::of::<&'static str>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
    ]
    .contains(&id)
}
