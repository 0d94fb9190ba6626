//! # Registration Validator
//!
//! Structural contract a discovered handler must satisfy before it may enter
//! the registry. Runs once per candidate at registration time, never while
//! publishing. Direct closure subscriptions bypass it entirely.
//!
//! Rules, in evaluation order:
//!
//! 1. Return shape is unit.
//! 2. Exactly one parameter (the event).
//! 3. Bound to an owning instance.
//! 4. Parameter is not a primitive.
//! 5. Parameter is neither abstract nor an interface.
//! 6. Name is `"On"` followed by the event's simple name.
//! 7. Priority is a number.
//! 8. A target is bound.
//!
//! Supertype exclusivity depends on registry state and is checked separately
//! by [`RegistrationValidator::check_exclusive`].

use crate::discovery::{HandlerCandidate, OwnerTarget, Receiver, ReturnShape};
use crate::error::Rejection;
use crate::events::{EventType, Lineage, TypeKind};
use crate::subscriber::Priority;

/// Prefix every declarative handler name carries.
pub const HANDLER_PREFIX: &str = "On";

/// A candidate that passed the structural rules.
pub(crate) struct Accepted<O> {
    pub(crate) name: String,
    pub(crate) event: EventType,
    pub(crate) priority: Priority,
    pub(crate) target: OwnerTarget<O>,
}

/// Stateless checker for declarative handler candidates.
#[derive(Debug, Clone)]
pub struct RegistrationValidator {
    default_priority: f64,
}

impl RegistrationValidator {
    /// `default_priority` applies to candidates that declare none.
    #[must_use]
    pub fn new(default_priority: f64) -> Self {
        Self { default_priority }
    }

    /// Expected handler name for an event type.
    #[must_use]
    pub fn expected_name(event: &EventType) -> String {
        format!("{HANDLER_PREFIX}{}", event.simple_name())
    }

    /// Check every structural rule; the first violation wins.
    pub fn validate<O>(&self, candidate: &HandlerCandidate<O>) -> Result<(), Rejection> {
        self.accept(candidate).map(|_| ())
    }

    pub(crate) fn accept<O>(&self, candidate: &HandlerCandidate<O>) -> Result<Accepted<O>, Rejection> {
        if let ReturnShape::Value(returns) = candidate.return_shape() {
            return Err(Rejection::ReturnsValue { returns });
        }

        let event = match candidate.params() {
            [event] => *event,
            params => return Err(Rejection::WrongArity { count: params.len() }),
        };

        if candidate.receiver_kind() == Receiver::Static {
            return Err(Rejection::StaticHandler);
        }

        match event.kind() {
            TypeKind::Concrete => {}
            TypeKind::Primitive => {
                return Err(Rejection::PrimitiveArgument {
                    type_name: event.name(),
                })
            }
            TypeKind::Interface | TypeKind::Abstract => {
                return Err(Rejection::AbstractArgument {
                    type_name: event.name(),
                })
            }
        }

        let expected = Self::expected_name(&event);
        if candidate.name() != expected {
            return Err(Rejection::NameMismatch {
                expected,
                found: candidate.name().to_string(),
            });
        }

        let value = candidate.declared_priority().unwrap_or(self.default_priority);
        let priority = Priority::new(value).map_err(|_| Rejection::InvalidPriority { value })?;

        let target = candidate.target().cloned().ok_or(Rejection::MissingTarget)?;

        Ok(Accepted {
            name: candidate.name().to_string(),
            event,
            priority,
            target,
        })
    }

    /// Supertype exclusivity: `candidate` may not be a strict subtype or
    /// strict supertype of any event type already held by declarative
    /// subscriptions. Unrelated types and the same type are fine.
    pub fn check_exclusive<'a>(
        candidate: &Lineage,
        held: impl IntoIterator<Item = &'a Lineage>,
    ) -> Result<(), Rejection> {
        let event = candidate.event();
        for other in held {
            if candidate.descends_from(other) {
                return Err(Rejection::SupertypeRegistered {
                    event: event.name(),
                    supertype: other.event().name(),
                });
            }
            if other.descends_from(candidate) {
                return Err(Rejection::SubtypeRegistered {
                    event: event.name(),
                    subtype: other.event().name(),
                });
            }
        }
        Ok(())
    }
}

impl Default for RegistrationValidator {
    fn default() -> Self {
        Self::new(Priority::DEFAULT.value())
    }
}
