//! Error types for the event bus

use thiserror::Error;

/// Why a discovered handler candidate was refused.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Rejection {
    #[error("handler must not return a value (returns `{returns}`)")]
    ReturnsValue { returns: &'static str },

    #[error("handler must take exactly one event argument, found {count}")]
    WrongArity { count: usize },

    #[error("handler must be bound to an owning instance")]
    StaticHandler,

    #[error("event argument `{type_name}` is a primitive; events must be structured types")]
    PrimitiveArgument { type_name: &'static str },

    #[error("event argument `{type_name}` is abstract or an interface")]
    AbstractArgument { type_name: &'static str },

    #[error("handler name `{found}` does not match convention `{expected}`")]
    NameMismatch { expected: String, found: String },

    #[error("`{event}` is a subtype of already registered `{supertype}`")]
    SupertypeRegistered {
        event: &'static str,
        supertype: &'static str,
    },

    #[error("`{event}` is a supertype of already registered `{subtype}`")]
    SubtypeRegistered {
        event: &'static str,
        subtype: &'static str,
    },

    #[error("priority {value} is not a number")]
    InvalidPriority { value: f64 },

    #[error("handler has no invocation target")]
    MissingTarget,
}

/// Errors surfaced synchronously by registration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrationError {
    /// A declarative candidate violated the handler contract.
    #[error("handler `{handler}` on `{owner}` rejected: {reason}")]
    Rejected {
        owner: &'static str,
        handler: String,
        reason: Rejection,
    },

    /// A direct subscription supplied a NaN priority.
    #[error("invalid priority: {value}")]
    InvalidPriority { value: f64 },
}

impl RegistrationError {
    pub(crate) fn rejected(owner: &'static str, handler: impl Into<String>, reason: Rejection) -> Self {
        Self::Rejected {
            owner,
            handler: handler.into(),
            reason,
        }
    }

    /// The rule that was violated, for declarative rejections.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected { reason, .. } => Some(reason),
            Self::InvalidPriority { .. } => None,
        }
    }
}

/// Errors from bus configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("bus name cannot be empty")]
    EmptyName,

    #[error("default priority must be finite, got {0}")]
    InvalidDefaultPriority(f64),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}
