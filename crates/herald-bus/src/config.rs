//! Bus configuration and validation
//!
//! # Example
//!
//! ```
//! use herald_bus::{BusConfig, RejectionPolicy};
//!
//! let config = BusConfig::builder()
//!     .name("hud")
//!     .default_priority(1.0)
//!     .rejection_policy(RejectionPolicy::SkipInvalid)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.name, "hud");
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// What `register` does when one of an owner's candidates is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Fail the whole registration; nothing from the owner is inserted.
    #[default]
    AbortAll,
    /// Insert the valid candidates and report the rejected ones.
    SkipInvalid,
}

impl std::str::FromStr for RejectionPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort_all" => Ok(Self::AbortAll),
            "skip" | "skip_invalid" => Ok(Self::SkipInvalid),
            _ => Err(ConfigError::InvalidEnv {
                key: "HERALD_REJECTION_POLICY",
                value: value.to_string(),
            }),
        }
    }
}

/// Event bus configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name attached to every log line as the `bus` field
    pub name: String,
    /// Priority for declarative handlers that declare none
    pub default_priority: f64,
    /// Behaviour when a discovered candidate is rejected
    pub rejection_policy: RejectionPolicy,
    /// Drop records of dead owners on every registry mutation
    pub prune_dropped_owners: bool,
    /// Emit a trace event per handler invocation
    pub trace_dispatch: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "herald".to_string(),
            default_priority: 0.0,
            rejection_policy: RejectionPolicy::AbortAll,
            prune_dropped_owners: true,
            trace_dispatch: false,
        }
    }
}

impl BusConfig {
    #[must_use]
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::new()
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HERALD_BUS_NAME`: Bus name (default: herald)
    /// - `HERALD_DEFAULT_PRIORITY`: Default handler priority (default: 0)
    /// - `HERALD_REJECTION_POLICY`: `abort` or `skip` (default: abort)
    /// - `HERALD_PRUNE_DROPPED`: Prune dead owners on mutation (default: true)
    /// - `HERALD_TRACE_DISPATCH`: Trace every invocation (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_priority = match lookup("HERALD_DEFAULT_PRIORITY") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: "HERALD_DEFAULT_PRIORITY",
                value: raw.clone(),
            })?,
            None => defaults.default_priority,
        };

        let rejection_policy = match lookup("HERALD_REJECTION_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.rejection_policy,
        };

        let config = Self {
            name: lookup("HERALD_BUS_NAME").unwrap_or(defaults.name),
            default_priority,
            rejection_policy,
            prune_dropped_owners: parse_flag(&lookup, "HERALD_PRUNE_DROPPED")?
                .unwrap_or(defaults.prune_dropped_owners),
            trace_dispatch: parse_flag(&lookup, "HERALD_TRACE_DISPATCH")?
                .unwrap_or(defaults.trace_dispatch),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !self.default_priority.is_finite() {
            return Err(ConfigError::InvalidDefaultPriority(self.default_priority));
        }
        Ok(())
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidEnv { key, value: raw }),
    }
}

/// Fluent builder for [`BusConfig`]; `build` validates.
#[derive(Debug, Default)]
pub struct BusConfigBuilder {
    config: BusConfig,
}

impl BusConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    pub fn build(self) -> Result<BusConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
