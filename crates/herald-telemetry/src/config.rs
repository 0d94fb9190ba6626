//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for host-side logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name recorded on startup
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Extra `target=level` directives, e.g. `herald_bus=trace`
    pub targets: Vec<String>,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "herald".to_string(),
            log_level: "info".to_string(),
            targets: Vec::new(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HERALD_SERVICE_NAME`: Service name (default: herald)
    /// - `HERALD_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `HERALD_LOG_TARGETS`: Comma-separated `target=level` directives
    /// - `HERALD_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `HERALD_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("HERALD_SERVICE_NAME").unwrap_or_else(|| "herald".to_string()),

            log_level: lookup("HERALD_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            targets: lookup("HERALD_LOG_TARGETS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),

            console_output: lookup("HERALD_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("HERALD_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Full filter string: the base level followed by target directives.
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.log_level.as_str())
            .chain(self.targets.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}
