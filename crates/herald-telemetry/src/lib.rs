//! # Herald Telemetry
//!
//! Host-side logging for applications built on `herald-bus`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use herald_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("Failed to init logging");
//!
//!     // Bus events now render through tracing-subscriber
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HERALD_LOG_LEVEL` / `RUST_LOG` | `info` | Base log level |
//! | `HERALD_LOG_TARGETS` | empty | Extra `target=level` directives |
//! | `HERALD_JSON_LOGS` | `false` | JSON output |
//! | `HERALD_CONSOLE_OUTPUT` | `true` | Console output |
//! | `HERALD_SERVICE_NAME` | `herald` | Service name |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter `{directives}`: {reason}")]
    Filter { directives: String, reason: String },

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Span for one bus instance; events emitted inside it inherit the name.
///
/// # Example
///
/// ```rust,ignore
/// let _span = herald_telemetry::bus_span!("hud", frame = 42).entered();
/// bus.publish(&ScoreEvent { points: 10 });
/// ```
#[macro_export]
macro_rules! bus_span {
    ($bus:expr) => {
        tracing::info_span!("bus", bus = %$bus)
    };
    ($bus:expr, $($field:tt)*) => {
        tracing::info_span!("bus", bus = %$bus, $($field)*)
    };
}
