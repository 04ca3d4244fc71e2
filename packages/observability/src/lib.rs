//! # Observability
//!
//! Centralized logging layer for storefront clients.
//!
//! Services are **log producers**: they call `observability::init()` once at
//! startup and use standard `tracing` macros everywhere else. Where the logs
//! go is decided here.
//!
//! All services write structured JSONL to a single central file,
//! `~/.storefront/logs/dev.jsonl`, which makes
//! `tail -f ~/.storefront/logs/dev.jsonl | jq` the default way to watch a
//! session refresh happen. Multi-process safety comes from append-only writes
//! flushed per line.
//!
//! Fields whose names look like credentials (`access_token`, `password`,
//! `authorization`, ...) are redacted before they reach the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "storefront".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("service started");
//! }
//! ```

mod dev;
mod json_layer;

pub use json_layer::{is_sensitive_field, LogEntry, REDACTED};

use std::path::PathBuf;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "storefront", "admin").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.storefront/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the observability layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Calling this more than once is harmless; only the first call installs a
/// subscriber.
pub fn init_with_config(config: LogConfig) {
    dev::init_dev_subscriber(&config);
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
