//! Configuration, paths, and logging bootstrap for storefront clients.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging_for_service, parse_level};
pub use paths::Paths;
