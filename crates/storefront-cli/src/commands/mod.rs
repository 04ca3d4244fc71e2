//! CLI command implementations.

mod auth;
mod request;

pub use auth::{login, logout, status, whoami};
pub use request::get;

use crate::output::{self, OutputFormat};
use anyhow::Result;
use credential_store::open_credential_store;
use session_auth::{SessionError, SessionEvent, SessionManager};
use storefront_config::{Config, Paths};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

/// Open the durable credential store and restore the session from it.
pub fn open_session(paths: &Paths, config: &Config) -> Result<SessionManager> {
    paths.ensure_dirs()?;
    let store = open_credential_store(&paths.credentials_file())?;
    let manager = SessionManager::new(store, config.api_base_url()?)?;
    Ok(manager)
}

/// Follow session events and "navigate" when the session ends.
///
/// The task finishes once the session manager is dropped.
pub fn spawn_navigator(
    mut events: broadcast::Receiver<SessionEvent>,
    format: OutputFormat,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Ended {
                    reason,
                    redirect_to,
                }) => navigate(reason.as_str(), &redirect_to, &format),
                Ok(event) => debug!(event = ?event, "Session event"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Session events dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn navigate(reason: &str, redirect_to: &str, format: &OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("Session ended ({}). Redirecting to {}", reason, redirect_to);
            println!("Run 'storefront login' to sign in again.");
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "event": "session_ended",
            "reason": reason,
            "redirect_to": redirect_to,
        })),
    }
}

/// User-facing message for a session error.
fn describe(error: &SessionError) -> String {
    if error.is_session_expired() {
        "Session expired. Please log in again.".to_string()
    } else {
        error.to_string()
    }
}
