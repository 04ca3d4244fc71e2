//! Session error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No response was received
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The session ended because the access token could not be renewed.
    /// Carries the refresh failure detail.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// The refresh endpoint rejected the refresh token, or could not be reached
    #[error("Token refresh denied: {0}")]
    RefreshDenied(String),

    /// Login rejected by the server
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Operation needs a session and there is none
    #[error("Not logged in")]
    NotLoggedIn,

    /// Non-success response surfaced by the JSON helpers
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Credential store error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_store::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid transition in one of the session state machines
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The request body is a stream and cannot be sent a second time
    #[error("Request cannot be replayed after token refresh")]
    RequestNotReplayable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Returns true if the session is gone and the user has to log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            SessionError::SessionExpired(_) | SessionError::RefreshDenied(_)
        )
    }

    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Connection failures and timeouts
    /// - 5xx responses
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::Transport(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            SessionError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
