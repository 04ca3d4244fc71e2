//! Session events.
//!
//! The session crate never navigates. When a session ends it publishes
//! [`SessionEvent::Ended`] and the presentation layer decides what to show.

use credential_store::Identity;
use serde::Serialize;

/// Unauthenticated entry point the application returns to when a session ends.
pub const LOGIN_ROUTE: &str = "/login";

/// Capacity of the session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The user logged out.
    Logout,
    /// The refresh endpoint rejected the refresh token or was unreachable.
    RefreshDenied,
    /// The access token expired and there was no refresh token to exchange.
    NoRefreshToken,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Logout => "logout",
            EndReason::RefreshDenied => "refresh_denied",
            EndReason::NoRefreshToken => "no_refresh_token",
        }
    }
}

/// Event published on every session mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { user: Identity },
    TokenRefreshed,
    IdentityUpdated { user: Identity },
    Ended { reason: EndReason, redirect_to: String },
}

impl SessionEvent {
    pub(crate) fn ended(reason: EndReason) -> Self {
        SessionEvent::Ended {
            reason,
            redirect_to: LOGIN_ROUTE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ended_redirects_to_login() {
        let event = SessionEvent::ended(EndReason::RefreshDenied);
        assert_eq!(
            event,
            SessionEvent::Ended {
                reason: EndReason::RefreshDenied,
                redirect_to: "/login".to_string(),
            }
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(SessionEvent::ended(EndReason::Logout)).unwrap();
        assert_eq!(json["type"], "ended");
        assert_eq!(json["reason"], "logout");
        assert_eq!(json["redirect_to"], "/login");

        let json = serde_json::to_value(SessionEvent::TokenRefreshed).unwrap();
        assert_eq!(json["type"], "token_refreshed");
    }
}
