//! Authenticated session manager for storefront clients.
//!
//! This crate provides:
//! - Session state mirroring the credential store, observable via `watch`
//! - Request signing with the current access token
//! - Transparent refresh-and-replay on expired tokens, single-flight across
//!   concurrent calls
//! - Profile hydration and teardown with a session-ended event

pub mod client;
mod error;
pub mod events;
pub mod hydrator;
pub mod refresh;
pub mod request_fsm;
mod session;
pub mod session_fsm;
pub mod signer;
pub mod single_flight;
pub mod state;

pub use client::{decode_json, is_auth_expired, AuthorizedClient};
pub use error::{SessionError, SessionResult};
pub use events::{EndReason, SessionEvent, LOGIN_ROUTE};
pub use hydrator::PROFILE_PATH;
pub use refresh::{RefreshGrant, RefreshProtocolClient, TokenRefresher, REFRESH_PATH};
pub use request_fsm::{InFlightCall, RetryMarker};
pub use session::{SessionManager, LOGIN_PATH};
pub use session_fsm::SessionPhase;
pub use state::{SessionSnapshot, SessionState};
