//! Single-flight refresh.
//!
//! The first caller that needs a refresh starts one and parks it in the gate;
//! every caller that arrives while it is pending awaits the same future. The
//! future clears the gate itself once the grant is committed, so a call that
//! arrives afterwards sees the new token instead of joining a finished refresh.

use crate::events::EndReason;
use crate::refresh::TokenRefresher;
use crate::state::{RefreshCommit, SessionState};
use crate::SessionError;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a refresh cycle did not produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// No refresh token was stored. The session has been torn down.
    NoRefreshToken,
    /// The exchange failed. The session has been torn down.
    Denied(String),
    /// The session was ended or replaced while the refresh was in flight.
    Superseded,
    /// The grant could not be persisted.
    Storage(String),
}

impl From<RefreshFailure> for SessionError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::NoRefreshToken => {
                SessionError::SessionExpired("no refresh token available".to_string())
            }
            RefreshFailure::Denied(detail) => SessionError::SessionExpired(detail),
            RefreshFailure::Superseded => {
                SessionError::SessionExpired("session ended during refresh".to_string())
            }
            RefreshFailure::Storage(detail) => {
                SessionError::Storage(credential_store::StorageError::Backend(detail))
            }
        }
    }
}

type RefreshResult = Result<String, RefreshFailure>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Holds the refresh currently in flight, if any.
#[derive(Clone, Default)]
pub struct RefreshGate {
    pending: Arc<Mutex<Option<PendingRefresh>>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh is currently in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Join the pending refresh, or start one. Resolves to the access token
    /// every caller should retry with.
    pub async fn refresh(
        &self,
        state: &Arc<SessionState>,
        refresher: &Arc<dyn TokenRefresher>,
    ) -> RefreshResult {
        let pending = {
            let mut slot = self.pending.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining refresh already in flight");
                    pending.clone()
                }
                None => {
                    let pending = run_refresh(
                        Arc::clone(state),
                        Arc::clone(refresher),
                        Arc::clone(&self.pending),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }
}

async fn run_refresh(
    state: Arc<SessionState>,
    refresher: Arc<dyn TokenRefresher>,
    slot: Arc<Mutex<Option<PendingRefresh>>>,
) -> RefreshResult {
    let result = exchange(&state, refresher.as_ref()).await;
    slot.lock().take();
    result
}

async fn exchange(state: &SessionState, refresher: &dyn TokenRefresher) -> RefreshResult {
    let refresh_token = match state.refresh_token() {
        Ok(Some(token)) => token,
        Ok(None) => {
            warn!("Access token rejected and no refresh token stored");
            state.teardown(EndReason::NoRefreshToken);
            return Err(RefreshFailure::NoRefreshToken);
        }
        Err(e) => {
            warn!(error = %e, "Could not read refresh token");
            state.teardown(EndReason::RefreshDenied);
            return Err(RefreshFailure::Denied(e.to_string()));
        }
    };

    state.begin_refresh();

    let grant = match refresher.refresh(&refresh_token).await {
        Ok(grant) => grant,
        Err(e) => {
            warn!(error = %e, "Token refresh denied, ending session");
            return if state.teardown_if_current(&refresh_token, EndReason::RefreshDenied) {
                Err(RefreshFailure::Denied(e.to_string()))
            } else {
                Err(RefreshFailure::Superseded)
            };
        }
    };

    match state.complete_refresh(&refresh_token, &grant) {
        Ok(RefreshCommit::Applied(token)) => Ok(token),
        Ok(RefreshCommit::Superseded(Some(current))) => Ok(current),
        Ok(RefreshCommit::Superseded(None)) => Err(RefreshFailure::Superseded),
        Err(e) => {
            warn!(error = %e, "Failed to store refreshed access token");
            Err(RefreshFailure::Storage(e.to_string()))
        }
    }
}
