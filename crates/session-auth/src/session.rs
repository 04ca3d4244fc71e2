//! Session manager facade.
//!
//! This is the only surface collaborators use: identity and loading status,
//! login, logout, profile refresh, and an [`AuthorizedClient`] for every call
//! that should carry the credential.

use crate::client::AuthorizedClient;
use crate::events::{EndReason, SessionEvent};
use crate::refresh::{RefreshProtocolClient, TokenRefresher};
use crate::session_fsm::SessionPhase;
use crate::state::{SessionSnapshot, SessionState};
use crate::{hydrator, SessionError, SessionResult};
use credential_store::{CredentialPair, CredentialStore, Identity};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use url::Url;

/// Path of the login endpoint, relative to the API base URL.
pub const LOGIN_PATH: &str = "/api/login";

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: Identity,
    access_token: String,
    refresh_token: String,
}

/// Session manager.
pub struct SessionManager {
    state: Arc<SessionState>,
    client: AuthorizedClient,
    http_client: Client,
}

impl SessionManager {
    /// Create a session manager for the API at `base_url` and restore any
    /// stored session from `store`.
    pub fn new(store: CredentialStore, base_url: Url) -> SessionResult<Self> {
        let http_client = Client::new();
        let refresher = RefreshProtocolClient::new(http_client.clone(), &base_url)?;
        Self::with_refresher(store, base_url, http_client, Arc::new(refresher))
    }

    /// Create a session manager with a custom refresh protocol client.
    pub fn with_refresher(
        store: CredentialStore,
        base_url: Url,
        http_client: Client,
        refresher: Arc<dyn TokenRefresher>,
    ) -> SessionResult<Self> {
        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SessionError::Config(format!(
                    "Unsupported API URL scheme: {}",
                    other
                )))
            }
        }

        let state = Arc::new(SessionState::new(store));
        state.restore()?;

        let client = AuthorizedClient::new(
            http_client.clone(),
            base_url,
            Arc::clone(&state),
            refresher,
        );

        Ok(Self {
            state,
            client,
            http_client,
        })
    }

    // ==========================================
    // Observation
    // ==========================================

    /// The authenticated principal, if any.
    pub fn get_identity(&self) -> Option<Identity> {
        self.state.identity()
    }

    /// True until the stored session has been read.
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Watch the session snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.watch()
    }

    /// Subscribe to session events. Navigation on [`SessionEvent::Ended`] is
    /// the subscriber's job.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.subscribe()
    }

    /// Client for calls that should carry the credential.
    pub fn client(&self) -> &AuthorizedClient {
        &self.client
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    // ==========================================
    // Lifecycle
    // ==========================================

    /// Adopt a credential set obtained elsewhere.
    pub fn login(
        &self,
        identity: Identity,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> SessionResult<()> {
        self.state.login(
            identity,
            CredentialPair::new(access_token, refresh_token),
        )
    }

    /// Log in against `POST /api/login` and adopt the returned credentials.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> SessionResult<Identity> {
        let url = self.client.url(LOGIN_PATH)?;
        info!(identifier = %identifier, "Logging in");

        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest {
                identifier,
                password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Login rejected");
            return Err(SessionError::InvalidCredentials(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: LoginResponse = response.json().await?;
        let user = data.user.clone();
        self.login(data.user, data.access_token, data.refresh_token)?;

        Ok(user)
    }

    /// End the session locally. There is no server call.
    pub fn logout(&self) {
        self.state.teardown(EndReason::Logout);
    }

    /// Re-fetch the profile and replace the cached identity.
    pub async fn refresh_identity(&self) -> SessionResult<Identity> {
        hydrator::hydrate(&self.client, &self.state).await
    }
}
