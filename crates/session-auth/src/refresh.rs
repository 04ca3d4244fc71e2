//! Refresh protocol client.
//!
//! Exchanges the refresh token for a new access token. The exchange is never
//! signed with the expired access token; the refresh token in the body is its
//! only credential.

use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// Path of the refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/api/token/refresh";

/// Result of a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Replacement refresh token, if the backend rotates them.
    pub refresh_token: Option<String>,
}

impl RefreshGrant {
    /// A grant that leaves the stored refresh token in place.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("access_token", &"<redacted>")
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

/// Anything that can trade a refresh token for a new access token.
///
/// Implementations fail with [`SessionError::RefreshDenied`] for every kind of
/// failure, transport errors included.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> SessionResult<RefreshGrant>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// HTTP client for `POST /api/token/refresh`.
pub struct RefreshProtocolClient {
    http_client: Client,
    endpoint: Url,
}

impl RefreshProtocolClient {
    /// Create a refresh client for the API at `base_url`.
    ///
    /// `http_client` must be a plain client: it is used as is, with no
    /// signing.
    pub fn new(http_client: Client, base_url: &Url) -> SessionResult<Self> {
        Ok(Self {
            http_client,
            endpoint: base_url.join(REFRESH_PATH)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TokenRefresher for RefreshProtocolClient {
    async fn refresh(&self, refresh_token: &str) -> SessionResult<RefreshGrant> {
        debug!(url = %self.endpoint, "Refreshing access token");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token refresh request failed");
                SessionError::RefreshDenied(format!("refresh request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token refresh rejected");
            return Err(SessionError::RefreshDenied(format!("HTTP {}: {}", status, body)));
        }

        let data: RefreshResponse = response.json().await.map_err(|e| {
            SessionError::RefreshDenied(format!("malformed refresh response: {}", e))
        })?;

        Ok(RefreshGrant::new(data.access_token))
    }
}
