//! Authorized HTTP client and the unauthorized-response coordinator.
//!
//! Every call goes through [`AuthorizedClient::execute`]: sign with the
//! current access token, send, and inspect the response. An
//! authorization-expired response on the original attempt triggers one
//! refresh cycle (shared with any concurrent callers) and exactly one replay.
//! The replay's response is what the caller gets, whatever it is.

use crate::refresh::TokenRefresher;
use crate::request_fsm::{InFlightCall, RequestInput, RetryMarker};
use crate::single_flight::{RefreshFailure, RefreshGate};
use crate::state::SessionState;
use crate::{signer, SessionError, SessionResult};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Whether `status` means the access token is no longer accepted.
pub fn is_auth_expired(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// What to do after the original attempt was rejected.
enum Recovery {
    /// Sign again with the current token and resend.
    Replay,
    /// Hand the rejected response back to the caller.
    GiveUp,
}

/// HTTP client that signs every call and recovers from expired tokens.
#[derive(Clone)]
pub struct AuthorizedClient {
    http_client: Client,
    base_url: Url,
    state: Arc<SessionState>,
    refresher: Arc<dyn TokenRefresher>,
    gate: RefreshGate,
}

impl AuthorizedClient {
    pub fn new(
        http_client: Client,
        base_url: Url,
        state: Arc<SessionState>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            http_client,
            base_url,
            state,
            refresher,
            gate: RefreshGate::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an API path against the base URL.
    pub fn url(&self, path: &str) -> SessionResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Start building a call to `path`. Nothing is signed until it is sent
    /// with [`send`](Self::send) or [`execute`](Self::execute).
    pub fn request(&self, method: Method, path: &str) -> SessionResult<RequestBuilder> {
        Ok(self.http_client.request(method, self.url(path)?))
    }

    pub fn get(&self, path: &str) -> SessionResult<RequestBuilder> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> SessionResult<RequestBuilder> {
        self.request(Method::POST, path)
    }

    /// Build and execute.
    pub async fn send(&self, builder: RequestBuilder) -> SessionResult<Response> {
        self.execute(builder.build()?).await
    }

    /// GET `path` and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        let response = self.send(self.get(path)?).await?;
        decode_json(response).await
    }

    /// POST `body` as JSON to `path` and decode a JSON body.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.post(path)?.json(body)).await?;
        decode_json(response).await
    }

    /// Sign, send, and on an expired token refresh and replay once.
    ///
    /// Returns `Ok` for every response the server sent, including a replay
    /// that was rejected again. Returns [`SessionError::SessionExpired`] when
    /// the refresh itself failed; the session has been torn down by then.
    pub async fn execute(&self, request: Request) -> SessionResult<Response> {
        let mut call = InFlightCall::new();
        let mut request = request;

        debug!(
            request_id = %call.id(),
            method = %request.method(),
            path = %request.url().path(),
            "Sending request"
        );

        loop {
            let replay = request.try_clone();
            let signed_with = self.state.access_token();
            let signed = signer::sign(request, signed_with.as_deref());

            let response = match self.http_client.execute(signed).await {
                Ok(response) => response,
                Err(e) => {
                    call.advance(RequestInput::Failed)?;
                    warn!(request_id = %call.id(), error = %e, "Request failed");
                    return Err(SessionError::Transport(e));
                }
            };

            let status = response.status();
            if !is_auth_expired(status) {
                let input = if status.is_success() {
                    RequestInput::Succeeded
                } else {
                    RequestInput::Failed
                };
                call.advance(input)?;
                debug!(request_id = %call.id(), status = %status, state = ?call.state(), "Request settled");
                return Ok(response);
            }

            if call.marker() == RetryMarker::Retrying {
                call.advance(RequestInput::Unauthorized)?;
                warn!(
                    request_id = %call.id(),
                    status = %status,
                    "Replayed request rejected again, not refreshing twice"
                );
                return Ok(response);
            }

            call.advance(RequestInput::Unauthorized)?;
            debug!(request_id = %call.id(), status = %status, "Access token rejected");

            match self.recover(&mut call, signed_with.as_deref()).await? {
                Recovery::Replay => {}
                Recovery::GiveUp => return Ok(response),
            }

            request = match replay {
                Some(request) => request,
                None => {
                    call.advance(RequestInput::Failed)?;
                    return Err(SessionError::RequestNotReplayable);
                }
            };
            debug!(request_id = %call.id(), "Replaying request with new access token");
        }
    }

    /// Obtain a usable access token after the original attempt was rejected.
    async fn recover(
        &self,
        call: &mut InFlightCall,
        signed_with: Option<&str>,
    ) -> SessionResult<Recovery> {
        call.advance(RequestInput::RefreshStarted)?;

        match (signed_with, self.state.access_token()) {
            // Someone refreshed (or logged in) while this call was in flight.
            (signed_with, Some(current)) if signed_with != Some(current.as_str()) => {
                debug!(request_id = %call.id(), "Access token already replaced");
                return Ok(Recovery::Replay);
            }
            // The session ended while this call was in flight.
            (Some(_), None) => {
                call.advance(RequestInput::RefreshDenied)?;
                return Err(SessionError::SessionExpired(
                    "session ended while the request was in flight".to_string(),
                ));
            }
            _ => {}
        }

        match self.gate.refresh(&self.state, &self.refresher).await {
            Ok(_) => Ok(Recovery::Replay),
            Err(RefreshFailure::NoRefreshToken) => {
                call.advance(RequestInput::RefreshDenied)?;
                info!(request_id = %call.id(), "No refresh token, returning rejected response");
                Ok(Recovery::GiveUp)
            }
            Err(failure) => {
                call.advance(RequestInput::RefreshDenied)?;
                Err(failure.into())
            }
        }
    }
}

/// Decode a success body, or turn the response into [`SessionError::Status`].
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> SessionResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SessionError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_expired_statuses() {
        assert!(is_auth_expired(StatusCode::UNAUTHORIZED));
        assert!(is_auth_expired(StatusCode::FORBIDDEN));
        assert!(!is_auth_expired(StatusCode::OK));
        assert!(!is_auth_expired(StatusCode::NOT_FOUND));
        assert!(!is_auth_expired(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
