#![allow(dead_code)]

use credential_store::{CredentialStore, Identity, MemoryStorage, UserId};
use serde_json::json;
use session_auth::{SessionEvent, SessionManager};
use tokio::sync::broadcast;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn alice() -> Identity {
    Identity::new(UserId::Numeric(1), "alice")
}

/// A manager pointed at `server` with an empty in-memory store.
pub fn anonymous_manager(server: &MockServer) -> SessionManager {
    SessionManager::new(
        CredentialStore::new(Box::new(MemoryStorage::new())),
        Url::parse(&server.uri()).unwrap(),
    )
    .unwrap()
}

/// A manager holding alice's session with tokens A1/R1.
pub fn logged_in_manager(server: &MockServer) -> SessionManager {
    let manager = anonymous_manager(server);
    manager.login(alice(), "A1", "R1").unwrap();
    manager
}

/// Mount the refresh endpoint: `R1` is exchanged for `new_access_token`.
pub async fn mount_refresh(server: &MockServer, new_access_token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token/refresh"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accessToken": new_access_token })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mount a refresh endpoint that rejects every refresh token.
pub async fn mount_refresh_denied(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/api/token/refresh"))
        .respond_with(ResponseTemplate::new(status).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(server)
        .await;
}

/// Drain every event currently queued on `events`.
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
