//! Login, logout, restore and profile hydration against a mock API.

mod common;

use common::{alice, anonymous_manager, drain, logged_in_manager, mount_refresh, mount_refresh_denied};
use credential_store::{open_credential_store, CredentialPair, CredentialStore, MemoryStorage};
use serde_json::json;
use session_auth::{EndReason, SessionError, SessionEvent, SessionManager, SessionPhase};
use tempfile::tempdir;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({ "identifier": "alice", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 1, "username": "alice" },
            "accessToken": "A1",
            "refreshToken": "R1"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn password_login_stores_identity_and_both_tokens() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let manager = anonymous_manager(&server);
    let mut events = manager.subscribe();

    let user = manager.login_with_password("alice", "pw").await.unwrap();

    assert_eq!(user, alice());
    assert_eq!(manager.get_identity(), Some(alice()));
    assert_eq!(manager.phase(), SessionPhase::Authenticated);

    let store = manager.state().store();
    assert_eq!(store.load().unwrap(), Some(CredentialPair::new("A1", "R1")));
    assert_eq!(store.load_identity().unwrap(), Some(alice()));

    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::LoggedIn { user: alice() }]
    );
}

#[tokio::test]
async fn rejected_login_is_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let manager = anonymous_manager(&server);
    let err = manager
        .login_with_password("alice", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredentials(_)));
    assert!(!err.is_session_expired());
    assert!(manager.get_identity().is_none());
    assert!(manager.state().store().load().unwrap().is_none());
}

#[tokio::test]
async fn login_request_is_not_signed_with_an_old_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let manager = logged_in_manager(&server);
    manager.login_with_password("alice", "pw").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn logout_is_idempotent() {
    let server = MockServer::start().await;
    let manager = logged_in_manager(&server);
    let mut events = manager.subscribe();

    for _ in 0..2 {
        manager.logout();

        let store = manager.state().store();
        assert!(store.access_token().unwrap().is_none());
        assert!(store.refresh_token().unwrap().is_none());
        assert!(store.load_identity().unwrap().is_none());
        assert!(!store.has_session().unwrap());
        assert!(manager.get_identity().is_none());
        assert_eq!(manager.phase(), SessionPhase::Anonymous);
    }

    let ended = SessionEvent::Ended {
        reason: EndReason::Logout,
        redirect_to: "/login".to_string(),
    };
    assert_eq!(drain(&mut events), vec![ended.clone(), ended]);
}

#[tokio::test]
async fn logged_out_calls_go_unsigned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let manager = logged_in_manager(&server);
    manager.logout();
    let _: serde_json::Value = manager.client().get_json("/api/products").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn stored_session_is_restored_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let credentials = dir.path().join("credentials.json");
    let base_url = Url::parse(&server.uri()).unwrap();

    {
        let manager =
            SessionManager::new(open_credential_store(&credentials).unwrap(), base_url.clone())
                .unwrap();
        manager.login(alice(), "A1", "R1").unwrap();
    }

    let manager =
        SessionManager::new(open_credential_store(&credentials).unwrap(), base_url).unwrap();
    let watch = manager.watch();

    assert!(!manager.is_loading());
    assert!(!watch.borrow().loading);
    assert_eq!(manager.get_identity(), Some(alice()));
    assert_eq!(manager.phase(), SessionPhase::Authenticated);

    let _: serde_json::Value = manager.client().get_json("/api/cart").await.unwrap();
}

#[tokio::test]
async fn refresh_identity_replaces_cached_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "username": "alice",
            "role": "customer",
            "address": { "city": "Oslo" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = logged_in_manager(&server);
    let mut events = manager.subscribe();

    let identity = manager.refresh_identity().await.unwrap();

    assert_eq!(identity.role.as_deref(), Some("customer"));
    assert_eq!(identity.extra["address"]["city"], "Oslo");
    assert_eq!(manager.get_identity(), Some(identity.clone()));
    assert_eq!(
        manager.state().store().load_identity().unwrap(),
        Some(identity.clone())
    );
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::IdentityUpdated { user: identity }]
    );
}

#[tokio::test]
async fn refresh_identity_completes_a_session_restored_without_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "username": "alice" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new(Box::new(MemoryStorage::new()));
    store.save(&CredentialPair::new("A1", "R1")).unwrap();
    let manager = SessionManager::new(store, Url::parse(&server.uri()).unwrap()).unwrap();
    assert_eq!(manager.phase(), SessionPhase::Anonymous);
    assert!(manager.get_identity().is_none());

    let identity = manager.refresh_identity().await.unwrap();

    assert_eq!(identity, alice());
    assert_eq!(manager.get_identity(), Some(alice()));
    assert_eq!(manager.phase(), SessionPhase::Authenticated);
    assert_eq!(
        manager.state().store().load_identity().unwrap(),
        Some(alice())
    );
}

#[tokio::test]
async fn refresh_identity_rides_the_refresh_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "username": "alice" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "A2", 1).await;

    let manager = logged_in_manager(&server);
    let identity = manager.refresh_identity().await.unwrap();

    assert_eq!(identity, alice());
    assert_eq!(manager.state().access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn refresh_identity_defers_auth_failure_to_teardown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh_denied(&server, 403).await;

    let manager = logged_in_manager(&server);
    let mut events = manager.subscribe();

    let err = manager.refresh_identity().await.unwrap_err();

    assert!(err.is_session_expired());
    assert!(manager.get_identity().is_none());
    assert!(manager.state().store().load().unwrap().is_none());
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::Ended {
            reason: EndReason::RefreshDenied,
            redirect_to: "/login".to_string(),
        }]
    );
}
