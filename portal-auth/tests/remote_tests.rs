//! Remote account service backend against a mock HTTP server

use portal_auth::session::{DUPLICATE_EMAIL_MESSAGE, INVALID_CREDENTIALS_MESSAGE};
use portal_auth::{
    AccountStore, AuthBackend, AuthContext, AuthError, ContextOptions, MemoryStorage,
    RemoteConfig, RemoteStore, SessionStore,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn users_body() -> serde_json::Value {
    json!([
        {"id": 1, "email": "admin@jee.com", "role": "admin", "approved": true},
        {"id": 2, "email": "test@gmail.com", "role": "student", "approved": true},
        {"id": 3, "email": "new@x.com", "role": "student", "approved": false}
    ])
}

async fn mount_users(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_body()))
        .mount(server)
        .await;
}

async fn remote_context(server: &MockServer) -> AuthContext {
    let backend = AuthBackend::remote(
        RemoteConfig::new(server.uri()),
        Arc::new(MemoryStorage::new()),
    )
    .unwrap();
    AuthContext::init(backend, ContextOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_remote_login_and_expiry() {
    let server = MockServer::start().await;
    mount_users(&server).await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "test@gmail.com", "password": "test123"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": 2, "email": "test@gmail.com", "role": "student", "approved": true}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sessions/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"userId": 2, "isActive": false})),
        )
        .mount(&server)
        .await;

    let ctx = remote_context(&server).await;
    assert_eq!(ctx.users().await.len(), 3);
    assert_eq!(ctx.get_pending_students().await.len(), 1);

    let outcome = ctx.login("test@gmail.com", "test123").await;
    assert!(outcome.success);
    assert_eq!(outcome.is_admin, Some(false));

    assert!(!ctx.poll_session().await);
    assert!(ctx.session_expired().await);
    assert!(!ctx.is_authenticated().await);
}

#[tokio::test]
async fn test_remote_rejected_credentials() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ctx = remote_context(&server).await;
    let outcome = ctx.login("test@gmail.com", "nope").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, INVALID_CREDENTIALS_MESSAGE);
}

#[tokio::test]
async fn test_remote_duplicate_email() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let ctx = remote_context(&server).await;
    let outcome = ctx.add_student("new@x.com", "pw", false).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, DUPLICATE_EMAIL_MESSAGE);
}

#[tokio::test]
async fn test_remote_server_error_keeps_session() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"id": 2, "email": "test@gmail.com", "role": "student", "approved": true}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sessions/2"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let ctx = remote_context(&server).await;
    assert!(ctx.login("test@gmail.com", "test123").await.success);

    assert!(ctx.poll_session().await);
    assert!(ctx.is_authenticated().await);
    assert!(!ctx.session_expired().await);
}

#[tokio::test]
async fn test_remote_store_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/users/[^/]+/approve$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/users/[^/]+/reject$"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/users/[^/]+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("x-portal-client", "tests"))
        .and(body_json(json!({"email": "a@x.com", "password": "pw", "approved": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(
            json!({"id": 9, "email": "a@x.com", "role": "student", "approved": true}),
        ))
        .mount(&server)
        .await;

    let store = RemoteStore::new(
        RemoteConfig::new(server.uri())
            .with_header("x-portal-client".to_string(), "tests".to_string()),
    )
    .unwrap();

    store.approve("s@x.com").await.unwrap();
    // Missing resources are not an error
    store.reject("gone@x.com").await.unwrap();
    store.remove("gone@x.com").await.unwrap();
    store.deactivate(7).await.unwrap();
    assert_eq!(store.get(7).await.unwrap(), None);
    assert!(!store.is_active(7).await.unwrap());

    let added = store.add("a@x.com", "pw", true).await.unwrap();
    assert_eq!(added.id, 9);
    assert!(added.approved);
}

#[tokio::test]
async fn test_unreachable_service_is_transport_failure() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let store = RemoteStore::new(RemoteConfig::new(uri).with_timeout(2)).unwrap();
    match store.list_all().await {
        Err(error @ AuthError::Transport { .. }) => assert!(error.is_transport_failure()),
        other => panic!("Expected transport failure, got {:?}", other.map(|u| u.len())),
    }
}
