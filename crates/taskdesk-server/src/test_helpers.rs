use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::{json, Value};
use taskdesk_store::LocalStore;
use tokio::net::TcpListener;
use tower::ServiceExt as _;

use crate::auth::TokenIssuer;
use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::AppState;

/// In-memory SQLite, a throwaway local store, a fixed signing secret.
///
/// Preview links are root-relative (empty public URL).
pub fn test_state() -> AppState {
    let db = Arc::new(taskdesk_db::SqliteDatabase::open_in_memory().unwrap());
    let dir = tempfile::tempdir().unwrap().keep();
    let store = Arc::new(LocalStore::at(dir));
    crate::build_state(
        db,
        store,
        TokenIssuer::new(b"taskdesk-test-secret", 60),
        "",
        DEFAULT_MAX_BODY_BYTES,
    )
}

pub async fn test_router() -> Router {
    crate::build_router(test_state())
}

/// A JSON request, optionally with a bearer token.
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Register `email` with password `secret123` and return an access token.
pub async fn register_and_login(app: &Router, email: &str) -> String {
    let creds = json!({ "name": "Test", "email": email, "password": "secret123" });
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/register", None, creds.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "register {email}");

    let resp = app
        .clone()
        .oneshot(json_request("POST", "/api/login", None, creds))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "login {email}");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port.
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = test_router().await;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
    }
}
