use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{Map, Value};
use taskdesk_core::user::{LoginInput, RegisterInput, User};
use taskdesk_core::{Envelope, TokenResponse};
use taskdesk_service::ServiceError;
use tracing::{info, warn};

use super::{api_error, json_object, validation_failed, ApiError, AppState};
use crate::auth::Session;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/logout", post(logout))
        .route("/api/refresh", post(refresh))
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<User>>), ApiError> {
    let input = RegisterInput::from_json(&json_object(body)?).map_err(validation_failed)?;
    let user = state
        .accounts
        .register(&input)
        .await
        .map_err(api_error("register"))?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new("User created successfully", user)),
    ))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let input = LoginInput::from_json(&json_object(body)?).map_err(validation_failed)?;
    let user = state
        .accounts
        .authenticate(&input)
        .await
        .map_err(api_error("login"))?;
    let token = state
        .tokens
        .token_response(&user.id)
        .map_err(|e| api_error("login")(ServiceError::Internal(e.to_string())))?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(token))
}

async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Envelope<User>>, ApiError> {
    state
        .accounts
        .get_user(&session.caller.user_id)
        .await
        .map(|user| Json(Envelope::new("User profile", user)))
        .map_err(api_error("me"))
}

/// Revoke the presented token and drop revocations that have expired anyway.
async fn revoke_session(state: &AppState, session: &Session, op: &'static str) -> Result<(), ApiError> {
    state
        .db
        .revoke_token(&session.claims.jti, session.claims.expires_at())
        .await
        .map_err(|e| api_error(op)(e.into()))?;
    if let Err(e) = state.db.purge_expired_revocations(Utc::now()).await {
        warn!(error = %e, "failed to purge expired revocations");
    }
    Ok(())
}

async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Envelope<()>>, ApiError> {
    revoke_session(&state, &session, "logout").await?;
    info!(user_id = %session.caller.user_id, "user logged out");
    Ok(Json(Envelope::message("User logged out")))
}

async fn refresh(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state
        .tokens
        .token_response(&session.caller.user_id)
        .map_err(|e| api_error("refresh")(ServiceError::Internal(e.to_string())))?;
    revoke_session(&state, &session, "refresh").await?;
    Ok(Json(token))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_helpers::{json_request, register_and_login, test_router};

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_returns_user_without_password() {
        let app = test_router().await;
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/register",
                None,
                json!({ "name": "A", "email": "a@x.com", "password": "secret123" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"]["email"], "a@x.com");
        assert!(body["data"].get("password").is_none());
        assert!(body["data"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_validation_errors_are_422() {
        let app = test_router().await;
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/register",
                None,
                json!({ "email": "nope", "password": "short" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body = body_json(resp).await;
        assert_eq!(
            body["message"],
            "The name field is required. (and 2 more errors)"
        );
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["password"].is_array());
    }

    #[tokio::test]
    async fn malformed_json_uses_the_envelope() {
        let app = test_router().await;
        let req = Request::builder()
            .method("POST")
            .uri("/api/login")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert!(body_json(resp).await["message"].is_string());
    }

    #[tokio::test]
    async fn non_string_credentials_are_422() {
        let app = test_router().await;
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/register",
                None,
                json!({ "name": "A", "email": "a@x.com", "password": 12345678 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body = body_json(resp).await;
        assert_eq!(body["errors"]["password"][0], "The password field must be a string.");
        assert!(body["errors"].get("email").is_none());
    }

    #[tokio::test]
    async fn login_returns_bearer_token() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;
        assert!(!token.is_empty());

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                None,
                json!({ "email": "a@x.com", "password": "wrong-password" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(body_json(resp).await["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn me_then_logout_revokes_token() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;

        let get_me = |app: axum::Router| {
            let token = token.clone();
            async move {
                app.oneshot(
                    Request::builder()
                        .uri("/api/me")
                        .header("Authorization", format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap()
            }
        };

        let resp = get_me(app.clone()).await;
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "User profile");
        assert_eq!(body["data"]["email"], "a@x.com");

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/logout", Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(body_json(resp).await["message"], "User logged out");

        let resp = get_me(app).await;
        assert_eq!(resp.status(), 401);
        assert_eq!(body_json(resp).await["message"], "Unauthenticated.");
    }

    #[tokio::test]
    async fn refresh_swaps_tokens() {
        let app = test_router().await;
        let old = register_and_login(&app, "a@x.com").await;

        let resp = app
            .clone()
            .oneshot(json_request("POST", "/api/refresh", Some(&old), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["expires_in"], 3600);
        let new = body["access_token"].as_str().unwrap().to_string();
        assert_ne!(new, old);

        let with = |token: String| {
            Request::builder()
                .uri("/api/tasks")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(app.clone().oneshot(with(old)).await.unwrap().status(), 401);
        assert_eq!(app.oneshot(with(new)).await.unwrap().status(), 200);
    }
}
