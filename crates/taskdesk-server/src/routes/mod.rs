pub mod accounts;
pub mod health;
pub mod tasks;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::StatusCode,
    middleware, Json, Router,
};
use serde_json::{json, Map, Value};
use taskdesk_core::ValidationErrors;
use taskdesk_db::Database;
use taskdesk_service::{AccountService, ServiceError, TaskManager};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::{auth_middleware, TokenIssuer};

pub struct InnerAppState {
    pub tasks: TaskManager,
    pub accounts: AccountService,
    pub db: Arc<dyn Database>,
    pub tokens: TokenIssuer,
    pub max_body_bytes: usize,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::routes())
        .merge(accounts::public_routes());

    let protected = Router::new()
        .merge(accounts::protected_routes())
        .merge(tasks::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) type ApiError = (StatusCode, Json<Value>);

/// Map a service error to the JSON error envelope, logging server faults under `op`.
pub(crate) fn api_error(op: &'static str) -> impl Fn(ServiceError) -> ApiError {
    move |e| {
        let status = match &e {
            ServiceError::Validation(errors) => return validation_failed(errors.clone()),
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Internal(msg) => {
                error!(op, error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "message": e.message() })))
    }
}

pub(crate) fn validation_failed(errors: ValidationErrors) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": errors.message(), "errors": errors })),
    )
}

/// A JSON object body. Syntax errors and non-object bodies are rejected here;
/// field types are checked by the `from_json` readers of each input.
pub(crate) fn json_object(body: Result<Json<Map<String, Value>>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    body.map(|Json(object)| object).map_err(json_rejection)
}

/// Malformed JSON bodies keep the framework's status but use the envelope.
fn json_rejection(rejection: JsonRejection) -> ApiError {
    (rejection.status(), Json(json!({ "message": rejection.body_text() })))
}
