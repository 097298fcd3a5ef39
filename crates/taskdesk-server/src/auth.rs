use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use taskdesk_core::{Caller, TokenResponse};

use crate::routes::AppState;

pub const TOKEN_ISSUER: &str = "taskdesk";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    Expired,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        }
    }
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    /// Token id, the key for revocation.
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Signs and checks HS256 access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_minutes: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(ttl_minutes as i64),
        }
    }

    pub fn expires_in_secs(&self) -> u64 {
        self.ttl.num_seconds().max(0) as u64
    }

    pub fn issue(&self, user_id: &str) -> Result<(String, Claims), AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))?;
        Ok((token, claims))
    }

    /// Issue a token and wrap it in the login/refresh response body.
    pub fn token_response(&self, user_id: &str) -> Result<TokenResponse, AuthError> {
        let (token, _) = self.issue(user_id)?;
        Ok(TokenResponse::bearer(token, self.expires_in_secs()))
    }

    /// Check signature, expiry and issuer.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.leeway = 0;
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

/// Random signing secret: 64 chars of base62.
pub fn generate_secret() -> String {
    use rand::Rng;
    const BASE62: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..64)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

/// The authenticated identity, inserted into request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct Session {
    pub caller: Caller,
    pub claims: Claims,
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthenticated." })),
    )
        .into_response()
}

/// Requires a valid, unrevoked `Authorization: Bearer <token>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim);

    let Some(token) = token else {
        return unauthenticated();
    };

    let claims = match state.tokens.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "rejected bearer token");
            return unauthenticated();
        }
    };

    match state.db.is_token_revoked(&claims.jti).await {
        Ok(false) => {}
        Ok(true) => return unauthenticated(),
        Err(e) => {
            error!(op = "auth", error = %e, "revocation lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": e.to_string() })),
            )
                .into_response();
        }
    }

    request.extensions_mut().insert(Session {
        caller: Caller::new(claims.sub.clone()),
        claims,
    });
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::test_helpers::{register_and_login, test_router};

    #[test]
    fn issue_then_validate() {
        let issuer = TokenIssuer::new(b"secret", 60);
        let (token, claims) = issuer.issue("user-1").unwrap();
        let decoded = issuer.validate(&token).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.sub, "user-1");
        assert_eq!(decoded.iss, TOKEN_ISSUER);
        assert_eq!(decoded.exp - decoded.iat, 3600);
        assert_eq!(issuer.expires_in_secs(), 3600);
    }

    #[test]
    fn each_token_gets_a_fresh_id() {
        let issuer = TokenIssuer::new(b"secret", 60);
        let (_, a) = issuer.issue("u").unwrap();
        let (_, b) = issuer.issue("u").unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let (token, _) = TokenIssuer::new(b"one", 60).issue("u").unwrap();
        let err = TokenIssuer::new(b"two", 60).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new(b"secret", 60);
        let past = Utc::now() - Duration::minutes(5);
        let claims = Claims {
            sub: "u".into(),
            iat: (past - Duration::minutes(60)).timestamp(),
            exp: past.timestamp(),
            iss: TOKEN_ISSUER.into(),
            jti: "j".into(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(matches!(issuer.validate(&token).unwrap_err(), AuthError::Expired));
    }

    #[test]
    fn generated_secrets_are_base62_and_distinct() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, generate_secret());
    }

    async fn get_tasks(app: axum::Router, auth: Option<&str>) -> StatusCode {
        let mut req = Request::builder().uri("/api/tasks");
        if let Some(value) = auth {
            req = req.header("Authorization", value);
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_401() {
        let app = test_router().await;
        assert_eq!(get_tasks(app.clone(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_tasks(app.clone(), Some("Bearer not-a-jwt")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_tasks(app, Some("Basic dXNlcjpwYXNz")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn valid_bearer_passes() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;
        assert_eq!(
            get_tasks(app, Some(&format!("Bearer {token}"))).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let app = test_router().await;
        let resp = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
