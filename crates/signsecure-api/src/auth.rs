//! # Authentication Middleware
//!
//! Bearer token middleware standing in for the platform's user directory.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_uuid}:{email}:{secret}   — secret configured
//! Bearer {user_uuid}:{email}            — no secret configured (development)
//! ```
//!
//! The secret is compared in constant time. Every authenticated request gets
//! a [`CallerIdentity`] injected into the request extensions; handlers
//! extract it via the `FromRequestParts` impl.
//!
//! Signing-session routes (`/v1/signing/*`) and health checks are mounted
//! outside this middleware: signers authenticate with their signer token.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use signsecure_core::{Email, UserId};

use crate::config::SecretString;
use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated platform user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// User reference.
    pub user_id: UserId,
    /// User email, recorded on audit events the user triggers.
    pub email: Email,
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: Option<SecretString>,
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of secrets.
///
/// When lengths differ, performs a dummy comparison so the mismatch path
/// costs the same as a full comparison.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer credential into a caller identity.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    let (user, email) = match (parts.as_slice(), expected_secret) {
        ([user, email, secret], Some(expected)) => {
            if !constant_time_eq(secret, expected) {
                return Err("invalid bearer token".into());
            }
            (*user, *email)
        }
        ([_, _], Some(_)) => return Err("invalid bearer token".into()),
        ([user, email], None) => (*user, *email),
        ([user, email, _], None) => (*user, *email),
        _ => {
            return Err(
                "invalid token format, expected {user_uuid}:{email}:{secret}".into(),
            )
        }
    };

    let user_id = user
        .parse::<UserId>()
        .map_err(|e| format!("invalid user id: {e}"))?;
    let email = Email::parse(email).map_err(|e| format!("invalid email: {e}"))?;

    Ok(CallerIdentity { user_id, email })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Extract and validate the Bearer token from the Authorization header.
///
/// A missing header is rejected even without a configured secret.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or(AuthConfig { secret: None });

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) if value.starts_with("Bearer ") => {
            let provided = &value[7..];
            match parse_bearer_token(provided, config.secret.as_ref().map(SecretString::expose)) {
                Ok(identity) => {
                    tracing::debug!(user = %identity.user_id.short(), "authenticated");
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            unauthorized_response("missing authorization header")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const USER: &str = "6f1c2a9e-0d4b-4c3e-9a51-7b2f8e0c1d23";

    fn test_app(secret: Option<&str>) -> Router {
        let auth_config = AuthConfig {
            secret: secret.map(SecretString::new),
        };
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.email.to_string() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_token_with_secret_accepted() {
        let app = test_app(Some("s3cret"));
        let (status, body) = call(app, Some(&format!("Bearer {USER}:owner@example.com:s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "owner@example.com");
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let app = test_app(Some("s3cret"));
        let (status, _) = call(app, Some(&format!("Bearer {USER}:owner@example.com:guess"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn secretless_token_rejected_when_secret_configured() {
        let app = test_app(Some("s3cret"));
        let (status, _) = call(app, Some(&format!("Bearer {USER}:owner@example.com"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dev_mode_accepts_identity_without_secret() {
        let app = test_app(None);
        let (status, body) = call(app, Some(&format!("Bearer {USER}:dev@example.com"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "dev@example.com");
    }

    #[tokio::test]
    async fn missing_header_rejected_even_in_dev_mode() {
        let (status, body) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("UNAUTHORIZED"));
    }

    #[tokio::test]
    async fn basic_scheme_rejected() {
        let (status, _) = call(test_app(None), Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_identity_rejected() {
        assert!(parse_bearer_token("not-a-uuid:a@example.com", None).is_err());
        assert!(parse_bearer_token(&format!("{USER}:nobody"), None).is_err());
        assert!(parse_bearer_token("justonepart", None).is_err());
    }

    #[test]
    fn constant_time_eq_semantics() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
