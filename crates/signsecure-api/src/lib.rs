//! # signsecure-api — Axum API Service
//!
//! HTTP surface of SignSecure, built on Axum/Tower/Tokio.
//!
//! ## Routers
//!
//! - `/v1/documents/*` — documents, upload, send for signature
//! - `/v1/signers/*` — signers, `mark_as_viewed`, `sign_document`
//! - `/v1/fields/*` — form fields
//! - `/v1/audit-trail/*` — audit events
//! - `/v1/signing/*` — signer links, authenticated by signer token
//! - `/health/*`, `/metrics`: health checks and Prometheus metrics (unauthenticated)
//! - `/openapi.json` — generated OpenAPI document
//!
//! ## Middleware Stack (Tower)
//!
//! CorsLayer → TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//!
//! ## Crate Policy
//!
//! - Route handlers parse and render; state changes go through
//!   [`lifecycle`], which applies the rules from `signsecure-state`.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod lifecycle;
pub mod middleware;
pub mod notify;
pub mod openapi;
pub mod policy;
pub mod routes;
pub mod state;
pub mod views;

pub use error::AppError;
pub use state::AppState;

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::extractors::ClientAddressPolicy;
use crate::middleware::metrics::{metrics_middleware, ApiMetrics};

/// Assemble the application router.
///
/// Signing links, health checks and `/metrics` sit outside the auth
/// middleware. When the metrics registry cannot be built the service runs
/// without the metrics layer and without `/metrics`.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        secret: state.config.auth_secret.clone(),
    };
    let client_address = ClientAddressPolicy {
        trust_forwarded: state.config.trust_forwarded,
    };
    let metrics = match ApiMetrics::new() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            tracing::error!("Metrics disabled, registry setup failed: {e}");
            None
        }
    };

    // Execution order: Trace → Metrics → Auth → Handler.
    let mut api = Router::new()
        .merge(routes::documents::router())
        .merge(routes::signers::router())
        .merge(routes::fields::router())
        .merge(routes::audit_trail::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware));
    let mut signing = routes::signing::router();
    let mut unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    if let Some(metrics) = metrics {
        api = api
            .layer(from_fn(metrics_middleware))
            .layer(Extension(metrics.clone()));
        signing = signing
            .layer(from_fn(metrics_middleware))
            .layer(Extension(metrics.clone()));
        unauthenticated = unauthenticated
            .route("/metrics", get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(client_address))
        .with_state(state.clone());
    let signing = signing
        .layer(TraceLayer::new_for_http())
        .layer(Extension(client_address))
        .with_state(state.clone());
    let unauthenticated = unauthenticated.with_state(state.clone());

    let router = Router::new()
        .merge(unauthenticated)
        .merge(signing)
        .merge(api);

    match cors_layer(&state.config.frontend_url) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// CORS for the frontend origin. `None` when the origin is not a valid header.
fn cors_layer(frontend_url: &str) -> Option<CorsLayer> {
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Err(e) => {
            tracing::warn!(frontend_url, "CORS disabled, invalid origin: {e}");
            None
        }
    }
}

/// Liveness check. The process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// How long readiness waits for a store's read lock.
const STORE_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Readiness check.
///
/// Checks:
/// - Every in-memory store grants a read lock within a short timeout.
/// - The database answers `SELECT 1` (when configured).
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let stores = [
        ("documents", state.documents.is_readable_within(STORE_READ_TIMEOUT)),
        ("signers", state.signers.is_readable_within(STORE_READ_TIMEOUT)),
        ("fields", state.fields.is_readable_within(STORE_READ_TIMEOUT)),
        ("audit events", state.audit_events.is_readable_within(STORE_READ_TIMEOUT)),
    ];
    if let Some((name, _)) = stores.iter().find(|(_, readable)| !readable) {
        tracing::warn!(store = *name, "Store read lock unavailable");
        return (StatusCode::SERVICE_UNAVAILABLE, format!("{name} store locked")).into_response();
    }

    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Refreshes the domain gauges from the stores, then encodes every metric in
/// the text exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    let mut documents: HashMap<&'static str, usize> = HashMap::new();
    for d in state.documents.filter(|d| !d.is_deleted()) {
        *documents.entry(d.status.as_str()).or_default() += 1;
    }
    metrics.documents_total().reset();
    for (status, count) in &documents {
        metrics
            .documents_total()
            .with_label_values(&[*status])
            .set(*count as f64);
    }

    let mut signers: HashMap<&'static str, usize> = HashMap::new();
    for s in state.signers.filter(|s| s.deleted_at.is_none()) {
        *signers.entry(s.status.as_str()).or_default() += 1;
    }
    metrics.signers_total().reset();
    for (status, count) in &signers {
        metrics
            .signers_total()
            .with_label_values(&[*status])
            .set(*count as f64);
    }

    metrics
        .audit_events_total()
        .set(state.audit_events.len() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check_readiness(state: AppState) -> (StatusCode, String) {
        let response = readiness(State(state)).await.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn readiness_reports_ready_stores() {
        assert_eq!(check_readiness(AppState::new()).await, (StatusCode::OK, "ready".to_string()));
    }

    #[tokio::test]
    async fn readiness_fails_while_a_store_is_wedged() {
        let state = AppState::new();
        let held = state.signers.hold_write();
        let (status, body) = check_readiness(state.clone()).await;
        drop(held);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "signers store locked");
    }
}
