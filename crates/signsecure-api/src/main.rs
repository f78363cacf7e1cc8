//! # signsecure-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. See [`signsecure_api::config`] for the
//! environment variables it reads.

use std::net::SocketAddr;
use std::sync::Arc;

use signsecure_api::config::{AppConfig, SecretString};
use signsecure_api::notify::LogMailer;
use signsecure_api::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!("Configuration failed: {e}");
        e
    })?;
    let port = config.port;

    // Absent DATABASE_URL means in-memory only.
    let db_pool = signsecure_api::db::init_pool(
        config.database_url.as_ref().map(SecretString::expose),
    )
    .await
    .map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = AppState::with_config(config, Arc::new(LogMailer), db_pool).map_err(|e| {
        tracing::error!("State initialization failed: {e}");
        e
    })?;

    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let app = signsecure_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("SignSecure API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Structured tracing. `SIGNSECURE_LOG_JSON=true` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("SIGNSECURE_LOG_JSON")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
