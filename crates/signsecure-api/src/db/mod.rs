//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is configured,
//! every unit of work is written through inside one transaction and the
//! in-memory stores are hydrated from the tables on startup. Without it the
//! API runs in-memory only.
//!
//! Lifecycle rules are enforced in `signsecure-state`, not in SQL. The
//! schema only carries the invariants that are cheap to state as
//! constraints.

pub mod audit;
pub mod documents;
pub mod fields;
pub mod signers;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::UnitOfWork;

/// Connect and run the embedded migrations.
///
/// Returns `None` when no URL is configured (in-memory-only mode).
pub async fn init_pool(url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Write one unit of work in a single transaction.
///
/// The rows of every touched document are locked first, so concurrent
/// writers on the same aggregate serialize even across processes.
pub async fn commit(pool: &PgPool, unit: &UnitOfWork) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for document in unit.touched_documents() {
        sqlx::query("SELECT id FROM documents WHERE ref = $1 FOR UPDATE")
            .bind(document.0)
            .fetch_optional(&mut *tx)
            .await?;
    }

    for document in &unit.documents {
        documents::upsert(&mut tx, document).await?;
    }
    for signer in &unit.signers {
        signers::upsert(&mut tx, signer).await?;
    }
    for field in &unit.fields {
        fields::upsert(&mut tx, field).await?;
    }
    for event in &unit.events {
        audit::insert(&mut tx, event).await?;
    }

    tx.commit().await?;

    tracing::debug!(
        documents = unit.documents.len(),
        signers = unit.signers.len(),
        fields = unit.fields.len(),
        events = unit.events.len(),
        "unit of work committed"
    );
    Ok(())
}

/// Fail with a protocol error when an upsert matched no parent row.
fn expect_one(rows: u64, what: &str) -> Result<(), sqlx::Error> {
    if rows == 1 {
        Ok(())
    } else {
        Err(sqlx::Error::Protocol(format!(
            "{what}: expected one row written, got {rows}"
        )))
    }
}

fn decode_err(what: &str, e: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Protocol(format!("failed to decode {what}: {e}"))
}
