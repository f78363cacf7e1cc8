//! # Audit Trail API
//!
//! Read-only access to the audit events of the caller's documents.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use signsecure_core::AuditEventRef;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::parse_ref;
use crate::lifecycle;
use crate::routes::DocumentFilter;
use crate::state::AppState;
use crate::views::AuditEventView;

/// Build the audit trail router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit-trail", get(list_events))
        .route("/v1/audit-trail/{ref}", get(get_event))
}

/// GET /v1/audit-trail — Events on the caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit-trail",
    params(DocumentFilter),
    responses(
        (status = 200, description = "Audit events", body = Vec<AuditEventView>),
    ),
    tag = "audit-trail"
)]
pub async fn list_events(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filter): Query<DocumentFilter>,
) -> Json<Vec<AuditEventView>> {
    let events = lifecycle::list_audit_events(&state, &caller, filter.document());
    Json(events.iter().map(AuditEventView::from).collect())
}

/// GET /v1/audit-trail/{ref} — One event.
#[utoipa::path(
    get,
    path = "/v1/audit-trail/{ref}",
    params(("ref" = String, Path, description = "Audit event reference")),
    responses(
        (status = 200, description = "Event found", body = AuditEventView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "audit-trail"
)]
pub async fn get_event(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<Json<AuditEventView>, AppError> {
    let id: AuditEventRef = parse_ref(&reference, "audit event")?;
    let event = lifecycle::get_audit_event(&state, &caller, id)?;
    Ok(Json(AuditEventView::from(&event)))
}
