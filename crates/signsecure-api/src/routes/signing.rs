//! # Signing Link API
//!
//! Endpoints reached through the link mailed to a signer. They carry no
//! platform credentials: the signer token in the path is the only proof of
//! identity, so any failure to resolve it is the same 401.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use signsecure_core::{DocumentRef, FieldRef};

use crate::error::AppError;
use crate::extractors::{extract_json, RequestContext};
use crate::lifecycle;
use crate::state::AppState;
use crate::views::{DocumentView, SignView, SignerView, SigningSessionView};

/// Field values submitted with a signature, keyed by field reference.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SignRequest {
    #[serde(default)]
    pub values: HashMap<Uuid, String>,
}

/// Build the signing link router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/signing/{document}/{token}", get(open_link))
        .route("/v1/signing/{document}/{token}/sign", post(sign_via_link))
}

fn link_document(raw: &str) -> Result<DocumentRef, AppError> {
    raw.parse().map_err(|_| AppError::InvalidSigningLink)
}

/// GET /v1/signing/{document}/{token} — Open a signing link.
#[utoipa::path(
    get,
    path = "/v1/signing/{document}/{token}",
    params(
        ("document" = String, Path, description = "Document reference"),
        ("token" = String, Path, description = "Signer token"),
    ),
    responses(
        (status = 200, description = "Signing session", body = SigningSessionView),
        (status = 401, description = "Invalid or expired link", body = crate::error::ErrorBody),
    ),
    tag = "signing"
)]
pub async fn open_link(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((document, token)): Path<(String, String)>,
) -> Result<Json<SigningSessionView>, AppError> {
    let document_id = link_document(&document)?;
    let session = lifecycle::open_session(&state, &ctx, document_id, &token).await?;
    Ok(Json(SigningSessionView {
        document: DocumentView::from(&session.document),
        signer: SignerView::new(&session.signer, &session.fields),
    }))
}

/// POST /v1/signing/{document}/{token}/sign — Fill fields and sign.
#[utoipa::path(
    post,
    path = "/v1/signing/{document}/{token}/sign",
    params(
        ("document" = String, Path, description = "Document reference"),
        ("token" = String, Path, description = "Signer token"),
    ),
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signed", body = SignView),
        (status = 400, description = "Already signed or required field missing", body = crate::error::ErrorBody),
        (status = 401, description = "Invalid or expired link", body = crate::error::ErrorBody),
    ),
    tag = "signing"
)]
pub async fn sign_via_link(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((document, token)): Path<(String, String)>,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<SignView>, AppError> {
    let document_id = link_document(&document)?;
    let req = extract_json(body)?;
    let values: HashMap<FieldRef, String> = req
        .values
        .into_iter()
        .map(|(k, v)| (FieldRef::from_uuid(k), v))
        .collect();
    let result = lifecycle::sign_session(&state, &ctx, document_id, &token, &values).await?;
    Ok(Json(SignView {
        status: "document signed successfully".to_string(),
        document_status: result.document.status.as_str().to_string(),
        completed: result.completed,
    }))
}
