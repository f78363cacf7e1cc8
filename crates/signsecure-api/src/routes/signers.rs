//! # Signer API
//!
//! Signer CRUD plus the owner-side `mark_as_viewed` and `sign_document`
//! actions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use signsecure_core::{DocumentRef, Email, SignerRef};
use signsecure_state::signer::{MAX_NAME_LEN, MAX_ROLE_LEN};
use signsecure_state::{Signer, SignerDetails};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_ref, RequestContext, Validate};
use crate::lifecycle::{self, SignerPatch};
use crate::routes::DocumentFilter;
use crate::state::AppState;
use crate::views::{SignView, SignerView, StatusView};

/// Request to add a signer to a draft.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSignerRequest {
    /// Document reference.
    pub document: Uuid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    /// Display position, ascending.
    #[serde(default)]
    pub order: u32,
}

impl Validate for CreateSignerRequest {
    fn validate(&self) -> Result<(), String> {
        validate_name(&self.name)?;
        validate_role(&self.role)
    }
}

/// Partial update of a signer.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSignerRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub order: Option<u32>,
}

impl Validate for UpdateSignerRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(role) = &self.role {
            validate_role(role)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("name must not exceed {MAX_NAME_LEN} characters"));
    }
    Ok(())
}

fn validate_role(role: &str) -> Result<(), String> {
    if role.chars().count() > MAX_ROLE_LEN {
        return Err(format!("role must not exceed {MAX_ROLE_LEN} characters"));
    }
    Ok(())
}

/// Build the signers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/signers", get(list_signers).post(create_signer))
        .route(
            "/v1/signers/{ref}",
            get(get_signer).patch(update_signer).delete(delete_signer),
        )
        .route("/v1/signers/{ref}/mark_as_viewed", post(mark_as_viewed))
        .route("/v1/signers/{ref}/sign_document", post(sign_document))
}

fn signer_view(state: &AppState, signer: &Signer) -> SignerView {
    SignerView::new(signer, &state.fields_of(signer.document))
}

/// POST /v1/signers — Add a signer to a draft.
#[utoipa::path(
    post,
    path = "/v1/signers",
    request_body = CreateSignerRequest,
    responses(
        (status = 201, description = "Signer added", body = SignerView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn create_signer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<CreateSignerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignerView>), AppError> {
    let req = extract_validated_json(body)?;
    let details = SignerDetails {
        email: Email::parse(&req.email)?,
        name: req.name,
        role: req.role,
        order: req.order,
    };
    let signer = lifecycle::add_signer(
        &state,
        &caller,
        &ctx,
        DocumentRef::from_uuid(req.document),
        details,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(signer_view(&state, &signer))))
}

/// GET /v1/signers — Signers on the caller's documents.
#[utoipa::path(
    get,
    path = "/v1/signers",
    params(DocumentFilter),
    responses(
        (status = 200, description = "Signers", body = Vec<SignerView>),
    ),
    tag = "signers"
)]
pub async fn list_signers(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filter): Query<DocumentFilter>,
) -> Json<Vec<SignerView>> {
    let signers = lifecycle::list_signers(&state, &caller, filter.document());
    Json(signers.iter().map(|s| signer_view(&state, s)).collect())
}

/// GET /v1/signers/{ref} — One signer.
#[utoipa::path(
    get,
    path = "/v1/signers/{ref}",
    params(("ref" = String, Path, description = "Signer reference")),
    responses(
        (status = 200, description = "Signer found", body = SignerView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn get_signer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<Json<SignerView>, AppError> {
    let id: SignerRef = parse_ref(&reference, "signer")?;
    let signer = lifecycle::get_signer(&state, &caller, id)?;
    Ok(Json(signer_view(&state, &signer)))
}

/// PATCH /v1/signers/{ref} — Edit a pending signer on a draft.
#[utoipa::path(
    patch,
    path = "/v1/signers/{ref}",
    params(("ref" = String, Path, description = "Signer reference")),
    request_body = UpdateSignerRequest,
    responses(
        (status = 200, description = "Signer updated", body = SignerView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn update_signer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
    body: Result<Json<UpdateSignerRequest>, JsonRejection>,
) -> Result<Json<SignerView>, AppError> {
    let id: SignerRef = parse_ref(&reference, "signer")?;
    let req = extract_validated_json(body)?;
    let patch = SignerPatch {
        email: req.email.as_deref().map(Email::parse).transpose()?,
        name: req.name,
        role: req.role,
        order: req.order,
    };
    let signer = lifecycle::update_signer(&state, &caller, id, patch).await?;
    Ok(Json(signer_view(&state, &signer)))
}

/// DELETE /v1/signers/{ref} — Remove a signer and its fields from a draft.
#[utoipa::path(
    delete,
    path = "/v1/signers/{ref}",
    params(("ref" = String, Path, description = "Signer reference")),
    responses(
        (status = 204, description = "Signer deleted"),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn delete_signer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: SignerRef = parse_ref(&reference, "signer")?;
    lifecycle::delete_signer(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/signers/{ref}/mark_as_viewed — Record that the signer opened the document.
#[utoipa::path(
    post,
    path = "/v1/signers/{ref}/mark_as_viewed",
    params(("ref" = String, Path, description = "Signer reference")),
    responses(
        (status = 200, description = "Marked as viewed", body = StatusView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn mark_as_viewed(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(reference): Path<String>,
) -> Result<Json<StatusView>, AppError> {
    let id: SignerRef = parse_ref(&reference, "signer")?;
    lifecycle::mark_viewed(&state, &caller, &ctx, id).await?;
    Ok(Json(StatusView::new("document marked as viewed")))
}

/// POST /v1/signers/{ref}/sign_document — Sign on the signer's behalf.
#[utoipa::path(
    post,
    path = "/v1/signers/{ref}/sign_document",
    params(("ref" = String, Path, description = "Signer reference")),
    responses(
        (status = 200, description = "Signed", body = SignView),
        (status = 400, description = "Already signed or document not sent", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "signers"
)]
pub async fn sign_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(reference): Path<String>,
) -> Result<Json<SignView>, AppError> {
    let id: SignerRef = parse_ref(&reference, "signer")?;
    let result = lifecycle::sign_as_owner(&state, &caller, &ctx, id).await?;
    Ok(Json(SignView {
        status: "document signed successfully".to_string(),
        document_status: result.document.status.as_str().to_string(),
        completed: result.completed,
    }))
}
