//! # Form Field API
//!
//! Field placement on draft documents.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use signsecure_core::{DocumentRef, FieldRef, SignerRef};
use signsecure_state::field::MAX_LABEL_LEN;
use signsecure_state::{FieldGeometry, FieldLayout, FieldType};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_ref, RequestContext, Validate};
use crate::lifecycle::{self, FieldPatch};
use crate::routes::DocumentFilter;
use crate::state::AppState;
use crate::views::FieldView;

fn default_required() -> bool {
    true
}

/// Request to place a field.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFieldRequest {
    /// Document reference.
    pub document: Uuid,
    /// Assigned signer, on the same document.
    pub signer: Uuid,
    /// `signature`, `date` or `text`.
    #[serde(rename = "type")]
    pub field_type: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub label: String,
}

impl Validate for CreateFieldRequest {
    fn validate(&self) -> Result<(), String> {
        validate_label(&self.label)
    }
}

/// Partial update of a field.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFieldRequest {
    pub signer: Option<Uuid>,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub page: Option<u32>,
    pub required: Option<bool>,
    pub label: Option<String>,
}

impl Validate for UpdateFieldRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.label {
            Some(label) => validate_label(label),
            None => Ok(()),
        }
    }
}

fn validate_label(label: &str) -> Result<(), String> {
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(format!("label must not exceed {MAX_LABEL_LEN} characters"));
    }
    Ok(())
}

/// Build the fields router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/fields", get(list_fields).post(create_field))
        .route(
            "/v1/fields/{ref}",
            get(get_field).patch(update_field).delete(delete_field),
        )
}

/// POST /v1/fields — Place a field on a draft.
#[utoipa::path(
    post,
    path = "/v1/fields",
    request_body = CreateFieldRequest,
    responses(
        (status = 201, description = "Field placed", body = FieldView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "fields"
)]
pub async fn create_field(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<CreateFieldRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FieldView>), AppError> {
    let req = extract_validated_json(body)?;
    let layout = FieldLayout {
        signer: SignerRef::from_uuid(req.signer),
        field_type: req.field_type.parse::<FieldType>()?,
        geometry: FieldGeometry {
            x: req.x,
            y: req.y,
            width: req.width,
            height: req.height,
            page: req.page,
        },
        required: req.required,
        label: req.label,
    };
    let field = lifecycle::add_field(
        &state,
        &caller,
        &ctx,
        DocumentRef::from_uuid(req.document),
        layout,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(FieldView::from(&field))))
}

/// GET /v1/fields — Fields on the caller's documents.
#[utoipa::path(
    get,
    path = "/v1/fields",
    params(DocumentFilter),
    responses(
        (status = 200, description = "Fields", body = Vec<FieldView>),
    ),
    tag = "fields"
)]
pub async fn list_fields(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filter): Query<DocumentFilter>,
) -> Json<Vec<FieldView>> {
    let fields = lifecycle::list_fields(&state, &caller, filter.document());
    Json(fields.iter().map(FieldView::from).collect())
}

/// GET /v1/fields/{ref} — One field.
#[utoipa::path(
    get,
    path = "/v1/fields/{ref}",
    params(("ref" = String, Path, description = "Field reference")),
    responses(
        (status = 200, description = "Field found", body = FieldView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "fields"
)]
pub async fn get_field(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<Json<FieldView>, AppError> {
    let id: FieldRef = parse_ref(&reference, "field")?;
    let field = lifecycle::get_field(&state, &caller, id)?;
    Ok(Json(FieldView::from(&field)))
}

/// PATCH /v1/fields/{ref} — Move, resize or reassign a field on a draft.
#[utoipa::path(
    patch,
    path = "/v1/fields/{ref}",
    params(("ref" = String, Path, description = "Field reference")),
    request_body = UpdateFieldRequest,
    responses(
        (status = 200, description = "Field updated", body = FieldView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "fields"
)]
pub async fn update_field(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
    body: Result<Json<UpdateFieldRequest>, JsonRejection>,
) -> Result<Json<FieldView>, AppError> {
    let id: FieldRef = parse_ref(&reference, "field")?;
    let req = extract_validated_json(body)?;
    let patch = FieldPatch {
        signer: req.signer.map(SignerRef::from_uuid),
        field_type: req
            .field_type
            .as_deref()
            .map(str::parse::<FieldType>)
            .transpose()?,
        x: req.x,
        y: req.y,
        width: req.width,
        height: req.height,
        page: req.page,
        required: req.required,
        label: req.label,
    };
    let field = lifecycle::update_field(&state, &caller, id, patch).await?;
    Ok(Json(FieldView::from(&field)))
}

/// DELETE /v1/fields/{ref} — Remove a field from a draft.
#[utoipa::path(
    delete,
    path = "/v1/fields/{ref}",
    params(("ref" = String, Path, description = "Field reference")),
    responses(
        (status = 204, description = "Field deleted"),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "fields"
)]
pub async fn delete_field(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: FieldRef = parse_ref(&reference, "field")?;
    lifecycle::delete_field(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
