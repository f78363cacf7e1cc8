//! # Document API
//!
//! Document CRUD, file upload, and dispatch for signature.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use signsecure_core::DocumentRef;
use signsecure_state::document::{MAX_FILE_TYPE_LEN, MAX_TITLE_LEN};
use signsecure_state::DocumentStatus;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_ref, RequestContext, Validate};
use crate::lifecycle;
use crate::state::AppState;
use crate::views::{DocumentDetailView, DocumentView, SendView};

/// Request to create a document.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Validate for CreateDocumentRequest {
    fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)
    }
}

/// Partial update of a draft.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateDocumentRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

/// File reference produced by the upload collaborator.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadRequest {
    /// Storage reference of the uploaded file.
    pub file: String,
    /// MIME type or extension.
    #[serde(default)]
    pub file_type: String,
}

impl Validate for UploadRequest {
    fn validate(&self) -> Result<(), String> {
        if self.file.trim().is_empty() {
            return Err("file must not be empty".to_string());
        }
        if self.file_type.len() > MAX_FILE_TYPE_LEN {
            return Err(format!(
                "file_type must not exceed {MAX_FILE_TYPE_LEN} characters"
            ));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("title must not exceed {MAX_TITLE_LEN} characters"));
    }
    Ok(())
}

/// `?status=` filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentListQuery {
    /// `draft`, `sent` or `completed`.
    pub status: Option<String>,
}

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents", get(list_documents).post(create_document))
        .route(
            "/v1/documents/{ref}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .route("/v1/documents/{ref}/upload", post(upload_document))
        .route(
            "/v1/documents/{ref}/send_for_signature",
            post(send_for_signature),
        )
}

/// POST /v1/documents — Create a draft owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentView),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn create_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    body: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentView>), AppError> {
    let req = extract_validated_json(body)?;
    let document =
        lifecycle::create_document(&state, &caller, &ctx, &req.title, &req.description).await?;
    Ok((StatusCode::CREATED, Json(DocumentView::from(&document))))
}

/// GET /v1/documents — The caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/v1/documents",
    params(DocumentListQuery),
    responses(
        (status = 200, description = "Documents", body = Vec<DocumentView>),
        (status = 422, description = "Unknown status", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<DocumentView>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DocumentStatus>)
        .transpose()?;
    let documents = lifecycle::list_documents(&state, &caller, status);
    Ok(Json(documents.iter().map(DocumentView::from).collect()))
}

/// GET /v1/documents/{ref} — Document with signers, fields and audit trail.
#[utoipa::path(
    get,
    path = "/v1/documents/{ref}",
    params(("ref" = String, Path, description = "Document reference")),
    responses(
        (status = 200, description = "Document found", body = DocumentDetailView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<Json<DocumentDetailView>, AppError> {
    let id: DocumentRef = parse_ref(&reference, "document")?;
    let aggregate = lifecycle::document_detail(&state, &caller, id)?;
    Ok(Json(DocumentDetailView::new(
        &aggregate.document,
        &aggregate.signers,
        &aggregate.fields,
        &aggregate.events,
    )))
}

/// PATCH /v1/documents/{ref} — Update title or description of a draft.
#[utoipa::path(
    patch,
    path = "/v1/documents/{ref}",
    params(("ref" = String, Path, description = "Document reference")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Document updated", body = DocumentView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn update_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
    body: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> Result<Json<DocumentView>, AppError> {
    let id: DocumentRef = parse_ref(&reference, "document")?;
    let req = extract_validated_json(body)?;
    let document = lifecycle::update_document(
        &state,
        &caller,
        id,
        req.title.as_deref(),
        req.description.as_deref(),
    )
    .await?;
    Ok(Json(DocumentView::from(&document)))
}

/// DELETE /v1/documents/{ref} — Soft-delete.
#[utoipa::path(
    delete,
    path = "/v1/documents/{ref}",
    params(("ref" = String, Path, description = "Document reference")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(reference): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: DocumentRef = parse_ref(&reference, "document")?;
    lifecycle::delete_document(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/documents/{ref}/upload — Attach the uploaded file.
#[utoipa::path(
    post,
    path = "/v1/documents/{ref}/upload",
    params(("ref" = String, Path, description = "Document reference")),
    request_body = UploadRequest,
    responses(
        (status = 200, description = "File attached", body = DocumentView),
        (status = 400, description = "Document is not a draft", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn upload_document(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(reference): Path<String>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<DocumentView>, AppError> {
    let id: DocumentRef = parse_ref(&reference, "document")?;
    let req = extract_validated_json(body)?;
    let document =
        lifecycle::upload_file(&state, &caller, &ctx, id, &req.file, &req.file_type).await?;
    Ok(Json(DocumentView::from(&document)))
}

/// POST /v1/documents/{ref}/send_for_signature — Send a draft to its signers.
#[utoipa::path(
    post,
    path = "/v1/documents/{ref}/send_for_signature",
    params(("ref" = String, Path, description = "Document reference")),
    responses(
        (status = 200, description = "Document sent", body = SendView),
        (status = 400, description = "Document is not a draft or has no signers", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 502, description = "Invitation delivery failed", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn send_for_signature(
    State(state): State<AppState>,
    caller: CallerIdentity,
    ctx: RequestContext,
    Path(reference): Path<String>,
) -> Result<Json<SendView>, AppError> {
    let id: DocumentRef = parse_ref(&reference, "document")?;
    let (_, invitations) = lifecycle::send_for_signature(&state, &caller, &ctx, id).await?;
    Ok(Json(SendView {
        status: "document sent for signature".to_string(),
        invitations,
    }))
}
