//! # Lifecycle Operations
//!
//! Every operation the API exposes, independent of HTTP. Handlers parse
//! requests and render responses; everything between lives here.
//!
//! Each mutating operation follows the same shape:
//!
//! 1. Acquire the document's lock from [`DocumentLocks`](crate::state::DocumentLocks).
//! 2. Re-read the records under the lock and authorize the caller.
//! 3. Compute the new records on clones via `signsecure-state`.
//! 4. Apply the token re-issuance policy to every signer being saved.
//! 5. Record the audit events and commit everything as one
//!    [`UnitOfWork`].
//!
//! A failure at any step before the commit leaves no trace.

use std::collections::HashMap;

use signsecure_core::{AuditEventRef, DocumentRef, Email, FieldRef, SignerRef, Timestamp, UserId};
use signsecure_state::signing::{self, live_signer_count};
use signsecure_state::{
    AuditAction, AuditEvent, Document, DocumentStatus, FieldGeometry, FieldLayout, FieldType,
    FormField, RequiredFields, Signer, SignerDetails, SignerError,
};

use crate::audit::Actor;
use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::RequestContext;
use crate::policy::Resource;
use crate::state::{AppState, DocumentGuard, UnitOfWork};

// -- Results -------------------------------------------------------------------

/// A document with everything attached to it.
#[derive(Debug, Clone)]
pub struct DocumentAggregate {
    pub document: Document,
    /// Live signers, in `order`.
    pub signers: Vec<Signer>,
    /// Live fields.
    pub fields: Vec<FormField>,
    /// Audit trail, newest first.
    pub events: Vec<AuditEvent>,
}

/// Outcome of a signature.
#[derive(Debug, Clone)]
pub struct SignResult {
    pub document: Document,
    pub signer: Signer,
    pub completed: bool,
}

/// What a signer sees through their link.
#[derive(Debug, Clone)]
pub struct SigningSession {
    pub document: Document,
    pub signer: Signer,
    /// The signer's live fields.
    pub fields: Vec<FormField>,
}

/// Partial update of a signer. Absent members keep their value.
#[derive(Debug, Clone, Default)]
pub struct SignerPatch {
    pub email: Option<Email>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub order: Option<u32>,
}

impl SignerPatch {
    fn apply(self, signer: &Signer) -> SignerDetails {
        SignerDetails {
            email: self.email.unwrap_or_else(|| signer.email.clone()),
            name: self.name.unwrap_or_else(|| signer.name.clone()),
            role: self.role.unwrap_or_else(|| signer.role.clone()),
            order: self.order.unwrap_or(signer.order),
        }
    }
}

/// Partial update of a field's layout. Absent members keep their value.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub signer: Option<SignerRef>,
    pub field_type: Option<FieldType>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub page: Option<u32>,
    pub required: Option<bool>,
    pub label: Option<String>,
}

impl FieldPatch {
    fn apply(self, field: &FormField) -> FieldLayout {
        FieldLayout {
            signer: self.signer.unwrap_or(field.signer),
            field_type: self.field_type.unwrap_or(field.field_type),
            geometry: FieldGeometry {
                x: self.x.unwrap_or(field.geometry.x),
                y: self.y.unwrap_or(field.geometry.y),
                width: self.width.unwrap_or(field.geometry.width),
                height: self.height.unwrap_or(field.geometry.height),
                page: self.page.unwrap_or(field.geometry.page),
            },
            required: self.required.unwrap_or(field.required),
            label: self.label.unwrap_or_else(|| field.label.clone()),
        }
    }
}

// -- Lookups ---------------------------------------------------------------------

fn live_document(state: &AppState, id: DocumentRef) -> Option<Document> {
    state.document(id).filter(|d| !d.is_deleted())
}

fn not_found(kind: &str) -> AppError {
    AppError::NotFound(kind.to_string())
}

fn readable_document(
    state: &AppState,
    caller: &CallerIdentity,
    id: DocumentRef,
) -> Result<Document, AppError> {
    let document = live_document(state, id).ok_or_else(|| not_found("document"))?;
    state.policy.authorize_read(caller, Resource::Document(&document))?;
    Ok(document)
}

fn writable_document(
    state: &AppState,
    caller: &CallerIdentity,
    id: DocumentRef,
) -> Result<Document, AppError> {
    let document = live_document(state, id).ok_or_else(|| not_found("document"))?;
    state.policy.authorize_write(caller, Resource::Document(&document))?;
    Ok(document)
}

/// A live signer and its live document.
fn signer_and_document(state: &AppState, id: SignerRef) -> Result<(Signer, Document), AppError> {
    let signer = state
        .signers
        .get(id.as_uuid())
        .filter(|s| s.deleted_at.is_none())
        .ok_or_else(|| not_found("signer"))?;
    let document = live_document(state, signer.document).ok_or_else(|| not_found("signer"))?;
    Ok((signer, document))
}

fn field_and_document(state: &AppState, id: FieldRef) -> Result<(FormField, Document), AppError> {
    let field = state
        .fields
        .get(id.as_uuid())
        .filter(FormField::is_live)
        .ok_or_else(|| not_found("field"))?;
    let document = live_document(state, field.document).ok_or_else(|| not_found("field"))?;
    Ok((field, document))
}

/// Lock the document a signer belongs to. Signers never change documents,
/// so the reference read before locking stays valid.
async fn lock_signer_document(
    state: &AppState,
    id: SignerRef,
) -> Result<DocumentGuard, AppError> {
    let document = state
        .signers
        .get(id.as_uuid())
        .map(|s| s.document)
        .ok_or_else(|| not_found("signer"))?;
    Ok(state.locks.acquire(document).await)
}

async fn lock_field_document(
    state: &AppState,
    id: FieldRef,
) -> Result<DocumentGuard, AppError> {
    let document = state
        .fields
        .get(id.as_uuid())
        .map(|f| f.document)
        .ok_or_else(|| not_found("field"))?;
    Ok(state.locks.acquire(document).await)
}

fn owner_actor(caller: &CallerIdentity) -> Actor {
    Actor {
        user: Some(caller.user_id),
        email: caller.email.to_string(),
    }
}

/// Reissue the signer's token when it is absent or no longer valid.
fn refresh_token(state: &AppState, signer: &mut Signer, now: Timestamp) -> Result<(), AppError> {
    if let Some(token) = state.tokens.refresh(
        signer.token.as_deref(),
        signer.id,
        signer.document,
        &signer.email,
        now,
    )? {
        tracing::debug!(signer = %signer.id.short(), "signer token issued");
        signer.set_token(token, now);
    }
    Ok(())
}

/// The assigned signer must be live and on the same document.
fn check_assignee(
    state: &AppState,
    document: &Document,
    signer: SignerRef,
) -> Result<(), AppError> {
    match state.signers.get(signer.as_uuid()) {
        Some(s) if s.document == document.id && s.deleted_at.is_none() => Ok(()),
        _ => Err(AppError::Validation(
            "signer does not belong to this document".to_string(),
        )),
    }
}

// -- Documents ---------------------------------------------------------------------

/// Create a draft owned by the caller.
pub async fn create_document(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    title: &str,
    description: &str,
) -> Result<Document, AppError> {
    let now = state.recorder.tick();
    let document = Document::new(caller.user_id, title, description, now)?;
    let _guard = state.locks.acquire(document.id).await;

    let event = state.recorder.record(
        document.id,
        AuditAction::DocumentCreated,
        &owner_actor(caller),
        ctx,
    );
    state
        .commit(UnitOfWork {
            documents: vec![document.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;

    tracing::info!(document = %document.id.short(), "document created");
    Ok(document)
}

/// The caller's live documents, newest first.
pub fn list_documents(
    state: &AppState,
    caller: &CallerIdentity,
    status: Option<DocumentStatus>,
) -> Vec<Document> {
    let mut documents = state.documents.filter(|d| {
        !d.is_deleted()
            && state.policy.can_read(Some(caller), Resource::Document(d))
            && status.map_or(true, |s| d.status == s)
    });
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    documents
}

/// A document with its signers, fields and audit trail.
pub fn document_detail(
    state: &AppState,
    caller: &CallerIdentity,
    id: DocumentRef,
) -> Result<DocumentAggregate, AppError> {
    let document = readable_document(state, caller, id)?;
    Ok(DocumentAggregate {
        signers: state.signers_of(id),
        fields: state.fields_of(id),
        events: state.events_of(id),
        document,
    })
}

/// Update title and/or description of a draft.
pub async fn update_document(
    state: &AppState,
    caller: &CallerIdentity,
    id: DocumentRef,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<Document, AppError> {
    let _guard = state.locks.acquire(id).await;
    let mut document = writable_document(state, caller, id)?;
    let now = state.recorder.tick();
    document.update_details(title, description, now)?;

    state
        .commit(UnitOfWork {
            documents: vec![document.clone()],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(document)
}

/// Soft-delete a document. Its signers and fields become unreachable.
pub async fn delete_document(
    state: &AppState,
    caller: &CallerIdentity,
    id: DocumentRef,
) -> Result<(), AppError> {
    let _guard = state.locks.acquire(id).await;
    let mut document = writable_document(state, caller, id)?;
    document.soft_delete(state.recorder.tick());

    state
        .commit(UnitOfWork {
            documents: vec![document],
            ..UnitOfWork::new()
        })
        .await?;
    tracing::info!(document = %id.short(), "document deleted");
    Ok(())
}

/// Attach an uploaded file reference to a draft.
pub async fn upload_file(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    id: DocumentRef,
    file: &str,
    file_type: &str,
) -> Result<Document, AppError> {
    let _guard = state.locks.acquire(id).await;
    let mut document = writable_document(state, caller, id)?;
    let now = state.recorder.tick();
    document.attach_file(file, file_type, now)?;

    let event = state.recorder.record(
        id,
        AuditAction::DocumentUploaded,
        &owner_actor(caller),
        ctx,
    );
    state
        .commit(UnitOfWork {
            documents: vec![document.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(document)
}

/// Move a draft to `sent`, make sure every signer holds a valid token, and
/// dispatch the invitations.
///
/// The state change is committed before dispatch. A delivery failure is
/// returned as an error but does not undo the commit.
pub async fn send_for_signature(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    id: DocumentRef,
) -> Result<(Document, usize), AppError> {
    let (document, signers) = {
        let _guard = state.locks.acquire(id).await;
        let mut document = writable_document(state, caller, id)?;
        let mut signers = state.signers_of(id);
        let now = state.recorder.tick();
        document.send(live_signer_count(&document, &signers), now)?;

        for signer in &mut signers {
            refresh_token(state, signer, now)?;
        }

        let event = state.recorder.record(
            id,
            AuditAction::DocumentSent,
            &owner_actor(caller),
            ctx,
        );
        state
            .commit(UnitOfWork {
                documents: vec![document.clone()],
                signers: signers.clone(),
                events: vec![event],
                ..UnitOfWork::new()
            })
            .await?;
        (document, signers)
    };

    tracing::info!(
        document = %id.short(),
        signers = signers.len(),
        "document sent for signature"
    );
    let delivered = state.dispatcher.notify_signers(&document, &signers).await?;
    Ok((document, delivered))
}

// -- Signers -----------------------------------------------------------------------

/// Add a signer to a draft.
pub async fn add_signer(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    document_id: DocumentRef,
    details: SignerDetails,
) -> Result<Signer, AppError> {
    let _guard = state.locks.acquire(document_id).await;
    let document = writable_document(state, caller, document_id)?;
    document.require_editable()?;

    let now = state.recorder.tick();
    let mut signer = Signer::new(document.id, details, now)?;
    refresh_token(state, &mut signer, now)?;

    let event = state.recorder.record(
        document.id,
        AuditAction::SignerAdded,
        &owner_actor(caller),
        ctx,
    );
    state
        .commit(UnitOfWork {
            signers: vec![signer.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;

    tracing::info!(
        document = %document.id.short(),
        signer = %signer.id.short(),
        "signer added"
    );
    Ok(signer)
}

/// Live signers on the caller's documents, optionally for one document.
pub fn list_signers(
    state: &AppState,
    caller: &CallerIdentity,
    document: Option<DocumentRef>,
) -> Vec<Signer> {
    let mut signers = state.signers.filter(|s| {
        s.deleted_at.is_none()
            && document.map_or(true, |d| s.document == d)
            && live_document(state, s.document).is_some_and(|d| {
                state
                    .policy
                    .can_read(Some(caller), Resource::Signer { signer: s, document: &d })
            })
    });
    signers.sort_by(|a, b| {
        a.document
            .cmp(&b.document)
            .then(a.order.cmp(&b.order))
            .then(a.created_at.cmp(&b.created_at))
    });
    signers
}

/// One signer on a caller-owned document.
pub fn get_signer(
    state: &AppState,
    caller: &CallerIdentity,
    id: SignerRef,
) -> Result<Signer, AppError> {
    let (signer, document) = signer_and_document(state, id)?;
    state.policy.authorize_read(
        caller,
        Resource::Signer {
            signer: &signer,
            document: &document,
        },
    )?;
    Ok(signer)
}

/// Edit a pending signer on a draft. An email change invalidates the
/// signer's token and a new one is issued.
pub async fn update_signer(
    state: &AppState,
    caller: &CallerIdentity,
    id: SignerRef,
    patch: SignerPatch,
) -> Result<Signer, AppError> {
    let _guard = lock_signer_document(state, id).await?;
    let (mut signer, document) = signer_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Signer {
            signer: &signer,
            document: &document,
        },
    )?;
    document.require_editable()?;

    let now = state.recorder.tick();
    let details = patch.apply(&signer);
    signer.update(details, now)?;
    refresh_token(state, &mut signer, now)?;

    state
        .commit(UnitOfWork {
            signers: vec![signer.clone()],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(signer)
}

/// Soft-delete a signer on a draft, together with its fields.
pub async fn delete_signer(
    state: &AppState,
    caller: &CallerIdentity,
    id: SignerRef,
) -> Result<(), AppError> {
    let _guard = lock_signer_document(state, id).await?;
    let (mut signer, document) = signer_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Signer {
            signer: &signer,
            document: &document,
        },
    )?;
    document.require_editable()?;

    let now = state.recorder.tick();
    signer.soft_delete(now);
    let fields: Vec<FormField> = state
        .fields_of(document.id)
        .into_iter()
        .filter(|f| f.signer == id)
        .map(|mut f| {
            f.soft_delete(now);
            f
        })
        .collect();

    state
        .commit(UnitOfWork {
            signers: vec![signer],
            fields,
            ..UnitOfWork::new()
        })
        .await?;
    Ok(())
}

/// Record that the signer opened the document. Last call wins.
pub async fn mark_viewed(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    id: SignerRef,
) -> Result<Signer, AppError> {
    let _guard = lock_signer_document(state, id).await?;
    let (mut signer, document) = signer_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Signer {
            signer: &signer,
            document: &document,
        },
    )?;

    let now = state.recorder.tick();
    signer.mark_viewed(now);
    refresh_token(state, &mut signer, now)?;

    let actor = Actor {
        user: Some(caller.user_id),
        email: signer.email.to_string(),
    };
    let event = state
        .recorder
        .record(document.id, AuditAction::DocumentViewed, &actor, ctx);
    state
        .commit(UnitOfWork {
            signers: vec![signer.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(signer)
}

/// Sign on behalf of a signer, from the owner's side. Field values are not
/// collected here, so required fields are not enforced.
pub async fn sign_as_owner(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    id: SignerRef,
) -> Result<SignResult, AppError> {
    let _guard = lock_signer_document(state, id).await?;
    let (signer, document) = signer_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Signer {
            signer: &signer,
            document: &document,
        },
    )?;

    apply_sign(
        state,
        &document,
        &signer,
        &HashMap::new(),
        RequiredFields::Ignore,
        Some(caller.user_id),
        ctx,
    )
    .await
}

/// Shared tail of both signing paths. The document lock must be held.
async fn apply_sign(
    state: &AppState,
    document: &Document,
    signer: &Signer,
    values: &HashMap<FieldRef, String>,
    required: RequiredFields,
    user: Option<UserId>,
    ctx: &RequestContext,
) -> Result<SignResult, AppError> {
    if signer.is_signed() {
        return Err(SignerError::AlreadySigned.into());
    }

    let signers = state.signers_of(document.id);
    let fields = state.fields_of(document.id);
    let now = state.recorder.tick();
    let outcome = signing::sign(document, &signers, &fields, signer.id, values, required, now)?;

    let mut signed = outcome.signer;
    refresh_token(state, &mut signed, now)?;

    let actor = Actor {
        user,
        email: signed.email.to_string(),
    };
    let mut events = vec![state.recorder.record(
        document.id,
        AuditAction::DocumentSigned,
        &actor,
        ctx,
    )];
    let mut documents = Vec::new();
    if outcome.completed {
        events.push(state.recorder.record(
            document.id,
            AuditAction::DocumentCompleted,
            &actor,
            ctx,
        ));
        documents.push(outcome.document.clone());
    }

    state
        .commit(UnitOfWork {
            documents,
            signers: vec![signed.clone()],
            fields: outcome.fields,
            events,
        })
        .await?;

    tracing::info!(
        document = %document.id.short(),
        signer = %signed.id.short(),
        completed = outcome.completed,
        "document signed"
    );
    Ok(SignResult {
        document: outcome.document,
        signer: signed,
        completed: outcome.completed,
    })
}

// -- Form fields ---------------------------------------------------------------------

/// Place a field on a draft.
pub async fn add_field(
    state: &AppState,
    caller: &CallerIdentity,
    ctx: &RequestContext,
    document_id: DocumentRef,
    layout: FieldLayout,
) -> Result<FormField, AppError> {
    let _guard = state.locks.acquire(document_id).await;
    let document = writable_document(state, caller, document_id)?;
    document.require_editable()?;
    check_assignee(state, &document, layout.signer)?;

    let now = state.recorder.tick();
    let field = FormField::new(document.id, layout, now)?;
    let event = state.recorder.record(
        document.id,
        AuditAction::FieldAdded,
        &owner_actor(caller),
        ctx,
    );
    state
        .commit(UnitOfWork {
            fields: vec![field.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(field)
}

/// Live fields on the caller's documents, optionally for one document.
pub fn list_fields(
    state: &AppState,
    caller: &CallerIdentity,
    document: Option<DocumentRef>,
) -> Vec<FormField> {
    let mut fields = state.fields.filter(|f| {
        f.is_live()
            && document.map_or(true, |d| f.document == d)
            && live_document(state, f.document).is_some_and(|d| {
                state
                    .policy
                    .can_read(Some(caller), Resource::Field { field: f, document: &d })
            })
    });
    fields.sort_by(|a, b| {
        a.document
            .cmp(&b.document)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    fields
}

/// One field on a caller-owned document.
pub fn get_field(
    state: &AppState,
    caller: &CallerIdentity,
    id: FieldRef,
) -> Result<FormField, AppError> {
    let (field, document) = field_and_document(state, id)?;
    state.policy.authorize_read(
        caller,
        Resource::Field {
            field: &field,
            document: &document,
        },
    )?;
    Ok(field)
}

/// Change a field's layout on a draft.
pub async fn update_field(
    state: &AppState,
    caller: &CallerIdentity,
    id: FieldRef,
    patch: FieldPatch,
) -> Result<FormField, AppError> {
    let _guard = lock_field_document(state, id).await?;
    let (mut field, document) = field_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Field {
            field: &field,
            document: &document,
        },
    )?;
    document.require_editable()?;

    let layout = patch.apply(&field);
    check_assignee(state, &document, layout.signer)?;
    field.relayout(layout, state.recorder.tick())?;

    state
        .commit(UnitOfWork {
            fields: vec![field.clone()],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(field)
}

/// Soft-delete a field on a draft.
pub async fn delete_field(
    state: &AppState,
    caller: &CallerIdentity,
    id: FieldRef,
) -> Result<(), AppError> {
    let _guard = lock_field_document(state, id).await?;
    let (mut field, document) = field_and_document(state, id)?;
    state.policy.authorize_write(
        caller,
        Resource::Field {
            field: &field,
            document: &document,
        },
    )?;
    document.require_editable()?;

    field.soft_delete(state.recorder.tick());
    state
        .commit(UnitOfWork {
            fields: vec![field],
            ..UnitOfWork::new()
        })
        .await?;
    Ok(())
}

// -- Audit trail ---------------------------------------------------------------------

/// Audit events on the caller's documents, newest first.
pub fn list_audit_events(
    state: &AppState,
    caller: &CallerIdentity,
    document: Option<DocumentRef>,
) -> Vec<AuditEvent> {
    let mut events = state.audit_events.filter(|e| {
        document.map_or(true, |d| e.document == d)
            && live_document(state, e.document).is_some_and(|d| {
                state
                    .policy
                    .can_read(Some(caller), Resource::AuditEvent { event: e, document: &d })
            })
    });
    signsecure_state::audit::sort_newest_first(&mut events);
    events
}

/// One audit event on a caller-owned document.
pub fn get_audit_event(
    state: &AppState,
    caller: &CallerIdentity,
    id: AuditEventRef,
) -> Result<AuditEvent, AppError> {
    let event = state
        .audit_events
        .get(id.as_uuid())
        .ok_or_else(|| not_found("audit event"))?;
    let document = live_document(state, event.document).ok_or_else(|| not_found("audit event"))?;
    state.policy.authorize_read(
        caller,
        Resource::AuditEvent {
            event: &event,
            document: &document,
        },
    )?;
    Ok(event)
}

// -- Signing sessions ----------------------------------------------------------------

/// Resolve a signing link to its document and signer.
///
/// Every failure is the same [`AppError::InvalidSigningLink`].
fn verify_link(
    state: &AppState,
    document_id: DocumentRef,
    token: &str,
) -> Result<(Document, Signer), AppError> {
    let claims = state
        .tokens
        .decode(token)
        .ok_or(AppError::InvalidSigningLink)?;
    if claims.document_id != document_id {
        tracing::debug!(document = %document_id.short(), "signing link for another document");
        return Err(AppError::InvalidSigningLink);
    }
    let signer = state
        .signers
        .get(claims.signer_id.as_uuid())
        .filter(|s| s.deleted_at.is_none() && s.document == document_id)
        .ok_or(AppError::InvalidSigningLink)?;
    if signer.token.as_deref() != Some(token) || signer.email.as_str() != claims.email {
        tracing::debug!(signer = %signer.id.short(), "superseded signing link");
        return Err(AppError::InvalidSigningLink);
    }
    let document = live_document(state, document_id).ok_or(AppError::InvalidSigningLink)?;
    Ok((document, signer))
}

/// Open a signing link: records the view and returns what the signer needs.
pub async fn open_session(
    state: &AppState,
    ctx: &RequestContext,
    document_id: DocumentRef,
    token: &str,
) -> Result<SigningSession, AppError> {
    let _guard = state.locks.acquire(document_id).await;
    let (document, mut signer) = verify_link(state, document_id, token)?;

    let now = state.recorder.tick();
    signer.mark_viewed(now);
    refresh_token(state, &mut signer, now)?;

    let actor = Actor {
        user: None,
        email: signer.email.to_string(),
    };
    let event = state
        .recorder
        .record(document_id, AuditAction::DocumentViewed, &actor, ctx);
    state
        .commit(UnitOfWork {
            signers: vec![signer.clone()],
            events: vec![event],
            ..UnitOfWork::new()
        })
        .await?;

    let fields = state
        .fields_of(document_id)
        .into_iter()
        .filter(|f| f.signer == signer.id)
        .collect();
    Ok(SigningSession {
        document,
        signer,
        fields,
    })
}

/// Submit field values and sign through a signing link.
pub async fn sign_session(
    state: &AppState,
    ctx: &RequestContext,
    document_id: DocumentRef,
    token: &str,
    values: &HashMap<FieldRef, String>,
) -> Result<SignResult, AppError> {
    let _guard = state.locks.acquire(document_id).await;
    let (document, signer) = verify_link(state, document_id, token)?;
    apply_sign(
        state,
        &document,
        &signer,
        values,
        RequiredFields::Enforce,
        None,
        ctx,
    )
    .await
}
