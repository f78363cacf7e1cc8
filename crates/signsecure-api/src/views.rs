//! # Response Views
//!
//! JSON shapes returned by the API, built from the domain records. Signer
//! tokens never appear in any view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use signsecure_state::{AuditEvent, Document, FormField, Signer};

/// Document without its related records, as listed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: Uuid,
    /// `draft`, `sent` or `completed`.
    pub status: String,
    pub file: Option<String>,
    pub file_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<&Document> for DocumentView {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id.0,
            title: d.title.clone(),
            description: d.description.clone(),
            owner: d.owner.0,
            status: d.status.as_str().to_string(),
            file: d.file.clone(),
            file_type: d.file_type.clone(),
            created_at: d.created_at.into_datetime(),
            modified_at: d.modified_at.into_datetime(),
        }
    }
}

/// Document with signers, fields and audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentDetailView {
    #[serde(flatten)]
    pub document: DocumentView,
    pub signers: Vec<SignerView>,
    pub fields: Vec<FieldView>,
    /// Newest first.
    pub audit_trail: Vec<AuditEventView>,
}

impl DocumentDetailView {
    pub fn new(
        document: &Document,
        signers: &[Signer],
        fields: &[FormField],
        events: &[AuditEvent],
    ) -> Self {
        Self {
            document: document.into(),
            signers: signers.iter().map(|s| SignerView::new(s, fields)).collect(),
            fields: fields.iter().map(FieldView::from).collect(),
            audit_trail: events.iter().map(AuditEventView::from).collect(),
        }
    }
}

/// A signer with the fields assigned to them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignerView {
    pub id: Uuid,
    pub document: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub order: u32,
    /// `pending` or `signed`.
    pub status: String,
    pub signed_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub fields: Vec<FieldView>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl SignerView {
    /// View of `signer`, picking its live fields out of `fields`.
    pub fn new(signer: &Signer, fields: &[FormField]) -> Self {
        Self {
            id: signer.id.0,
            document: signer.document.0,
            email: signer.email.to_string(),
            name: signer.name.clone(),
            role: signer.role.clone(),
            order: signer.order,
            status: signer.status.as_str().to_string(),
            signed_at: signer.signed_at.map(|t| t.into_datetime()),
            viewed_at: signer.viewed_at.map(|t| t.into_datetime()),
            fields: fields
                .iter()
                .filter(|f| f.signer == signer.id && f.is_live())
                .map(FieldView::from)
                .collect(),
            created_at: signer.created_at.into_datetime(),
            modified_at: signer.modified_at.into_datetime(),
        }
    }
}

/// A positioned form field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldView {
    pub id: Uuid,
    pub document: Uuid,
    pub signer: Uuid,
    /// `signature`, `date` or `text`.
    #[serde(rename = "type")]
    pub field_type: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Zero-based page index.
    pub page: u32,
    pub required: bool,
    pub value: Option<String>,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<&FormField> for FieldView {
    fn from(f: &FormField) -> Self {
        Self {
            id: f.id.0,
            document: f.document.0,
            signer: f.signer.0,
            field_type: f.field_type.as_str().to_string(),
            x: f.geometry.x,
            y: f.geometry.y,
            width: f.geometry.width,
            height: f.geometry.height,
            page: f.geometry.page,
            required: f.required,
            value: f.value.clone(),
            label: f.label.clone(),
            created_at: f.created_at.into_datetime(),
            modified_at: f.modified_at.into_datetime(),
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEventView {
    pub id: Uuid,
    pub document: Uuid,
    /// Acting platform user, absent for signer-session actions.
    pub user: Option<Uuid>,
    pub email: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: String,
}

impl From<&AuditEvent> for AuditEventView {
    fn from(e: &AuditEvent) -> Self {
        Self {
            id: e.id.0,
            document: e.document.0,
            user: e.user.map(|u| u.0),
            email: e.email.clone(),
            action: e.action.as_str().to_string(),
            timestamp: e.timestamp.into_datetime(),
            ip_address: e.ip_address.clone(),
            user_agent: e.user_agent.clone(),
        }
    }
}

/// Acknowledgement of an action endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusView {
    pub status: String,
}

impl StatusView {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Result of sending a document for signature.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendView {
    pub status: String,
    /// Invitations delivered.
    pub invitations: usize,
}

/// Result of a signature.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignView {
    pub status: String,
    /// Document status after the signature.
    pub document_status: String,
    /// Whether this signature completed the document.
    pub completed: bool,
}

/// What a signer sees when opening their link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SigningSessionView {
    pub document: DocumentView,
    pub signer: SignerView,
}
