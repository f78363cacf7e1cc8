//! # Route Modules
//!
//! One router per resource. Handlers parse the request, call into
//! [`lifecycle`](crate::lifecycle) and render a [`views`](crate::views) type.
//!
//! - `/v1/documents/*` — documents and their lifecycle actions
//! - `/v1/signers/*` — signers, `mark_as_viewed`, `sign_document`
//! - `/v1/fields/*` — form field CRUD
//! - `/v1/audit-trail/*` — read-only audit events
//! - `/v1/signing/*` — signer sessions, authenticated by signer token

pub mod audit_trail;
pub mod documents;
pub mod fields;
pub mod signers;
pub mod signing;

use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use signsecure_core::DocumentRef;

/// `?document=` filter shared by the collection endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentFilter {
    /// Only records of this document.
    pub document: Option<Uuid>,
}

impl DocumentFilter {
    pub fn document(&self) -> Option<DocumentRef> {
        self.document.map(DocumentRef::from_uuid)
    }
}
