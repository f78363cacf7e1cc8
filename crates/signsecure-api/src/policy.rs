//! # Access Policy
//!
//! Who may read or mutate a record.
//!
//! - **Read**: the caller owns the parent document. Signers, fields and
//!   audit events are read through their document.
//! - **Write**: the caller owns the document directly. Audit events are
//!   never writable.
//! - Unauthenticated callers are always denied.
//!
//! Denials surface as 404, identical to a missing record.

use signsecure_state::{AuditEvent, Document, FormField, Signer};

use crate::auth::CallerIdentity;
use crate::error::AppError;

/// A record under access control, paired with its parent document.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A document.
    Document(&'a Document),
    /// A signer on `document`.
    Signer {
        signer: &'a Signer,
        document: &'a Document,
    },
    /// A field on `document`.
    Field {
        field: &'a FormField,
        document: &'a Document,
    },
    /// An audit event on `document`.
    AuditEvent {
        event: &'a AuditEvent,
        document: &'a Document,
    },
}

impl<'a> Resource<'a> {
    /// The document this resource belongs to, if the pairing is consistent.
    fn parent(&self) -> Option<&'a Document> {
        match *self {
            Self::Document(d) => Some(d),
            Self::Signer { signer, document } => (signer.document == document.id).then_some(document),
            Self::Field { field, document } => (field.document == document.id).then_some(document),
            Self::AuditEvent { event, document } => {
                (event.document == document.id).then_some(document)
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::Signer { .. } => "signer",
            Self::Field { .. } => "field",
            Self::AuditEvent { .. } => "audit event",
        }
    }
}

/// Ownership-based access policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    /// Whether `caller` may read `resource`.
    pub fn can_read(&self, caller: Option<&CallerIdentity>, resource: Resource<'_>) -> bool {
        match (caller, resource.parent()) {
            (Some(caller), Some(document)) => document.owner == caller.user_id,
            _ => false,
        }
    }

    /// Whether `caller` may mutate `resource`.
    pub fn can_write(&self, caller: Option<&CallerIdentity>, resource: Resource<'_>) -> bool {
        if matches!(resource, Resource::AuditEvent { .. }) {
            return false;
        }
        self.can_read(caller, resource)
    }

    /// [`can_read`](Self::can_read), mapping denial to 404.
    pub fn authorize_read(
        &self,
        caller: &CallerIdentity,
        resource: Resource<'_>,
    ) -> Result<(), AppError> {
        if self.can_read(Some(caller), resource) {
            Ok(())
        } else {
            Err(self.deny(caller, resource, "read"))
        }
    }

    /// [`can_write`](Self::can_write), mapping denial to 404.
    pub fn authorize_write(
        &self,
        caller: &CallerIdentity,
        resource: Resource<'_>,
    ) -> Result<(), AppError> {
        if self.can_write(Some(caller), resource) {
            Ok(())
        } else {
            Err(self.deny(caller, resource, "write"))
        }
    }

    fn deny(&self, caller: &CallerIdentity, resource: Resource<'_>, mode: &str) -> AppError {
        tracing::debug!(
            user = %caller.user_id.short(),
            kind = resource.kind(),
            mode,
            "access denied"
        );
        AppError::NotFound(resource.kind().to_string())
    }
}
