//! # Audit Events
//!
//! Immutable records of lifecycle events. Events are created by the API
//! layer's recorder and never edited afterwards; this module only defines
//! their shape.

use serde::{Deserialize, Serialize};

use signsecure_core::{AuditEventRef, DocumentRef, Timestamp, UserId};

/// Closed set of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Document created by its owner.
    DocumentCreated,
    /// Document sent for signature.
    DocumentSent,
    /// A signer opened the document.
    DocumentViewed,
    /// A signer signed.
    DocumentSigned,
    /// The last pending signer signed.
    DocumentCompleted,
    /// A file was attached.
    DocumentUploaded,
    /// A signer was added.
    SignerAdded,
    /// A field was added.
    FieldAdded,
}

impl AuditAction {
    /// All actions.
    pub const ALL: [AuditAction; 8] = [
        Self::DocumentCreated,
        Self::DocumentSent,
        Self::DocumentViewed,
        Self::DocumentSigned,
        Self::DocumentCompleted,
        Self::DocumentUploaded,
        Self::SignerAdded,
        Self::FieldAdded,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentCreated => "document_created",
            Self::DocumentSent => "document_sent",
            Self::DocumentViewed => "document_viewed",
            Self::DocumentSigned => "document_signed",
            Self::DocumentCompleted => "document_completed",
            Self::DocumentUploaded => "document_uploaded",
            Self::SignerAdded => "signer_added",
            Self::FieldAdded => "field_added",
        }
    }

    /// Inverse of [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// External reference.
    pub id: AuditEventRef,
    /// Document the event concerns.
    pub document: DocumentRef,
    /// Acting platform user, absent for signer-session actions.
    pub user: Option<UserId>,
    /// Acting email address.
    pub email: String,
    /// What happened.
    pub action: AuditAction,
    /// Server-assigned time.
    pub timestamp: Timestamp,
    /// Client address, when known.
    pub ip_address: Option<String>,
    /// Client user agent, possibly empty.
    pub user_agent: String,
}

/// Sort newest first. Equal timestamps fall back to descending reference.
pub fn sort_newest_first(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in AuditAction::ALL {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
        assert_eq!(AuditAction::parse("document_archived"), None);
    }

    #[test]
    fn newest_first() {
        let doc = DocumentRef::new();
        let mk = |secs: i64| AuditEvent {
            id: AuditEventRef::new(),
            document: doc,
            user: None,
            email: "a@example.com".into(),
            action: AuditAction::DocumentViewed,
            timestamp: Timestamp::from_epoch_secs(secs).unwrap(),
            ip_address: None,
            user_agent: String::new(),
        };
        let mut events = vec![mk(1), mk(3), mk(2)];
        sort_newest_first(&mut events);
        let order: Vec<_> = events.iter().map(|e| e.timestamp.epoch_secs()).collect();
        assert_eq!(order, [3, 2, 1]);
    }
}
