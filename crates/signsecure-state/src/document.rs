//! # Document Lifecycle State Machine
//!
//! ## States
//!
//! ```text
//! Draft ──send──▶ Sent ──(all signers signed)──▶ Completed
//! ```
//!
//! Status only moves forward. `send` is the one externally invokable
//! transition; completion is derived by the signing algorithm in
//! [`crate::signing`] and is never requested directly by a caller.
//!
//! Documents are soft-deleted: `deleted_at` is set and the record stays.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signsecure_core::{DocumentRef, Timestamp, UserId};

/// Maximum title length.
pub const MAX_TITLE_LEN: usize = 255;
/// Maximum file type length.
pub const MAX_FILE_TYPE_LEN: usize = 100;

// ─── Document Status ─────────────────────────────────────────────────

/// Lifecycle status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Being prepared by its owner.
    Draft,
    /// Invitations dispatched, awaiting signatures.
    Sent,
    /// Every signer has signed (terminal).
    Completed,
}

impl DocumentStatus {
    /// Position in the forward-only ordering `draft < sent < completed`.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Sent => 1,
            Self::Completed => 2,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "completed" => Ok(Self::Completed),
            other => Err(DocumentError::UnknownStatus(other.to_string())),
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by document transitions and edits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Attempted transition is not valid from the current status.
    #[error("invalid document transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: DocumentStatus,
        /// Attempted target status.
        to: DocumentStatus,
    },

    /// A document cannot be sent without at least one signer.
    #[error("document has no signers")]
    NoSigners,

    /// The document has been deleted.
    #[error("document is deleted")]
    Deleted,

    /// Edits are only allowed while the document is a draft.
    #[error("document is {status}; only drafts can be edited")]
    NotEditable {
        /// Current status.
        status: DocumentStatus,
    },

    /// Input failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Status string not recognised.
    #[error("unknown document status {0:?}")]
    UnknownStatus(String),
}

// ─── Transition Log ──────────────────────────────────────────────────

/// Record of a document status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTransitionRecord {
    /// Status before the transition.
    pub from_state: DocumentStatus,
    /// Status after the transition.
    pub to_state: DocumentStatus,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Why it occurred.
    pub reason: String,
}

// ─── Document ────────────────────────────────────────────────────────

/// A document with its lifecycle status and transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// External reference.
    pub id: DocumentRef,
    /// Display title.
    pub title: String,
    /// Free-form description, possibly empty.
    pub description: String,
    /// Owning user.
    pub owner: UserId,
    /// Lifecycle status.
    pub status: DocumentStatus,
    /// Reference to the uploaded file in object storage.
    pub file: Option<String>,
    /// MIME type or extension of the uploaded file.
    pub file_type: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub modified_at: Timestamp,
    /// Soft-delete marker.
    pub deleted_at: Option<Timestamp>,
    /// Ordered log of all status transitions.
    pub transitions: Vec<DocumentTransitionRecord>,
}

impl Document {
    /// Create a draft owned by `owner`.
    pub fn new(
        owner: UserId,
        title: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Self, DocumentError> {
        Ok(Self {
            id: DocumentRef::new(),
            title: validate_title(title)?,
            description: description.to_string(),
            owner,
            status: DocumentStatus::Draft,
            file: None,
            file_type: String::new(),
            created_at: now,
            modified_at: now,
            deleted_at: None,
            transitions: Vec::new(),
        })
    }

    /// Dispatch for signing (DRAFT → SENT).
    ///
    /// Rejected with no state change unless the document is a live draft
    /// with at least one signer.
    pub fn send(&mut self, signer_count: usize, now: Timestamp) -> Result<(), DocumentError> {
        self.require_live()?;
        self.require_state(DocumentStatus::Draft, DocumentStatus::Sent)?;
        if signer_count == 0 {
            return Err(DocumentError::NoSigners);
        }
        self.do_transition(DocumentStatus::Sent, "sent for signature", now);
        Ok(())
    }

    /// Mark the document completed (SENT → COMPLETED).
    ///
    /// Only the signing algorithm calls this, after it has established that
    /// no signer remains pending.
    pub(crate) fn complete(&mut self, now: Timestamp) -> Result<(), DocumentError> {
        self.require_state(DocumentStatus::Sent, DocumentStatus::Completed)?;
        self.do_transition(DocumentStatus::Completed, "all signers signed", now);
        Ok(())
    }

    /// Update title and/or description. Drafts only.
    pub fn update_details(
        &mut self,
        title: Option<&str>,
        description: Option<&str>,
        now: Timestamp,
    ) -> Result<(), DocumentError> {
        self.require_editable()?;
        let title = title.map(validate_title).transpose()?;
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description.to_string();
        }
        self.modified_at = now;
        Ok(())
    }

    /// Attach an uploaded file reference. Drafts only.
    pub fn attach_file(
        &mut self,
        file: &str,
        file_type: &str,
        now: Timestamp,
    ) -> Result<(), DocumentError> {
        self.require_editable()?;
        let file = file.trim();
        if file.is_empty() {
            return Err(DocumentError::InvalidInput {
                field: "file",
                reason: "must not be empty".into(),
            });
        }
        if file_type.len() > MAX_FILE_TYPE_LEN {
            return Err(DocumentError::InvalidInput {
                field: "file_type",
                reason: format!("must not exceed {MAX_FILE_TYPE_LEN} characters"),
            });
        }
        self.file = Some(file.to_string());
        self.file_type = file_type.to_string();
        self.modified_at = now;
        Ok(())
    }

    /// Soft-delete. Idempotent: the first deletion time is kept.
    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.modified_at = now;
        }
    }

    /// Whether the document has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether signers may still be added or edited.
    pub fn is_editable(&self) -> bool {
        !self.is_deleted() && self.status == DocumentStatus::Draft
    }

    fn require_live(&self) -> Result<(), DocumentError> {
        if self.is_deleted() {
            return Err(DocumentError::Deleted);
        }
        Ok(())
    }

    /// Fails unless the document is a live draft.
    pub fn require_editable(&self) -> Result<(), DocumentError> {
        self.require_live()?;
        if self.status != DocumentStatus::Draft {
            return Err(DocumentError::NotEditable {
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_state(
        &self,
        expected: DocumentStatus,
        target: DocumentStatus,
    ) -> Result<(), DocumentError> {
        if self.status != expected {
            return Err(DocumentError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: DocumentStatus, reason: &str, now: Timestamp) {
        self.transitions.push(DocumentTransitionRecord {
            from_state: self.status,
            to_state: to,
            timestamp: now,
            reason: reason.to_string(),
        });
        self.status = to;
        self.modified_at = now;
    }
}

fn validate_title(title: &str) -> Result<String, DocumentError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DocumentError::InvalidInput {
            field: "title",
            reason: "must not be empty".into(),
        });
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DocumentError::InvalidInput {
            field: "title",
            reason: format!("must not exceed {MAX_TITLE_LEN} characters"),
        });
    }
    Ok(title.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────
