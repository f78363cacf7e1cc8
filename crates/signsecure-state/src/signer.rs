//! # Signer State Machine
//!
//! ```text
//! Pending ──sign──▶ Signed (terminal)
//! ```
//!
//! `signed_at` is set exactly once, at the transition. Viewing a document
//! updates `viewed_at` on every call and never touches status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signsecure_core::{DocumentRef, Email, SignerRef, Timestamp};

/// Maximum length of a signer's name.
pub const MAX_NAME_LEN: usize = 255;
/// Maximum length of a signer's role.
pub const MAX_ROLE_LEN: usize = 100;

/// Signing status of one signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    /// Has not signed yet.
    Pending,
    /// Has signed (terminal).
    Signed,
}

impl SignerStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
        }
    }
}

impl std::fmt::Display for SignerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignerStatus {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "signed" => Ok(Self::Signed),
            other => Err(SignerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Errors raised by signer transitions and edits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The signer has already signed.
    #[error("signer has already signed")]
    AlreadySigned,

    /// The signer has been removed.
    #[error("signer is deleted")]
    Deleted,

    /// Input failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Status string not recognised.
    #[error("unknown signer status {0:?}")]
    UnknownStatus(String),
}

/// Details supplied when a signer is added or edited.
#[derive(Debug, Clone)]
pub struct SignerDetails {
    /// Invitation address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Free-form role, e.g. "tenant".
    pub role: String,
    /// Display ordering.
    pub order: u32,
}

/// A person asked to sign one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signer {
    /// External reference.
    pub id: SignerRef,
    /// Owning document.
    pub document: DocumentRef,
    /// Invitation address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Free-form role.
    pub role: String,
    /// Display ordering within the document. Not a signing sequence.
    pub order: u32,
    /// Signing status.
    pub status: SignerStatus,
    /// Set once at pending → signed.
    pub signed_at: Option<Timestamp>,
    /// Last time the signer opened the document.
    pub viewed_at: Option<Timestamp>,
    /// Current signing credential. Never serialized to API responses.
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub modified_at: Timestamp,
    /// Soft-delete marker.
    pub deleted_at: Option<Timestamp>,
}

impl Signer {
    /// Create a pending signer on `document`.
    pub fn new(
        document: DocumentRef,
        details: SignerDetails,
        now: Timestamp,
    ) -> Result<Self, SignerError> {
        let (name, role) = validate_details(&details)?;
        Ok(Self {
            id: SignerRef::new(),
            document,
            email: details.email,
            name,
            role,
            order: details.order,
            status: SignerStatus::Pending,
            signed_at: None,
            viewed_at: None,
            token: None,
            created_at: now,
            modified_at: now,
            deleted_at: None,
        })
    }

    /// Replace name, email, role and order.
    pub fn update(&mut self, details: SignerDetails, now: Timestamp) -> Result<(), SignerError> {
        if self.is_signed() {
            return Err(SignerError::AlreadySigned);
        }
        let (name, role) = validate_details(&details)?;
        // A credential is bound to the address it was mailed to.
        if details.email != self.email {
            self.token = None;
        }
        self.email = details.email;
        self.name = name;
        self.role = role;
        self.order = details.order;
        self.modified_at = now;
        Ok(())
    }

    /// Sign (PENDING → SIGNED). Rejected with no state change when
    /// already signed or deleted.
    pub fn sign(&mut self, now: Timestamp) -> Result<(), SignerError> {
        if self.deleted_at.is_some() {
            return Err(SignerError::Deleted);
        }
        if self.is_signed() {
            return Err(SignerError::AlreadySigned);
        }
        self.status = SignerStatus::Signed;
        self.signed_at = Some(now);
        self.modified_at = now;
        Ok(())
    }

    /// Record a view. Last call wins.
    pub fn mark_viewed(&mut self, now: Timestamp) {
        self.viewed_at = Some(now);
        self.modified_at = now;
    }

    /// Store a freshly issued credential.
    pub fn set_token(&mut self, token: String, now: Timestamp) {
        self.token = Some(token);
        self.modified_at = now;
    }

    /// Soft-delete. The first deletion time is kept.
    pub fn soft_delete(&mut self, now: Timestamp) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(now);
            self.modified_at = now;
        }
    }

    /// Whether the signer has signed.
    pub fn is_signed(&self) -> bool {
        self.status == SignerStatus::Signed
    }

    /// Whether the signer is live and still has to sign.
    pub fn is_pending(&self) -> bool {
        self.deleted_at.is_none() && self.status == SignerStatus::Pending
    }
}

fn validate_details(details: &SignerDetails) -> Result<(String, String), SignerError> {
    let name = details.name.trim();
    if name.is_empty() {
        return Err(SignerError::InvalidInput {
            field: "name",
            reason: "must not be empty".into(),
        });
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(SignerError::InvalidInput {
            field: "name",
            reason: format!("must not exceed {MAX_NAME_LEN} characters"),
        });
    }
    let role = details.role.trim();
    if role.chars().count() > MAX_ROLE_LEN {
        return Err(SignerError::InvalidInput {
            field: "role",
            reason: format!("must not exceed {MAX_ROLE_LEN} characters"),
        });
    }
    Ok((name.to_string(), role.to_string()))
}

/// Sort signers by display order, then creation time.
pub fn sort_by_order(signers: &mut [Signer]) {
    signers.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_700_000_000 + n).unwrap()
    }

    fn details(name: &str, order: u32) -> SignerDetails {
        SignerDetails {
            email: Email::parse(&format!("{}@example.com", name.to_lowercase())).unwrap(),
            name: name.to_string(),
            role: "party".to_string(),
            order,
        }
    }

    fn pending() -> Signer {
        Signer::new(DocumentRef::new(), details("Alice", 1), t(0)).unwrap()
    }

    #[test]
    fn sign_sets_signed_at_once() {
        let mut s = pending();
        s.sign(t(10)).unwrap();
        assert_eq!(s.status, SignerStatus::Signed);
        assert_eq!(s.signed_at, Some(t(10)));

        assert_eq!(s.sign(t(20)), Err(SignerError::AlreadySigned));
        assert_eq!(s.signed_at, Some(t(10)));
    }

    #[test]
    fn viewing_is_last_call_wins() {
        let mut s = pending();
        s.mark_viewed(t(1));
        s.mark_viewed(t(7));
        assert_eq!(s.viewed_at, Some(t(7)));
        assert_eq!(s.status, SignerStatus::Pending);
    }

    #[test]
    fn deleted_signer_cannot_sign() {
        let mut s = pending();
        s.soft_delete(t(1));
        assert_eq!(s.sign(t(2)), Err(SignerError::Deleted));
        assert!(!s.is_pending());
    }

    #[test]
    fn blank_name_rejected() {
        let err = Signer::new(DocumentRef::new(), details("  ", 0), t(0)).unwrap_err();
        assert!(matches!(err, SignerError::InvalidInput { field: "name", .. }));
    }

    #[test]
    fn signed_signer_cannot_be_edited() {
        let mut s = pending();
        s.sign(t(1)).unwrap();
        assert_eq!(s.update(details("Bob", 2), t(2)), Err(SignerError::AlreadySigned));
        assert_eq!(s.name, "Alice");
    }

    #[test]
    fn email_change_drops_token() {
        let mut s = pending();
        s.set_token("tok".into(), t(1));
        s.update(details("Alice", 3), t(2)).unwrap();
        assert_eq!(s.token.as_deref(), Some("tok"));
        assert_eq!(s.order, 3);

        let mut moved = details("Alice", 3);
        moved.email = Email::parse("alice@example.org").unwrap();
        s.update(moved, t(3)).unwrap();
        assert_eq!(s.token, None);
    }

    #[test]
    fn token_never_serialized() {
        let mut s = pending();
        s.set_token("secret-token".into(), t(1));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("secret-token"));
    }

    #[test]
    fn sorted_by_order_then_creation() {
        let doc = DocumentRef::new();
        let c = Signer::new(doc, details("Carol", 2), t(0)).unwrap();
        let b = Signer::new(doc, details("Bob", 1), t(2)).unwrap();
        let a = Signer::new(doc, details("Alice", 1), t(1)).unwrap();
        let mut all = vec![c, b, a];
        sort_by_order(&mut all);
        let names: Vec<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob", "Carol"]);
    }
}
