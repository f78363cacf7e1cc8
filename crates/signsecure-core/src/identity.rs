//! # Opaque Reference Newtypes
//!
//! Every externally addressable record carries a random UUID reference that
//! is independent of its storage key. The newtypes keep the namespaces apart:
//! a `SignerRef` cannot be passed where a `DocumentRef` is expected, so a
//! signing token bound to one signer can never be confused with a document
//! lookup.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! define_ref {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random reference.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// First group of the UUID, used in log lines.
            pub fn short(&self) -> String {
                let s = self.0.to_string();
                s.split('-').next().unwrap_or_default().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CoreError::InvalidReference {
                        kind: $kind,
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_ref!(
    /// External reference of a document.
    DocumentRef,
    "document"
);

define_ref!(
    /// External reference of a signer attached to a document.
    SignerRef,
    "signer"
);

define_ref!(
    /// External reference of a form field placed on a document.
    FieldRef,
    "field"
);

define_ref!(
    /// External reference of an audit event.
    AuditEventRef,
    "audit event"
);

define_ref!(
    /// Identity of an authenticated platform user (document owner or actor).
    UserId,
    "user"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_refs_are_unique() {
        assert_ne!(DocumentRef::new(), DocumentRef::new());
    }

    #[test]
    fn short_is_first_uuid_group() {
        let r = SignerRef::from_uuid(
            Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000001").unwrap(),
        );
        assert_eq!(r.short(), "6f1c2a3b");
    }

    #[test]
    fn parse_accepts_display_output() {
        let r = FieldRef::new();
        let parsed: FieldRef = r.to_string().parse().unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn parse_rejects_garbage_with_kind() {
        let err = "not-a-uuid".parse::<DocumentRef>().unwrap_err();
        match err {
            CoreError::InvalidReference { kind, value, .. } => {
                assert_eq!(kind, "document");
                assert_eq!(value, "not-a-uuid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let r = AuditEventRef::new();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, format!("\"{}\"", r.0));
    }
}
