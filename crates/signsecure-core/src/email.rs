//! # Email Addresses
//!
//! Signers are addressed by email and audit events record the acting email.
//! Validation is structural only: one `@`, non-empty local part, a dotted
//! domain, no whitespace, at most 254 bytes. Deliverability is the mail
//! collaborator's problem.
//!
//! Addresses are stored with the domain lowercased and the local part kept
//! as given.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

const MAX_EMAIL_LEN: usize = 254;

/// A structurally valid email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Validate and normalize an address.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let value = raw.trim();
        let reject = |reason| CoreError::InvalidEmail {
            value: raw.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(reject("must not be empty"));
        }
        if value.len() > MAX_EMAIL_LEN {
            return Err(reject("must not exceed 254 characters"));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(reject("must not contain whitespace"));
        }
        let (local, domain) = value.split_once('@').ok_or_else(|| reject("missing '@'"))?;
        if domain.contains('@') {
            return Err(reject("must contain exactly one '@'"));
        }
        if local.is_empty() {
            return Err(reject("local part must not be empty"));
        }
        if domain.is_empty() || !domain.contains('.') {
            return Err(reject("domain must contain a '.'"));
        }
        if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
            return Err(reject("domain has an empty label"));
        }

        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    /// The normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_plain_address() {
        let e = Email::parse("alice@example.com").unwrap();
        assert_eq!(e.as_str(), "alice@example.com");
    }

    #[test]
    fn lowercases_domain_only() {
        let e = Email::parse("  Alice.Smith@Example.COM ").unwrap();
        assert_eq!(e.as_str(), "Alice.Smith@example.com");
    }

    #[test]
    fn rejects_missing_at() {
        assert!(Email::parse("alice.example.com").is_err());
    }

    #[test]
    fn rejects_two_ats() {
        assert!(Email::parse("a@b@example.com").is_err());
    }

    #[test]
    fn rejects_dotless_domain() {
        assert!(Email::parse("alice@localhost").is_err());
    }

    #[test]
    fn rejects_empty_label() {
        assert!(Email::parse("alice@example..com").is_err());
        assert!(Email::parse("alice@.example.com").is_err());
    }

    #[test]
    fn rejects_inner_whitespace() {
        assert!(Email::parse("ali ce@example.com").is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<Email, _> = serde_json::from_str("\"bob@example.org\"");
        assert!(ok.is_ok());
        let bad: Result<Email, _> = serde_json::from_str("\"bob\"");
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(local in "[a-z0-9._+-]{1,20}", domain in "[a-z0-9-]{1,12}\\.[a-z]{2,6}") {
            let first = Email::parse(&format!("{local}@{domain}")).unwrap();
            let second = Email::parse(first.as_str()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
