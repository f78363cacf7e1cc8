//! # Signer Tokens
//!
//! A signer token is an HS256 JWT binding one signer, its document and its
//! email address, valid for a fixed window after issuance.
//!
//! Encoding and signature checks go through `jsonwebtoken`. Expiry is
//! evaluated against an explicit instant rather than the system clock, so
//! `exp` is checked here with no leeway: a token is expired at exactly `exp`.
//!
//! ## Re-issuance policy
//!
//! [`SignerTokenIssuer::refresh`] issues a new token exactly when the current
//! one is absent or no longer valid. A valid token is never replaced, so the
//! signing link mailed to a signer stays stable across repeated saves.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use signsecure_core::{DocumentRef, Email, SignerRef, Timestamp};

use crate::secret::TokenSecret;

/// Default validity window of a signer token.
pub const DEFAULT_TOKEN_VALIDITY_DAYS: i64 = 30;

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a token could not be issued or accepted.
///
/// Only used inside this crate and in debug logs. Public decode paths
/// collapse every variant into "no claims".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token is not a well-formed JWT carrying signer claims.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header names an algorithm other than HS256.
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    /// MAC does not match.
    #[error("token signature mismatch")]
    BadSignature,

    /// `exp` is at or before the evaluation instant.
    #[error("token expired at unix time {exp}")]
    Expired {
        /// Expiry claim.
        exp: i64,
    },

    /// Key material rejected.
    #[error("invalid token secret: {0}")]
    InvalidSecret(String),

    /// The validity window pushes `exp` outside the representable range.
    #[error("token validity of {0} days is out of range")]
    ValidityOutOfRange(i64),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm
            }
            ErrorKind::InvalidKeyFormat => Self::InvalidSecret(err.to_string()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

// ─── Claims ──────────────────────────────────────────────────────────

/// Payload carried by a signer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerClaims {
    /// Signer the token was issued to.
    pub signer_id: SignerRef,
    /// Document the signer belongs to.
    pub document_id: DocumentRef,
    /// Signer email at issuance.
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl SignerClaims {
    /// Whether the claims are expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now.epoch_secs() >= self.exp
    }
}

// ─── Issuer ──────────────────────────────────────────────────────────

/// Token issuer configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC key.
    pub secret: TokenSecret,
    /// Validity window in days.
    pub validity_days: i64,
}

impl TokenConfig {
    /// Configuration with the default 30-day window.
    pub fn new(secret: TokenSecret) -> Self {
        Self {
            secret,
            validity_days: DEFAULT_TOKEN_VALIDITY_DAYS,
        }
    }
}

/// Issues and validates signer tokens.
#[derive(Clone)]
pub struct SignerTokenIssuer {
    secret: TokenSecret,
    validity_days: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SignerTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerTokenIssuer")
            .field("secret", &self.secret)
            .field("validity_days", &self.validity_days)
            .finish_non_exhaustive()
    }
}

impl SignerTokenIssuer {
    /// Build an issuer from configuration.
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Checked against the caller's instant in `verify_at`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            secret: config.secret,
            validity_days: config.validity_days.max(1),
            validation,
        }
    }

    /// Validity window in days.
    pub fn validity_days(&self) -> i64 {
        self.validity_days
    }

    /// Issue a token for a signer, valid from now.
    pub fn issue(
        &self,
        signer_id: SignerRef,
        document_id: DocumentRef,
        email: &Email,
    ) -> Result<String, TokenError> {
        self.issue_at(signer_id, document_id, email, Timestamp::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        signer_id: SignerRef,
        document_id: DocumentRef,
        email: &Email,
        now: Timestamp,
    ) -> Result<String, TokenError> {
        let expires = now
            .checked_plus_days(self.validity_days)
            .ok_or(TokenError::ValidityOutOfRange(self.validity_days))?;
        let claims = SignerClaims {
            signer_id,
            document_id,
            email: email.as_str().to_string(),
            iat: now.epoch_secs(),
            exp: expires.epoch_secs(),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Decode a token, returning `None` on any failure, expiry included.
    pub fn decode(&self, token: &str) -> Option<SignerClaims> {
        self.decode_at(token, Timestamp::now())
    }

    /// [`decode`](Self::decode) evaluated at `now`.
    pub fn decode_at(&self, token: &str, now: Timestamp) -> Option<SignerClaims> {
        match self.verify_at(token, now) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(reason = %e, "signer token rejected");
                None
            }
        }
    }

    /// Whether a token is unusable now. Malformed tokens count as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        self.is_expired_at(token, Timestamp::now())
    }

    /// [`is_expired`](Self::is_expired) evaluated at `now`.
    pub fn is_expired_at(&self, token: &str, now: Timestamp) -> bool {
        self.decode_at(token, now).is_none()
    }

    /// Apply the re-issuance policy.
    ///
    /// Returns `Some(new_token)` when `current` is absent or invalid at `now`,
    /// and `None` when `current` is still valid and must be kept.
    pub fn refresh(
        &self,
        current: Option<&str>,
        signer_id: SignerRef,
        document_id: DocumentRef,
        email: &Email,
        now: Timestamp,
    ) -> Result<Option<String>, TokenError> {
        match current {
            Some(token) if !self.is_expired_at(token, now) => Ok(None),
            _ => self.issue_at(signer_id, document_id, email, now).map(Some),
        }
    }

    /// Full verification with a typed failure reason.
    pub fn verify_at(&self, token: &str, now: Timestamp) -> Result<SignerClaims, TokenError> {
        let claims =
            jsonwebtoken::decode::<SignerClaims>(token, &self.decoding_key, &self.validation)?
                .claims;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired { exp: claims.exp });
        }
        Ok(claims)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SignerTokenIssuer {
        SignerTokenIssuer::new(TokenConfig::new(
            TokenSecret::new(b"unit-test-secret-0123456789".to_vec()).unwrap(),
        ))
    }

    fn t0() -> Timestamp {
        Timestamp::parse("2026-05-01T09:00:00Z").unwrap()
    }

    fn alice() -> Email {
        Email::parse("alice@example.com").unwrap()
    }

    #[test]
    fn fresh_token_decodes_to_issuing_signer() {
        let iss = issuer();
        let signer = SignerRef::new();
        let doc = DocumentRef::new();
        let token = iss.issue_at(signer, doc, &alice(), t0()).unwrap();

        let claims = iss.decode_at(&token, t0()).unwrap();
        assert_eq!(claims.signer_id, signer);
        assert_eq!(claims.document_id, doc);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
    }

    #[test]
    fn token_has_three_urlsafe_segments() {
        let token = issuer()
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn token_valid_until_window_elapses() {
        let iss = issuer();
        let token = iss
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        assert!(!iss.is_expired_at(&token, t0().plus_days(29)));
        assert!(iss.is_expired_at(&token, t0().plus_days(30)));
        assert!(iss.decode_at(&token, t0().plus_days(31)).is_none());
        assert!(matches!(
            iss.verify_at(&token, t0().plus_days(31)),
            Err(TokenError::Expired { .. })
        ));
    }

    #[test]
    fn token_from_other_secret_rejected() {
        let other = SignerTokenIssuer::new(TokenConfig::new(
            TokenSecret::new(b"another-secret-0123456789".to_vec()).unwrap(),
        ));
        let token = other
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        assert!(matches!(
            issuer().verify_at(&token, t0()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn tampered_claims_rejected() {
        let iss = issuer();
        let token = iss
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        let forged_claims = SignerClaims {
            signer_id: SignerRef::new(),
            document_id: DocumentRef::new(),
            email: "mallory@example.com".into(),
            iat: t0().epoch_secs(),
            exp: t0().plus_days(365).epoch_secs(),
        };
        let forged_token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(b"mallory-secret-0123456789"),
        )
        .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged_token.split('.').nth(1).unwrap();
        let spliced = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert!(matches!(
            iss.verify_at(&spliced, t0()),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn malformed_tokens_rejected_and_count_as_expired() {
        let iss = issuer();
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(iss.decode_at(bad, t0()).is_none(), "accepted {bad:?}");
            assert!(iss.is_expired_at(bad, t0()));
        }
    }

    #[test]
    fn other_algorithm_rejected() {
        let claims = SignerClaims {
            signer_id: SignerRef::new(),
            document_id: DocumentRef::new(),
            email: "alice@example.com".into(),
            iat: t0().epoch_secs(),
            exp: t0().plus_days(1).epoch_secs(),
        };
        let hs512 = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret-0123456789"),
        )
        .unwrap();
        assert!(matches!(
            issuer().verify_at(&hs512, t0()),
            Err(TokenError::UnsupportedAlgorithm)
        ));

        // {"alg":"none","typ":"JWT"} with empty claims and no signature.
        let unsigned = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.e30.";
        assert!(issuer().decode_at(unsigned, t0()).is_none());
    }

    #[test]
    fn token_expires_at_exactly_exp() {
        let iss = issuer();
        let token = iss
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        let claims = iss.decode_at(&token, t0()).unwrap();
        let at_exp = Timestamp::from_epoch_secs(claims.exp).unwrap();
        let just_before = Timestamp::from_epoch_secs(claims.exp - 1).unwrap();
        assert!(iss.decode_at(&token, just_before).is_some());
        assert!(matches!(
            iss.verify_at(&token, at_exp),
            Err(TokenError::Expired { exp }) if exp == claims.exp
        ));
    }

    #[test]
    fn unrepresentable_validity_window_fails_issuance() {
        let iss = SignerTokenIssuer::new(TokenConfig {
            secret: TokenSecret::new(b"unit-test-secret-0123456789".to_vec()).unwrap(),
            validity_days: i64::MAX,
        });
        assert_eq!(
            iss.issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0()),
            Err(TokenError::ValidityOutOfRange(i64::MAX))
        );
    }

    #[test]
    fn refresh_issues_when_absent() {
        let iss = issuer();
        let fresh = iss
            .refresh(None, SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        assert!(fresh.is_some());
    }

    #[test]
    fn refresh_keeps_valid_token() {
        let iss = issuer();
        let signer = SignerRef::new();
        let doc = DocumentRef::new();
        let token = iss.issue_at(signer, doc, &alice(), t0()).unwrap();
        let later = t0().plus_days(10);
        assert_eq!(
            iss.refresh(Some(&token), signer, doc, &alice(), later).unwrap(),
            None
        );
    }

    #[test]
    fn refresh_replaces_expired_or_garbage_token() {
        let iss = issuer();
        let signer = SignerRef::new();
        let doc = DocumentRef::new();
        let token = iss.issue_at(signer, doc, &alice(), t0()).unwrap();
        let later = t0().plus_days(45);

        let replaced = iss
            .refresh(Some(&token), signer, doc, &alice(), later)
            .unwrap()
            .unwrap();
        assert_ne!(replaced, token);
        assert!(iss.decode_at(&replaced, later).is_some());

        assert!(iss
            .refresh(Some("garbage"), signer, doc, &alice(), later)
            .unwrap()
            .is_some());
    }

    #[test]
    fn issuance_is_deterministic_for_same_instant() {
        let iss = issuer();
        let signer = SignerRef::new();
        let doc = DocumentRef::new();
        let a = iss.issue_at(signer, doc, &alice(), t0()).unwrap();
        let b = iss.issue_at(signer, doc, &alice(), t0()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validity_window_is_configurable() {
        let iss = SignerTokenIssuer::new(TokenConfig {
            secret: TokenSecret::new(b"unit-test-secret-0123456789".to_vec()).unwrap(),
            validity_days: 2,
        });
        let token = iss
            .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
            .unwrap();
        assert!(iss.decode_at(&token, t0().plus_days(1)).is_some());
        assert!(iss.decode_at(&token, t0().plus_days(2)).is_none());
    }

    proptest::proptest! {
        #[test]
        fn any_altered_character_is_rejected(index in 0usize..400, replacement in proptest::sample::select(vec!['A', 'B'])) {
            let iss = issuer();
            let token = iss
                .issue_at(SignerRef::new(), DocumentRef::new(), &alice(), t0())
                .unwrap();
            let index = index % token.len();
            let original = token.as_bytes()[index] as char;
            let replacement = if original == replacement { 'C' } else { replacement };

            let mut tampered = token.clone();
            tampered.replace_range(index..=index, &replacement.to_string());
            proptest::prop_assert!(iss.verify_at(&tampered, t0()).is_err());
        }
    }
}
