//! # signsecure-crypto — Signer Credentials
//!
//! Issues and validates the bearer credential that lets a signer open and
//! sign one specific document without a platform account.
//!
//! - **Format**: JWT (`jsonwebtoken`), signed with
//!   HMAC-SHA256 (`HS256`) under a server secret.
//! - **Claims**: `signer_id`, `document_id`, `email`, `iat`, `exp`.
//! - **Validity**: 30 days by default.
//!
//! ## Crate Policy
//!
//! - Depends only on `signsecure-core` internally.
//! - Secrets are zeroized on drop and never appear in `Debug` output.
//! - Callers see a decoded token or nothing. Expired, forged and malformed
//!   tokens are indistinguishable outside this crate; the reason is logged
//!   at `debug` level only.

pub mod secret;
pub mod token;

pub use secret::TokenSecret;
pub use token::{
    SignerClaims, SignerTokenIssuer, TokenConfig, TokenError, DEFAULT_TOKEN_VALIDITY_DAYS,
};
