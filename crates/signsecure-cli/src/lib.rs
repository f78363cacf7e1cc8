//! # signsecure-cli — Operator Tooling
//!
//! Offline helpers for operating a SignSecure deployment. Nothing here talks
//! to the API server or the database; every command works from the token
//! secret and the references supplied on the command line.
//!
//! ## Subcommands
//!
//! - `signsecure token issue` — mint a signer token.
//! - `signsecure token inspect` — verify a token and print its claims.
//! - `signsecure token secret` — generate a value for `SIGNSECURE_TOKEN_SECRET`.
//! - `signsecure link` — render the signing link mailed to a signer.
//!
//! Commands return the process exit code: `0` on success, `1` when a token
//! fails verification.

pub mod link;
pub mod token;

use anyhow::{Context, Result};

use signsecure_crypto::{SignerTokenIssuer, TokenConfig, TokenSecret};

/// Build an issuer from a secret given on the command line or environment.
pub fn issuer(secret: &str, validity_days: i64) -> Result<SignerTokenIssuer> {
    let secret = TokenSecret::new(secret.as_bytes()).context("invalid token secret")?;
    Ok(SignerTokenIssuer::new(TokenConfig {
        secret,
        validity_days,
    }))
}
