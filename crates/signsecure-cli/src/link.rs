//! # Link Subcommand
//!
//! Render the signing link for a signer token, optionally checking that the
//! token is valid for the document before printing it.

use anyhow::{bail, Result};
use clap::Args;

use signsecure_api::config::DEFAULT_FRONTEND_URL;
use signsecure_api::notify::signing_url;
use signsecure_core::DocumentRef;
use signsecure_crypto::DEFAULT_TOKEN_VALIDITY_DAYS;

/// Arguments for the `signsecure link` subcommand.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Frontend base URL.
    #[arg(long, env = "FRONTEND_URL", default_value = DEFAULT_FRONTEND_URL)]
    pub frontend_url: String,
    /// Document reference.
    #[arg(long)]
    pub document: DocumentRef,
    /// Signer token.
    #[arg(long)]
    pub token: String,
    /// When given, verify the token against this secret first.
    #[arg(long, env = "SIGNSECURE_TOKEN_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

/// Execute the link subcommand.
pub fn run_link(args: &LinkArgs) -> Result<u8> {
    if let Some(secret) = &args.secret {
        if let Err(reason) = check_token(secret, args.document, &args.token)? {
            println!("FAIL: {reason}");
            return Ok(1);
        }
    }
    println!("{}", signing_url(&args.frontend_url, args.document, &args.token));
    Ok(0)
}

/// Outer error: bad secret. Inner error: token not usable for `document`.
fn check_token(secret: &str, document: DocumentRef, token: &str) -> Result<Result<(), String>> {
    if token.trim().is_empty() {
        bail!("token must not be empty");
    }
    let issuer = crate::issuer(secret, DEFAULT_TOKEN_VALIDITY_DAYS)?;
    Ok(match issuer.decode(token) {
        None => Err("token is invalid or expired".to_string()),
        Some(claims) if claims.document_id != document => {
            Err(format!("token belongs to document {}", claims.document_id))
        }
        Some(_) => Ok(()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use signsecure_core::{Email, SignerRef};

    const SECRET: &str = "link-test-secret-0123456789";

    fn token_for(document: DocumentRef) -> String {
        crate::issuer(SECRET, 30)
            .unwrap()
            .issue(
                SignerRef::new(),
                document,
                &Email::parse("alice@example.com").unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn token_for_document_passes() {
        let document = DocumentRef::new();
        let token = token_for(document);
        assert_eq!(check_token(SECRET, document, &token).unwrap(), Ok(()));
    }

    #[test]
    fn token_for_other_document_fails() {
        let token = token_for(DocumentRef::new());
        assert!(check_token(SECRET, DocumentRef::new(), &token)
            .unwrap()
            .is_err());
    }

    #[test]
    fn run_without_secret_renders() {
        let args = LinkArgs {
            frontend_url: "https://sign.example.com/".into(),
            document: DocumentRef::new(),
            token: "abc".into(),
            secret: None,
        };
        assert_eq!(run_link(&args).unwrap(), 0);
    }
}
