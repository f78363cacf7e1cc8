//! # Token Subcommand
//!
//! Mint, inspect and key signer tokens. Tokens minted here are the same
//! HS256 credentials the API issues, so a token printed by `issue` opens the
//! signing link of a server configured with the same secret.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Args, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;

use signsecure_core::{DocumentRef, Email, SignerRef, Timestamp};
use signsecure_crypto::{SignerClaims, DEFAULT_TOKEN_VALIDITY_DAYS};

/// Arguments for the `signsecure token` subcommand.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Issue a token for a signer.
    Issue {
        /// Token secret of the target deployment.
        #[arg(long, env = "SIGNSECURE_TOKEN_SECRET", hide_env_values = true)]
        secret: String,
        /// Signer reference.
        #[arg(long)]
        signer: SignerRef,
        /// Document reference.
        #[arg(long)]
        document: DocumentRef,
        /// Signer email the token is bound to.
        #[arg(long)]
        email: String,
        /// Validity window in days.
        #[arg(long, default_value_t = DEFAULT_TOKEN_VALIDITY_DAYS)]
        ttl_days: i64,
    },

    /// Verify a token and print its claims as JSON.
    Inspect {
        /// Token secret of the target deployment.
        #[arg(long, env = "SIGNSECURE_TOKEN_SECRET", hide_env_values = true)]
        secret: String,
        /// The token to inspect.
        #[arg(value_name = "TOKEN")]
        token: String,
    },

    /// Generate a random token secret.
    Secret {
        /// Secret length in bytes before encoding.
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    match &args.command {
        TokenCommand::Issue {
            secret,
            signer,
            document,
            email,
            ttl_days,
        } => {
            let token = cmd_issue(secret, *signer, *document, email, *ttl_days)?;
            println!("{token}");
            Ok(0)
        }
        TokenCommand::Inspect { secret, token } => cmd_inspect(secret, token),
        TokenCommand::Secret { bytes } => {
            println!("{}", generate_secret(*bytes)?);
            Ok(0)
        }
    }
}

fn cmd_issue(
    secret: &str,
    signer: SignerRef,
    document: DocumentRef,
    email: &str,
    ttl_days: i64,
) -> Result<String> {
    let email = Email::parse(email).context("invalid signer email")?;
    let issuer = crate::issuer(secret, ttl_days)?;
    let token = issuer
        .issue(signer, document, &email)
        .context("failed to issue token")?;
    tracing::info!(signer = %signer.short(), document = %document.short(), "token issued");
    Ok(token)
}

fn cmd_inspect(secret: &str, token: &str) -> Result<u8> {
    let issuer = crate::issuer(secret, DEFAULT_TOKEN_VALIDITY_DAYS)?;
    match issuer.verify_at(token.trim(), Timestamp::now()) {
        Ok(claims) => {
            println!("{}", serde_json::to_string_pretty(&describe(&claims))?);
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}

/// Claims plus human-readable issue and expiry instants.
fn describe(claims: &SignerClaims) -> serde_json::Value {
    let rfc3339 = |secs: i64| {
        Timestamp::from_epoch_secs(secs)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    };
    serde_json::json!({
        "signer_id": claims.signer_id,
        "document_id": claims.document_id,
        "email": claims.email,
        "issued_at": rfc3339(claims.iat),
        "expires_at": rfc3339(claims.exp),
    })
}

/// Random secret, base64url without padding.
fn generate_secret(bytes: usize) -> Result<String> {
    if bytes < signsecure_crypto::secret::MIN_SECRET_LEN {
        anyhow::bail!(
            "secret must be at least {} bytes, got {bytes}",
            signsecure_crypto::secret::MIN_SECRET_LEN
        );
    }
    let mut raw = vec![0u8; bytes];
    OsRng.fill_bytes(&mut raw);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}
