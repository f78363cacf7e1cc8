//! # signsecure CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use signsecure_cli::link::{run_link, LinkArgs};
use signsecure_cli::token::{run_token, TokenArgs};

/// SignSecure operator CLI.
///
/// Issues and inspects signer tokens and renders signing links without
/// touching a running server.
#[derive(Parser, Debug)]
#[command(name = "signsecure", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue, inspect and key signer tokens.
    Token(TokenArgs),

    /// Render a signing link.
    Link(LinkArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Token(args) => run_token(&args),
        Commands::Link(args) => run_link(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signsecure_cli::token::TokenCommand;

    #[test]
    fn cli_parse_token_issue() {
        let cli = Cli::try_parse_from([
            "signsecure",
            "token",
            "issue",
            "--secret",
            "0123456789abcdef0123",
            "--signer",
            "6f1c2a9e-0d4b-4c3e-9a51-7b2f8e0c1d23",
            "--document",
            "0b7e3c1a-5f2d-4e8a-9c64-2d1f0a9b8e71",
            "--email",
            "alice@example.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Token(TokenArgs {
                command: TokenCommand::Issue { ttl_days, .. },
            }) => assert_eq!(ttl_days, 30),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_malformed_reference() {
        let parsed = Cli::try_parse_from([
            "signsecure",
            "link",
            "--document",
            "not-a-uuid",
            "--token",
            "abc",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_verbose_counts() {
        let cli = Cli::try_parse_from(["signsecure", "-vv", "token", "secret"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
