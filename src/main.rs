//! charter - schema-driven compliance engine
//!
//! Validates a project's operating-protocol documents against a rule schema,
//! keeps declared versions in line with the version ledger, runs graded audits
//! and gates releases on compliance.

use anyhow::Context;
use charter::cli::{Cli, LogFormat};
use charter::commands;
use charter::error::AppError;
use charter::safety::redact::{sanitize_log, RedactingMakeWriter};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    debug!("charter {} starting", env!("CARGO_PKG_VERSION"));

    let outcome = commands::run(&cli)
        .await
        .with_context(|| format!("charter {} failed", command_name(&cli)));

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let (code, kind) = err
                .downcast_ref::<AppError>()
                .map_or((1, "ERROR"), |e| (e.exit_code(), e.code()));
            eprintln!("error[{kind}]: {}", sanitize_log(&format!("{err:#}")));
            std::process::exit(code)
        }
    }
}

/// Structured logging on stderr; every line passes through secret redaction
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "charter=debug" } else { "charter=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (text, json) = match cli.log_format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_target(cli.verbose)
                    .with_level(true)
                    .with_writer(RedactingMakeWriter)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(RedactingMakeWriter),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json)
        .init();
}

fn command_name(cli: &Cli) -> &'static str {
    use charter::cli::Command;
    match cli.command {
        Command::Validate { .. } => "validate",
        Command::Sync { .. } => "sync",
        Command::Audit { .. } => "audit",
        Command::Govern { .. } => "govern",
        Command::Init { .. } => "init",
        Command::Status { .. } => "status",
        Command::Version { .. } => "version",
        Command::Schema { .. } => "schema",
    }
}
