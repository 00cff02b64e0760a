//! Command-line surface
//!
//! Usage:
//!   charter validate <PATH> [--fix] [--report <FILE>]
//!   charter sync <PATH> [--dry-run] [--force [--tag]] [--git-status]
//!   charter audit <PATH> [--type quality|compliance|security] [--output <FILE>]
//!   charter govern <PATH> [--strict] [--auto-fix] [--approval <TOKEN>]...
//!   charter init <PATH> [--template minimal|standard] [--force]
//!   charter status <PATH>
//!   charter version bump|check <PATH> <COMPONENT> <VERSION>
//!   charter schema check <PATH>

use crate::audit::AuditType;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "charter", version)]
#[command(about = "Schema-driven compliance engine for project protocols")]
pub struct Cli {
    /// Configuration file (defaults to <PATH>/.charter.json)
    #[arg(long, global = true, env = "CHARTER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Debug logging and per-check detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a project against the rule schema (exit 0 iff score >= pass threshold)
    Validate {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Apply approval-free fixes, then re-check
        #[arg(long)]
        fix: bool,

        /// Also write the result to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Reconcile declared versions with the version ledger
    Sync {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Rewrite drifted files to the canonical version
        #[arg(long)]
        force: bool,

        /// Include a read-only git status summary
        #[arg(long)]
        git_status: bool,

        /// Tag v<version> after a successful forced sync
        #[arg(long, requires = "force")]
        tag: bool,
    },

    /// Graded quality audit
    Audit {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long = "type", default_value = "quality")]
        audit_type: AuditType,

        /// Also write the audit report to this file
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Compliance check with exception policies (exit 1 on blocking violations)
    Govern {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// High-severity violations also block
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        auto_fix: bool,

        /// Approval token for emergency bypass (repeatable)
        #[arg(long = "approval", value_name = "TOKEN")]
        approvals: Vec<String>,

        /// Remediation plan reference for legacy exemptions
        #[arg(long, value_name = "REF")]
        remediation_plan: Option<String>,
    },

    /// Scaffold the required documents
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, default_value = "minimal")]
        template: String,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Ledger versions, latest scores and tracked files
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Version ledger maintenance
    Version {
        #[command(subcommand)]
        action: VersionCommand,
    },

    /// Rule schema maintenance
    Schema {
        #[command(subcommand)]
        action: SchemaCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Record a new canonical version for a component
    Bump {
        path: PathBuf,
        component: String,
        version: String,

        /// Release date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Check a version against deprecations and breaking changes
    Check {
        path: PathBuf,
        component: String,
        version: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// Run the schema's structural self-check
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}
