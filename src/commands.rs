//! Command handlers
//!
//! Each handler builds the engine for its project, runs one operation, prints
//! the result as JSON on stdout and returns the process exit code.

use crate::cli::{Cli, Command, SchemaCommand, VersionCommand};
use crate::error::AppResult;
use crate::governor::{GovernOptions, InitOptions, Template};
use crate::schema::SchemaStore;
use crate::state::Engine;
use crate::sync::SyncOptions;
use crate::validator::ValidateOptions;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;

fn emit<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn engine(cli: &Cli, project: &Path) -> AppResult<Engine> {
    Engine::for_project(project, cli.config.as_deref())
}

pub async fn run(cli: &Cli) -> AppResult<i32> {
    match &cli.command {
        Command::Validate { path, fix, report } => {
            let engine = engine(cli, path)?;
            let options = ValidateOptions {
                verbose: cli.verbose,
                fix: *fix,
                report: report.clone(),
            };
            let result = engine.validator.validate(path, &options).await?;
            emit(&result)?;

            let threshold = engine.settings.validation.pass_threshold;
            if result.passes(threshold) {
                Ok(EXIT_OK)
            } else {
                info!("Score {:.1} is below the pass threshold {:.1}", result.score, threshold);
                Ok(EXIT_FAILED)
            }
        }

        Command::Sync {
            path,
            dry_run,
            force,
            git_status,
            tag,
        } => {
            let engine = engine(cli, path)?;
            let options = SyncOptions {
                dry_run: *dry_run,
                force: *force,
                git_status: *git_status,
                tag: *tag,
            };
            let result = if *dry_run {
                engine.synchronizer.preview(path, &options).await?
            } else {
                engine.synchronizer.sync(path, &options).await?
            };
            emit(&result)?;

            let unresolved = result.unresolved();
            if unresolved > 0 {
                if !*force {
                    info!("{unresolved} conflicts left; re-run with --force to rewrite them");
                }
                Ok(EXIT_FAILED)
            } else {
                Ok(EXIT_OK)
            }
        }

        Command::Audit {
            path,
            audit_type,
            output,
        } => {
            let engine = engine(cli, path)?;
            let result = engine.governor.audit(path, *audit_type).await?;
            if let Some(output) = output {
                engine.auditor.generate_report(&result, output).await?;
            }
            emit(&result)?;
            Ok(EXIT_OK)
        }

        Command::Govern {
            path,
            strict,
            auto_fix,
            approvals,
            remediation_plan,
        } => {
            let engine = engine(cli, path)?;
            let options = GovernOptions {
                strict: *strict,
                auto_fix: *auto_fix,
                approvals: approvals.clone(),
                remediation_plan: remediation_plan.clone(),
            };
            let report = engine.governor.check_compliance(path, &options).await?;
            emit(&report)?;
            Ok(if report.compliant { EXIT_OK } else { EXIT_FAILED })
        }

        Command::Init { path, template, force } => {
            let template: Template = template.parse()?;
            let engine = engine(cli, path)?;
            let report = engine
                .governor
                .init(
                    path,
                    &InitOptions {
                        template,
                        force: *force,
                    },
                )
                .await?;
            emit(&report)?;
            Ok(EXIT_OK)
        }

        Command::Status { path } => {
            let engine = engine(cli, path)?;
            let status = engine.governor.get_status(path).await?;
            emit(&status)?;
            Ok(EXIT_OK)
        }

        Command::Version { action } => match action {
            VersionCommand::Bump {
                path,
                component,
                version,
                date,
            } => {
                let engine = engine(cli, path)?;
                let entry = engine.ledger.update_version(component, version, *date).await?;
                emit(&entry)?;
                Ok(EXIT_OK)
            }
            VersionCommand::Check {
                path,
                component,
                version,
            } => {
                let engine = engine(cli, path)?;
                let compatibility = engine.ledger.check_compatibility(version, component).await?;
                emit(&compatibility)?;
                Ok(if compatibility.compatible { EXIT_OK } else { EXIT_FAILED })
            }
        },

        Command::Schema {
            action: SchemaCommand::Check { path },
        } => {
            let engine = engine(cli, path)?;
            let schema = engine.schema.read().await?;
            let check = SchemaStore::validate_self(&schema);
            if !check.valid {
                warn!("Schema '{}' failed {} checks", schema.name, check.errors.len());
            }
            emit(&check)?;
            Ok(if check.valid { EXIT_OK } else { EXIT_FAILED })
        }
    }
}
