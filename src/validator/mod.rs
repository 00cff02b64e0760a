//! Validator
//!
//! Binary compliance against the Rule Schema:
//! - Required files, sections, fields and minimum length
//! - Version consistency against the Version Ledger
//! - Documentation quality metrics
//! - Weighted score, grade and per-category recommendations
//!
//! Projects may swap the built-in [`SchemaValidator`] for an external plugin;
//! callers only see [`ComplianceValidator`].

pub mod checks;
pub mod external;
pub mod markdown;
pub mod remediation;
pub mod scoring;

pub use external::ExternalValidator;
pub use remediation::Remediator;

use crate::error::{AppError, AppResult};
use crate::ledger::VersionLedger;
use crate::models::ValidationResult;
use crate::safety::write_json_atomic;
use crate::schema::SchemaStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Options accepted by [`ComplianceValidator::validate`]
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub verbose: bool,
    /// Apply approval-free fixes, then re-check
    pub fix: bool,
    /// Write the full result here (atomically)
    pub report: Option<PathBuf>,
}

/// Contract every validator implementation satisfies
#[async_trait]
pub trait ComplianceValidator: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn supports_auto_fix(&self) -> bool;
    async fn validate(&self, project: &Path, options: &ValidateOptions) -> AppResult<ValidationResult>;
}

/// Fails with [`AppError::ProjectNotFound`] unless `project` is a directory
pub fn require_project(project: &Path) -> AppResult<()> {
    if project.is_dir() {
        Ok(())
    } else {
        Err(AppError::ProjectNotFound(project.to_path_buf()))
    }
}

/// Persist a serializable report atomically, logging where it went
pub async fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> AppResult<()> {
    write_json_atomic(path, report).await?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Built-in validator driven by the Rule Schema
pub struct SchemaValidator {
    schema: Arc<SchemaStore>,
    ledger: Arc<VersionLedger>,
}

impl SchemaValidator {
    pub fn new(schema: Arc<SchemaStore>, ledger: Arc<VersionLedger>) -> Self {
        Self { schema, ledger }
    }
}

#[async_trait]
impl ComplianceValidator for SchemaValidator {
    fn name(&self) -> &str {
        "schema"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn supports_auto_fix(&self) -> bool {
        true
    }

    async fn validate(&self, project: &Path, options: &ValidateOptions) -> AppResult<ValidationResult> {
        require_project(project)?;
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;

        info!("Validating {} against '{}'", project.display(), schema.name);
        let mut eval = checks::evaluate(project, &schema, &ledger).await?;

        let mut fixed = 0;
        if options.fix && eval.issues.iter().any(|i| i.auto_fixable) {
            let remediator = Remediator::new(schema.clone(), ledger.clone());
            fixed = remediator.apply_all(project, &eval.issues).await?;
            if fixed > 0 {
                eval = checks::evaluate(project, &schema, &ledger).await?;
            }
        }

        let score = scoring::score(&schema.scoring_categories, &eval.tally);
        let result = ValidationResult {
            grade: schema.calculate_grade(score),
            recommendations: scoring::recommendations(&eval.issues, &schema),
            score,
            issues: eval.issues,
            fixed,
        };

        if options.verbose {
            for (category, tally) in &eval.tally {
                debug!("{category}: {}/{} checks passed", tally.passed, tally.total);
            }
            for issue in &result.issues {
                debug!("[{}] {}", issue.severity, issue.message);
            }
        }
        info!(
            "Score {:.1} ({}), {} issues, {} fixed",
            result.score,
            result.grade,
            result.issues.len(),
            result.fixed
        );

        if let Some(report) = &options.report {
            write_report(report, &result).await?;
        }
        Ok(result)
    }
}
