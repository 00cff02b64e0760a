//! Governor
//!
//! Top-level orchestrator. Holds whichever validator, synchronizer and
//! auditor the project configured, behind their traits, and adds:
//! - Compliance checks with exception-policy filtering
//! - Selective auto-fix through the schema's remediation table
//! - Project scaffolding from templates
//! - A read-only status projection

pub mod policy;
pub mod scaffold;

pub use policy::{Disposition, PolicyContext, Violation};
pub use scaffold::{InitReport, Template};

use crate::audit::{AuditResult, AuditType, Auditor};
use crate::error::AppResult;
use crate::ledger::VersionLedger;
use crate::models::{Issue, Severity};
use crate::schema::SchemaStore;
use crate::sync::{SyncOptions, Synchronizer};
use crate::validator::{require_project, ComplianceValidator, Remediator, ValidateOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Where the most recent audit is persisted inside a project
pub const AUDIT_REPORT: &str = ".charter/audit.json";

#[derive(Debug, Clone, Default)]
pub struct GovernOptions {
    pub strict: bool,
    pub auto_fix: bool,
    pub approvals: Vec<String>,
    pub remediation_plan: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub template: Template,
    pub force: bool,
}

/// Outcome of a compliance check after exception policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub compliant: bool,
    pub score: f64,
    pub grade: String,
    pub fixed: usize,
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    /// Issues as they stand after policy evaluation
    pub fn issues(&self) -> Vec<Issue> {
        self.violations.iter().map(|v| v.issue.clone()).collect()
    }

    pub fn blocking(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.blocking)
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.violations.iter().filter(|v| v.disposition == disposition).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub id: Uuid,
    pub audit_type: AuditType,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFile {
    pub path: String,
    pub present: bool,
    pub required: bool,
    pub version_bearing: bool,
}

/// Read-only projection of ledger, latest validation and latest audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceStatus {
    pub protocol_version: Option<String>,
    pub governance_version: Option<String>,
    pub compliance_score: f64,
    pub grade: String,
    pub last_audit: Option<AuditSummary>,
    pub tracked_files: Vec<TrackedFile>,
    pub issues: Vec<Issue>,
    pub pending_sync: usize,
    pub schema_name: String,
    pub schema_version: String,
    pub schema_digest: String,
    pub standards: BTreeMap<String, serde_json::Value>,
}

pub struct Governor {
    schema: Arc<SchemaStore>,
    ledger: Arc<VersionLedger>,
    validator: Arc<dyn ComplianceValidator>,
    synchronizer: Arc<dyn Synchronizer>,
    auditor: Arc<dyn Auditor>,
    standards: BTreeMap<String, serde_json::Value>,
}

impl Governor {
    pub fn new(
        schema: Arc<SchemaStore>,
        ledger: Arc<VersionLedger>,
        validator: Arc<dyn ComplianceValidator>,
        synchronizer: Arc<dyn Synchronizer>,
        auditor: Arc<dyn Auditor>,
    ) -> Self {
        Self {
            schema,
            ledger,
            validator,
            synchronizer,
            auditor,
            standards: BTreeMap::new(),
        }
    }

    pub fn with_standards(mut self, standards: BTreeMap<String, serde_json::Value>) -> Self {
        self.standards = standards;
        self
    }

    pub fn validator(&self) -> &dyn ComplianceValidator {
        self.validator.as_ref()
    }

    pub fn synchronizer(&self) -> &dyn Synchronizer {
        self.synchronizer.as_ref()
    }

    pub fn auditor(&self) -> &dyn Auditor {
        self.auditor.as_ref()
    }

    /// Run a fresh audit and persist it as the project's latest
    pub async fn audit(&self, project: &Path, audit_type: AuditType) -> AppResult<AuditResult> {
        let result = self.auditor.audit(project, audit_type).await?;
        self.auditor
            .generate_report(&result, &Self::audit_report_path(project))
            .await?;
        Ok(result)
    }

    pub async fn get_status(&self, project: &Path) -> AppResult<GovernanceStatus> {
        require_project(project)?;
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;

        let validation = self.validator.validate(project, &ValidateOptions::default()).await?;
        let preview = self.synchronizer.preview(project, &SyncOptions::default()).await?;

        let mut tracked: Vec<TrackedFile> = Vec::new();
        let version_paths: Vec<&str> = schema
            .version_bearing_files()
            .into_iter()
            .map(|(_, f)| f.path.as_str())
            .collect();
        let paths = schema
            .required_files
            .iter()
            .map(|r| r.path.as_str())
            .chain(version_paths.iter().copied());
        for path in paths {
            if tracked.iter().any(|t| t.path == path) {
                continue;
            }
            let resolved = crate::safety::validate_path(path, project)?;
            tracked.push(TrackedFile {
                path: path.to_string(),
                present: tokio::fs::try_exists(&resolved).await?,
                required: schema.is_required_file(path),
                version_bearing: version_paths.contains(&path),
            });
        }

        Ok(GovernanceStatus {
            protocol_version: ledger.components.get("protocol").map(|c| c.current.clone()),
            governance_version: ledger.components.get("governance").map(|c| c.current.clone()),
            compliance_score: validation.score,
            grade: validation.grade,
            last_audit: read_last_audit(&Self::audit_report_path(project)).await,
            tracked_files: tracked,
            issues: validation.issues,
            pending_sync: preview.conflicts.len(),
            schema_name: schema.name.clone(),
            schema_version: schema.version.clone(),
            schema_digest: schema.digest()?,
            standards: self.standards.clone(),
        })
    }

    pub async fn init(&self, project: &Path, options: &InitOptions) -> AppResult<InitReport> {
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;
        scaffold::scaffold(project, options.template, options.force, schema, ledger).await
    }

    /// Validate, optionally auto-fix, then apply exception policies
    pub async fn check_compliance(&self, project: &Path, options: &GovernOptions) -> AppResult<ComplianceReport> {
        let schema = self.schema.load().await?;
        let mut result = self.validator.validate(project, &ValidateOptions::default()).await?;

        let mut fixed = 0;
        if options.auto_fix {
            if self.validator.supports_auto_fix() {
                fixed = self.auto_fix(project, &result.issues).await?;
                if fixed > 0 {
                    result = self.validator.validate(project, &ValidateOptions::default()).await?;
                }
            } else {
                warn!("Validator '{}' does not support auto-fix", self.validator.name());
            }
        }

        let ctx = PolicyContext {
            approvals: options.approvals.clone(),
            remediation_plan: options.remediation_plan.clone(),
            strict: options.strict,
        };
        let violations: Vec<Violation> = result
            .issues
            .into_iter()
            .map(|issue| policy::evaluate(&schema, issue, &ctx))
            .collect();

        let report = ComplianceReport {
            compliant: !violations.iter().any(|v| v.blocking),
            score: result.score,
            grade: result.grade,
            fixed,
            violations,
        };
        info!(
            "Compliance: {} ({} blocking, {} bypassed, {} exempted, {} fixed)",
            if report.compliant { "pass" } else { "fail" },
            report.blocking().count(),
            report.count(Disposition::Bypassed),
            report.count(Disposition::Exempted),
            report.fixed
        );
        Ok(report)
    }

    /// Apply fixes for auto-fixable issues; returns how many succeeded
    pub async fn auto_fix(&self, project: &Path, issues: &[Issue]) -> AppResult<usize> {
        require_project(project)?;
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;
        let requested = issues.iter().filter(|i| i.auto_fixable).count();

        let fixed = Remediator::new(schema, ledger).apply_all(project, issues).await?;
        if fixed < requested {
            info!("Auto-fixed {fixed} of {requested} eligible issues");
        }
        Ok(fixed)
    }

    /// Critical issues still standing after policy evaluation
    pub fn remaining_critical(report: &ComplianceReport) -> usize {
        report
            .violations
            .iter()
            .filter(|v| v.disposition == Disposition::Standing && v.issue.severity == Severity::Critical)
            .count()
    }

    pub fn audit_report_path(project: &Path) -> PathBuf {
        project.join(AUDIT_REPORT)
    }
}

async fn read_last_audit(path: &Path) -> Option<AuditSummary> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<AuditResult>(&text) {
        Ok(audit) => Some(AuditSummary {
            id: audit.id,
            audit_type: audit.audit_type,
            score: audit.score,
            timestamp: audit.timestamp,
        }),
        Err(e) => {
            warn!("Ignoring unreadable audit report {}: {}", path.display(), e);
            None
        }
    }
}
