//! Auditor
//!
//! Graded, advisory quality checks that run independently of pass/fail
//! compliance. Each audit type selects a set of categories; every category
//! yields its own score, findings and recommendations, and the overall score
//! is the weighted mean using the schema's scoring weights.

pub mod accuracy;
pub mod completeness;
pub mod consistency;
pub mod security;

use crate::error::{AppError, AppResult};
use crate::ledger::{Ledger, VersionLedger};
use crate::models::Severity;
use crate::safety::paths::relative_display;
use crate::safety::validate_path;
use crate::schema::{RuleSchema, SchemaStore};
use crate::validator::{require_project, write_report};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

/// Directories never descended into
const SKIPPED_DIRS: &[&str] = &[".git", ".charter", "target", "node_modules", "dist", "build"];

/// Text files larger than this are not inspected
const MAX_FILE_BYTES: u64 = 1024 * 1024;

const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "json", "toml", "yaml", "yml", "ini", "cfg", "conf", "env",
];

// =============================================================================
// MODELS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Quality,
    Compliance,
    Security,
}

impl AuditType {
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            AuditType::Quality => &[completeness::NAME, consistency::NAME, accuracy::NAME],
            AuditType::Compliance => &[completeness::NAME, accuracy::NAME, security::SAFETY_POLICY],
            AuditType::Security => &[security::SECRET_EXPOSURE, security::SAFETY_POLICY],
        }
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditType::Quality => f.write_str("quality"),
            AuditType::Compliance => f.write_str("compliance"),
            AuditType::Security => f.write_str("security"),
        }
    }
}

impl FromStr for AuditType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quality" => Ok(AuditType::Quality),
            "compliance" => Ok(AuditType::Compliance),
            "security" => Ok(AuditType::Security),
            other => Err(format!("unknown audit type '{other}' (quality, compliance, security)")),
        }
    }
}

/// One advisory finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl AuditFinding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCategory {
    pub name: String,
    pub score: f64,
    pub issues: Vec<AuditFinding>,
    pub recommendations: Vec<String>,
}

impl AuditCategory {
    pub fn new(name: &str, score: f64, issues: Vec<AuditFinding>, recommendations: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            score: round(score.clamp(0.0, 100.0)),
            issues,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub id: Uuid,
    pub audit_type: AuditType,
    pub score: f64,
    pub categories: Vec<AuditCategory>,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// WORKSPACE
// =============================================================================

/// A text file inside the audited project
#[derive(Debug, Clone)]
pub struct Document {
    /// Project-relative path with `/` separators
    pub path: String,
    pub text: String,
}

impl Document {
    pub fn is_markdown(&self) -> bool {
        self.path.ends_with(".md") || self.path.ends_with(".markdown")
    }
}

/// Everything a category check may look at
pub struct Workspace {
    pub root: PathBuf,
    /// Schema-declared files, read by path whatever their name or size
    pub declared: Vec<Document>,
    /// Text files found by walking the project, for the heuristic scans
    pub documents: Vec<Document>,
    pub schema: Arc<RuleSchema>,
    pub ledger: Arc<Ledger>,
    /// Operating-protocol document holding the safety policy
    pub constitution: String,
}

impl Workspace {
    pub fn document(&self, path: &str) -> Option<&Document> {
        self.declared
            .iter()
            .chain(&self.documents)
            .find(|d| d.path == path)
    }

    pub fn markdown(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| d.is_markdown())
    }
}

fn is_text_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with(".env") {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Text files under `root` in sorted order, skipping build and VCS directories
pub fn collect_documents(root: &Path) -> Vec<Document> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !SKIPPED_DIRS.contains(&entry.file_name().to_str().unwrap_or_default())
        });

    let mut documents = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            debug!("Skipping large or unreadable {}", entry.path().display());
            continue;
        }
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            debug!("Skipping non-UTF-8 {}", entry.path().display());
            continue;
        };
        documents.push(Document {
            path: relative_display(entry.path(), root),
            text,
        });
    }
    documents
}

/// Read every schema-declared file plus the operating protocol.
///
/// Absent or non-text files are left out and surface as missing in the
/// category checks. A schema path escaping the project is fatal; an escaping
/// protocol path is left to the safety-policy check.
pub async fn read_declared(root: &Path, schema: &RuleSchema, constitution: &str) -> AppResult<Vec<Document>> {
    let mut paths: Vec<&str> = schema.required_files.iter().map(|r| r.path.as_str()).collect();
    paths.extend(schema.version_bearing_files().into_iter().map(|(_, f)| f.path.as_str()));

    let mut targets = Vec::new();
    for path in paths {
        targets.push((path, validate_path(path, root)?));
    }
    if let Ok(resolved) = validate_path(constitution, root) {
        targets.push((constitution, resolved));
    }

    let mut documents: Vec<Document> = Vec::new();
    for (path, resolved) in targets {
        if documents.iter().any(|d| d.path == path) {
            continue;
        }
        match tokio::fs::read_to_string(&resolved).await {
            Ok(text) => documents.push(Document {
                path: path.to_string(),
                text,
            }),
            Err(e) => debug!("Declared file {} not loaded: {}", path, e),
        }
    }
    Ok(documents)
}

// =============================================================================
// SCORING HELPERS
// =============================================================================

pub fn round(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

/// Percentage of passed checks; no checks means nothing to fault
pub fn ratio_score(passed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        passed as f64 * 100.0 / total as f64
    }
}

/// 100 minus a per-severity penalty for every finding
pub fn deduction_score(findings: &[AuditFinding]) -> f64 {
    let penalty: f64 = findings
        .iter()
        .map(|f| match f.severity {
            Severity::Critical => 40.0,
            Severity::High => 25.0,
            Severity::Medium => 10.0,
            Severity::Low => 3.0,
            Severity::Info => 0.0,
        })
        .sum();
    (100.0 - penalty).max(0.0)
}

/// Schema scoring category that weights an audit category
pub fn weight_source(category: &str) -> Option<&'static str> {
    match category {
        completeness::NAME => Some("content"),
        consistency::NAME => Some("quality"),
        accuracy::NAME => Some("versioning"),
        security::SAFETY_POLICY => Some("required_files"),
        security::SECRET_EXPOSURE => Some("content"),
        _ => None,
    }
}

/// Weighted mean of category scores using the schema's weights (unknown: 1)
pub fn overall_score(categories: &[AuditCategory], schema: &RuleSchema) -> f64 {
    let weight = |name: &str| -> f64 {
        weight_source(name)
            .and_then(|source| schema.scoring_categories.get(source))
            .map_or(1.0, |w| f64::from(*w))
    };

    let total: f64 = categories.iter().map(|c| weight(&c.name)).sum();
    if total == 0.0 {
        return 0.0;
    }
    let weighted: f64 = categories.iter().map(|c| c.score * weight(&c.name)).sum();
    round(weighted / total)
}

// =============================================================================
// AUDITOR
// =============================================================================

/// Contract every auditor implementation satisfies
#[async_trait]
pub trait Auditor: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    async fn audit(&self, project: &Path, audit_type: AuditType) -> AppResult<AuditResult>;

    async fn generate_report(&self, result: &AuditResult, output: &Path) -> AppResult<()> {
        write_report(output, result).await
    }
}

/// Built-in auditor over the project's text documents
pub struct ProtocolAuditor {
    schema: Arc<SchemaStore>,
    ledger: Arc<VersionLedger>,
    constitution: String,
}

impl ProtocolAuditor {
    pub fn new(schema: Arc<SchemaStore>, ledger: Arc<VersionLedger>, constitution: impl Into<String>) -> Self {
        Self {
            schema,
            ledger,
            constitution: constitution.into(),
        }
    }
}

#[async_trait]
impl Auditor for ProtocolAuditor {
    fn name(&self) -> &str {
        "protocol-auditor"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn audit(&self, project: &Path, audit_type: AuditType) -> AppResult<AuditResult> {
        require_project(project)?;
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;

        let root = project.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || collect_documents(&root))
            .await
            .map_err(|e| AppError::Internal(format!("document scan failed: {e}")))?;
        info!(
            "Auditing {} ({} audit, {} documents)",
            project.display(),
            audit_type,
            documents.len()
        );

        let declared = read_declared(project, &schema, &self.constitution).await?;

        let workspace = Workspace {
            root: project.to_path_buf(),
            declared,
            documents,
            schema: schema.clone(),
            ledger,
            constitution: self.constitution.clone(),
        };

        let mut categories = Vec::new();
        for name in audit_type.categories() {
            let category = match *name {
                completeness::NAME => completeness::audit(&workspace),
                consistency::NAME => consistency::audit(&workspace),
                accuracy::NAME => accuracy::audit(&workspace)?,
                security::SECRET_EXPOSURE => security::secret_exposure(&workspace),
                security::SAFETY_POLICY => security::safety_policy(&workspace)?,
                other => return Err(AppError::Internal(format!("unknown audit category {other}"))),
            };
            debug!("{}: {:.1} ({} findings)", category.name, category.score, category.issues.len());
            categories.push(category);
        }

        let result = AuditResult {
            id: Uuid::new_v4(),
            audit_type,
            score: overall_score(&categories, &schema),
            categories,
            timestamp: Utc::now(),
        };
        info!("Audit score {:.1}", result.score);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{RequiredFileRule, VersionFile};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_collect_skips_vcs_and_build_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join(".git/config.txt"), "x").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/README.md"), "x").unwrap();
        std::fs::write(dir.path().join("docs/guide.md"), "guide").unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let paths: Vec<String> = collect_documents(dir.path()).into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["README.md", "docs/guide.md"]);
    }

    #[tokio::test]
    async fn test_declared_files_are_found_without_text_extension() {
        let dir = TempDir::new().unwrap();
        let charter = dir.path().join(".charter");
        let mut schema = SchemaStore::builtin().unwrap();
        schema.required_files = vec![RequiredFileRule {
            path: "LICENSE".into(),
            required_sections: vec![],
            recommended_sections: vec![],
            required_fields: vec![],
            min_length: 0,
        }];
        schema.version_consistency_rules[0].files.push(VersionFile {
            path: "VERSION".into(),
            pattern: r"([0-9][^\s]*)".into(),
        });
        let store = SchemaStore::new(charter.join("schema.json"));
        store.save(&schema).await.unwrap();

        std::fs::write(dir.path().join("LICENSE"), "MIT License\n").unwrap();
        std::fs::write(dir.path().join("VERSION"), "2.0.0\n").unwrap();

        let auditor = ProtocolAuditor::new(
            Arc::new(store),
            Arc::new(VersionLedger::with_builtin_fallback(charter.join("versions.json"))),
            "PROTOCOL.md",
        );
        let result = auditor.audit(dir.path(), AuditType::Quality).await.unwrap();

        let completeness = &result.categories[0];
        assert!(completeness
            .issues
            .iter()
            .all(|f| !f.message.contains("does not exist")));
        let accuracy = result
            .categories
            .iter()
            .find(|c| c.name == accuracy::NAME)
            .unwrap();
        assert!(accuracy
            .issues
            .iter()
            .any(|f| f.file.as_deref() == Some("VERSION") && f.message.contains("ledger has 1.0.0")));
    }

    #[test]
    fn test_overall_score_uses_schema_weights() {
        let schema = SchemaStore::builtin().unwrap();
        let categories = vec![
            AuditCategory::new(completeness::NAME, 100.0, vec![], vec![]),
            AuditCategory::new(consistency::NAME, 0.0, vec![], vec![]),
        ];
        // content 30, quality 10
        assert_eq!(overall_score(&categories, &schema), 75.0);
    }

    #[test]
    fn test_deduction_score_floors_at_zero() {
        let findings = vec![AuditFinding::new(Severity::Critical, "x"); 3];
        assert_eq!(deduction_score(&findings), 0.0);
    }

    #[test]
    fn test_audit_type_parse() {
        assert_eq!("Security".parse::<AuditType>().unwrap(), AuditType::Security);
        assert!("speed".parse::<AuditType>().is_err());
    }
}
