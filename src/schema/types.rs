//! Rule Schema data model
//!
//! Mirrors the JSON schema file. Rule groups are kept in their on-disk arrays
//! and exposed to the engine as the tagged [`Rule`] variant.

use crate::error::{AppError, AppResult};
use crate::ledger::drift::{DriftComparison, DriftTolerance};
use crate::models::{IssueCategory, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generic `version: x.y.z` / `"version": "x.y.z"` extractor
pub const DEFAULT_VERSION_PATTERN: &str =
    r#"(?im)^\W*version["']?\s*[:=]\s*["']?v?([0-9][^\s"',]*)"#;

pub const REQUIRED_FILES: &str = "required_files";
pub const CONTENT: &str = "content";
pub const VERSIONING: &str = "versioning";
pub const QUALITY: &str = "quality";

/// Scoring categories the checks record results under
pub const SCORING_CATEGORIES: &[&str] = &[REQUIRED_FILES, CONTENT, VERSIONING, QUALITY];

/// The complete declarative rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSchema {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub required_files: Vec<RequiredFileRule>,
    #[serde(default)]
    pub version_consistency_rules: Vec<VersionRule>,
    #[serde(default)]
    pub quality_metrics: QualityMetrics,
    pub scoring_categories: BTreeMap<String, u32>,
    pub grade_thresholds: Vec<GradeThreshold>,
    #[serde(default)]
    pub remediation_actions: BTreeMap<String, RemediationAction>,
    #[serde(default)]
    pub exception_conditions: ExceptionConditions,
}

/// A file every compliant project must carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFileRule {
    pub path: String,
    #[serde(default)]
    pub required_sections: Vec<String>,
    /// Optional-but-recommended headings; absence is shallow content
    #[serde(default)]
    pub recommended_sections: Vec<String>,
    /// Literal tokens that must appear somewhere in the file
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Minimum length in characters
    #[serde(default)]
    pub min_length: usize,
}

/// A version-bearing file and how to extract its version token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    pub path: String,
    /// Regex with one capture group around the version token
    #[serde(default = "default_version_pattern")]
    pub pattern: String,
}

fn default_version_pattern() -> String {
    DEFAULT_VERSION_PATTERN.to_string()
}

/// A version token located inside a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatch {
    pub value: String,
    pub line: usize,
    /// Byte range of the captured token
    pub start: usize,
    pub end: usize,
}

impl VersionMatch {
    /// `text` with this token replaced by `to`
    pub fn replace_in(&self, text: &str, to: &str) -> String {
        let mut out = String::with_capacity(text.len() + to.len());
        out.push_str(&text[..self.start]);
        out.push_str(to);
        out.push_str(&text[self.end..]);
        out
    }
}

impl VersionFile {
    pub fn regex(&self) -> AppResult<Regex> {
        Regex::new(&self.pattern).map_err(|e| {
            AppError::SchemaInvalid(vec![format!("invalid version pattern for {}: {e}", self.path)])
        })
    }

    /// First version declaration in `text`, if any
    pub fn extract(&self, text: &str) -> AppResult<Option<VersionMatch>> {
        let re = self.regex()?;
        Ok(re.captures(text).and_then(|caps| caps.get(1)).map(|m| VersionMatch {
            value: m.as_str().to_string(),
            line: text[..m.start()].matches('\n').count() + 1,
            start: m.start(),
            end: m.end(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRule {
    pub name: String,
    /// Ledger component whose canonical version these files must carry
    pub component: String,
    #[serde(default)]
    pub check_type: DriftComparison,
    #[serde(default = "default_rule_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub max_drift: DriftTolerance,
    pub files: Vec<VersionFile>,
}

fn default_rule_severity() -> Severity {
    Severity::High
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(default)]
    pub required_section_count: usize,
    #[serde(default)]
    pub min_word_count: usize,
    #[serde(default)]
    pub min_cross_references: usize,
    #[serde(default)]
    pub min_examples: usize,
    /// Headings an operating-protocol document must carry (safety, rollback)
    #[serde(default)]
    pub policy_sections: Vec<String>,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            required_section_count: 0,
            min_word_count: 0,
            min_cross_references: 0,
            min_examples: 0,
            policy_sections: vec!["Safety".to_string(), "Rollback".to_string()],
        }
    }
}

/// Minimum score for a grade; declared highest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeThreshold {
    pub grade: String,
    pub min: f64,
}

/// Kinds of remediation an auto-fixer knows how to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
    CreateFile,
    AppendSection,
    AppendField,
    SyncVersion,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub action: RemediationKind,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
}

impl RemediationAction {
    /// Eligible for unattended application
    pub fn is_automatic(&self) -> bool {
        !self.requires_approval && self.action != RemediationKind::Manual
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_bypass: Option<ExceptionPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_exemption: Option<ExceptionPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionPolicy {
    #[serde(default)]
    pub description: String,
    /// A violation is eligible when any condition matches it
    #[serde(default)]
    pub conditions: Vec<ExceptionCondition>,
    #[serde(default)]
    pub required_approvals: Vec<String>,
}

/// All present fields must match for the condition to apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<IssueCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

// =============================================================================
// TAGGED RULES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetricKind {
    SectionCount,
    WordCount,
    CrossReferences,
    Examples,
}

impl QualityMetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            QualityMetricKind::SectionCount => "quality.section_count",
            QualityMetricKind::WordCount => "quality.word_count",
            QualityMetricKind::CrossReferences => "quality.cross_references",
            QualityMetricKind::Examples => "quality.examples",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetricRule {
    pub metric: QualityMetricKind,
    pub minimum: usize,
}

/// One evaluable rule, matched exhaustively by the validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    RequiredFile(RequiredFileRule),
    VersionConsistency(VersionRule),
    QualityMetric(QualityMetricRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    RequiredFile,
    VersionConsistency,
    QualityMetric,
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::RequiredFile(_) => RuleKind::RequiredFile,
            Rule::VersionConsistency(_) => RuleKind::VersionConsistency,
            Rule::QualityMetric(_) => RuleKind::QualityMetric,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Rule::RequiredFile(r) => r.path.clone(),
            Rule::VersionConsistency(r) => r.name.clone(),
            Rule::QualityMetric(r) => r.metric.name().to_string(),
        }
    }
}

impl RuleSchema {
    /// All rules in evaluation order: required files, version rules, metrics
    pub fn rules(&self) -> Vec<Rule> {
        let metrics = &self.quality_metrics;
        let quality = [
            (QualityMetricKind::SectionCount, metrics.required_section_count),
            (QualityMetricKind::WordCount, metrics.min_word_count),
            (QualityMetricKind::CrossReferences, metrics.min_cross_references),
            (QualityMetricKind::Examples, metrics.min_examples),
        ];

        self.required_files
            .iter()
            .cloned()
            .map(Rule::RequiredFile)
            .chain(
                self.version_consistency_rules
                    .iter()
                    .cloned()
                    .map(Rule::VersionConsistency),
            )
            .chain(
                quality
                    .into_iter()
                    .filter(|(_, minimum)| *minimum > 0)
                    .map(|(metric, minimum)| Rule::QualityMetric(QualityMetricRule { metric, minimum })),
            )
            .collect()
    }

    /// Version-bearing files in declared order, paired with their rule
    pub fn version_bearing_files(&self) -> Vec<(&VersionRule, &VersionFile)> {
        self.version_consistency_rules
            .iter()
            .flat_map(|rule| rule.files.iter().map(move |file| (rule, file)))
            .collect()
    }

    pub fn is_required_file(&self, path: &str) -> bool {
        self.required_files.iter().any(|r| r.path == path)
    }
}
