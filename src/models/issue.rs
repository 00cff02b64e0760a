//! Issues and their classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Downgraded by an emergency bypass; never blocks
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Issue categories; also the keys of the schema's remediation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    MissingFile,
    MissingSection,
    MissingField,
    ShallowContent,
    VersionDrift,
    QualityMetric,
    UnreadableFile,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 7] = [
        IssueCategory::MissingFile,
        IssueCategory::MissingSection,
        IssueCategory::MissingField,
        IssueCategory::ShallowContent,
        IssueCategory::VersionDrift,
        IssueCategory::QualityMetric,
        IssueCategory::UnreadableFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::MissingFile => "missing_file",
            IssueCategory::MissingSection => "missing_section",
            IssueCategory::MissingField => "missing_field",
            IssueCategory::ShallowContent => "shallow_content",
            IssueCategory::VersionDrift => "version_drift",
            IssueCategory::QualityMetric => "quality_metric",
            IssueCategory::UnreadableFile => "unreadable_file",
        }
    }

    /// Human title used for recommendations
    pub fn title(&self) -> &'static str {
        match self {
            IssueCategory::MissingFile => "Add Missing Protocol Files",
            IssueCategory::MissingSection => "Complete Required Sections",
            IssueCategory::MissingField => "Add Required Fields",
            IssueCategory::ShallowContent => "Expand Shallow Documents",
            IssueCategory::VersionDrift => "Reconcile Version Drift",
            IssueCategory::QualityMetric => "Raise Documentation Quality",
            IssueCategory::UnreadableFile => "Fix Unreadable Files",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown issue category: {s}"))
    }
}

/// Concrete remediation an auto-fixer can apply for an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FixHint {
    CreateFile { path: String },
    AppendSection { path: String, heading: String },
    AppendField { path: String, field: String },
    ReplaceVersion {
        path: String,
        pattern: String,
        from: String,
        to: String,
    },
}

/// A single finding produced by a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub auto_fixable: bool,
    /// Name of the rule or metric that produced this issue
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixHint>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        category: IssueCategory,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            file: None,
            line: None,
            auto_fixable: false,
            rule: rule.into(),
            fix: None,
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

    pub fn with_fix(mut self, fix: FixHint) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
