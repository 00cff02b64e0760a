//! Shared result models
//!
//! Types produced by the Validator and consumed by the Governor, the CLI and
//! the report writers.

pub mod issue;

pub use issue::{FixHint, Issue, IssueCategory, Severity};

use serde::{Deserialize, Serialize};

/// Recommendation priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Required,
    Recommended,
    Optional,
}

impl From<Severity> for RecommendationPriority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical | Severity::High => RecommendationPriority::Required,
            Severity::Medium => RecommendationPriority::Recommended,
            Severity::Low | Severity::Info => RecommendationPriority::Optional,
        }
    }
}

/// One recommendation per distinct issue category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub category: IssueCategory,
    pub priority: RecommendationPriority,
    pub title: String,
    pub description: String,
    pub action: Option<String>,
}

/// Outcome of a validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub score: f64,
    pub grade: String,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    /// Number of issues resolved by auto-fix during this run
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fixed: usize,
}

impl ValidationResult {
    pub fn critical_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_critical()).count()
    }

    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}
