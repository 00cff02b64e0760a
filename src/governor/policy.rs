//! Exception policy evaluation
//!
//! Per violation, in order:
//! 1. Emergency bypass with every required approval → downgraded to info,
//!    written to the audit trail, valid for this invocation only
//! 2. Legacy exemption with a remediation plan reference → kept, not blocking
//! 3. Otherwise the violation stands; critical (or high, in strict mode) blocks

use crate::models::{Issue, Severity};
use crate::schema::types::{ExceptionCondition, ExceptionPolicy, RuleSchema};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Log target for mandatory exception-policy notation
pub const AUDIT_TRAIL: &str = "charter::audit_trail";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Standing,
    Bypassed,
    Exempted,
}

/// Caller-supplied evidence for exception policies
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub approvals: Vec<String>,
    pub remediation_plan: Option<String>,
    /// High-severity violations also block
    pub strict: bool,
}

impl PolicyContext {
    fn approves(&self, policy: &ExceptionPolicy) -> bool {
        policy
            .required_approvals
            .iter()
            .all(|required| self.approvals.iter().any(|a| a == required))
    }

    fn plan(&self) -> Option<&str> {
        self.remediation_plan
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// An issue after exception policies were applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub issue: Issue,
    pub disposition: Disposition,
    pub blocking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_severity: Option<Severity>,
}

/// All present fields must match
pub fn condition_matches(condition: &ExceptionCondition, issue: &Issue) -> bool {
    condition.category.map_or(true, |c| c == issue.category)
        && condition.severity.map_or(true, |s| s == issue.severity)
        && condition.rule.as_deref().map_or(true, |r| r == issue.rule)
        && condition.path_prefix.as_deref().map_or(true, |prefix| {
            issue.file.as_deref().is_some_and(|f| f.starts_with(prefix))
        })
}

/// Eligible when any declared condition matches
pub fn is_eligible(policy: &ExceptionPolicy, issue: &Issue) -> bool {
    policy.conditions.iter().any(|c| condition_matches(c, issue))
}

pub fn evaluate(schema: &RuleSchema, issue: Issue, ctx: &PolicyContext) -> Violation {
    let exceptions = &schema.exception_conditions;

    if let Some(bypass) = &exceptions.emergency_bypass {
        if !ctx.approvals.is_empty() && is_eligible(bypass, &issue) && ctx.approves(bypass) {
            warn!(
                target: AUDIT_TRAIL,
                rule = %issue.rule,
                category = %issue.category,
                severity = %issue.severity,
                approvals = ?ctx.approvals,
                "Emergency bypass applied for this invocation: {}",
                issue.message
            );
            let original = issue.severity;
            let mut issue = issue;
            issue.severity = Severity::Info;
            return Violation {
                issue,
                disposition: Disposition::Bypassed,
                blocking: false,
                original_severity: Some(original),
            };
        }
    }

    if let Some(legacy) = &exceptions.legacy_exemption {
        if let Some(plan) = ctx.plan() {
            if is_eligible(legacy, &issue) && ctx.approves(legacy) {
                warn!(
                    target: AUDIT_TRAIL,
                    rule = %issue.rule,
                    category = %issue.category,
                    remediation_plan = plan,
                    "Legacy exemption applied: {}",
                    issue.message
                );
                return Violation {
                    issue,
                    disposition: Disposition::Exempted,
                    blocking: false,
                    original_severity: None,
                };
            }
        }
    }

    let blocking = issue.severity == Severity::Critical || (ctx.strict && issue.severity == Severity::High);
    Violation {
        issue,
        disposition: Disposition::Standing,
        blocking,
        original_severity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueCategory;
    use crate::schema::SchemaStore;
    use pretty_assertions::assert_eq;

    fn drift() -> Issue {
        Issue::new(Severity::Critical, IssueCategory::VersionDrift, "protocol-version", "drift")
            .in_file("package.json")
    }

    fn schema() -> RuleSchema {
        SchemaStore::builtin().unwrap()
    }

    #[test]
    fn test_bypass_requires_approval() {
        let v = evaluate(&schema(), drift(), &PolicyContext::default());
        assert_eq!(v.disposition, Disposition::Standing);
        assert!(v.blocking);

        let wrong = PolicyContext {
            approvals: vec!["someone-else".into()],
            ..Default::default()
        };
        assert_eq!(evaluate(&schema(), drift(), &wrong).disposition, Disposition::Standing);
    }

    #[test]
    fn test_bypass_downgrades_to_info() {
        let ctx = PolicyContext {
            approvals: vec!["incident-commander".into()],
            ..Default::default()
        };
        let v = evaluate(&schema(), drift(), &ctx);
        assert_eq!(v.disposition, Disposition::Bypassed);
        assert_eq!(v.issue.severity, Severity::Info);
        assert_eq!(v.original_severity, Some(Severity::Critical));
        assert!(!v.blocking);
    }

    #[test]
    fn test_legacy_exemption_needs_plan() {
        let issue = Issue::new(Severity::Critical, IssueCategory::MissingFile, "legacy/README.md", "missing")
            .in_file("legacy/README.md");

        let v = evaluate(&schema(), issue.clone(), &PolicyContext::default());
        assert!(v.blocking);

        let ctx = PolicyContext {
            remediation_plan: Some("PLAN-42".into()),
            ..Default::default()
        };
        let v = evaluate(&schema(), issue, &ctx);
        assert_eq!(v.disposition, Disposition::Exempted);
        assert_eq!(v.issue.severity, Severity::Critical);
        assert!(!v.blocking);
    }

    #[test]
    fn test_ineligible_issue_stands_even_with_approval() {
        let ctx = PolicyContext {
            approvals: vec!["incident-commander".into()],
            ..Default::default()
        };
        let issue = Issue::new(Severity::Critical, IssueCategory::MissingFile, "README.md", "missing")
            .in_file("README.md");
        let v = evaluate(&schema(), issue, &ctx);
        assert_eq!(v.disposition, Disposition::Standing);
        assert!(v.blocking);
    }

    #[test]
    fn test_strict_mode_blocks_high() {
        let issue = Issue::new(Severity::High, IssueCategory::VersionDrift, "protocol-version", "drift");
        assert!(!evaluate(&schema(), issue.clone(), &PolicyContext::default()).blocking);
        let strict = PolicyContext {
            strict: true,
            ..Default::default()
        };
        assert!(evaluate(&schema(), issue, &strict).blocking);
    }
}
