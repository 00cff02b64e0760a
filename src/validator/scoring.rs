//! Weighted scoring and recommendations

use crate::models::{Issue, IssueCategory, Recommendation, RecommendationPriority, Severity};
use crate::schema::types::{RemediationKind, RuleSchema};
use crate::validator::checks::CategoryTally;
use std::collections::BTreeMap;

/// Σ(category pass ratio × weight), clamped to [0, 100] and rounded to 0.01
pub fn score(weights: &BTreeMap<String, u32>, tally: &BTreeMap<String, CategoryTally>) -> f64 {
    let raw: f64 = weights
        .iter()
        .map(|(category, weight)| {
            let ratio = tally.get(category).map_or(1.0, CategoryTally::ratio);
            ratio * f64::from(*weight)
        })
        .sum();
    (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// One recommendation per distinct issue category, in first-seen order
pub fn recommendations(issues: &[Issue], schema: &RuleSchema) -> Vec<Recommendation> {
    let mut order: Vec<IssueCategory> = Vec::new();
    let mut grouped: BTreeMap<IssueCategory, Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        if !grouped.contains_key(&issue.category) {
            order.push(issue.category);
        }
        grouped.entry(issue.category).or_default().push(issue);
    }

    order
        .into_iter()
        .map(|category| {
            let group = &grouped[&category];
            let worst = group.iter().map(|i| i.severity).max().unwrap_or(Severity::Low);
            let mut files: Vec<&str> = Vec::new();
            for file in group.iter().filter_map(|i| i.file.as_deref()) {
                if !files.contains(&file) {
                    files.push(file);
                }
            }

            let description = if files.is_empty() {
                format!("{} issue(s): {}", group.len(), group[0].message)
            } else {
                format!("{} issue(s) in {}", group.len(), files.join(", "))
            };

            Recommendation {
                category,
                priority: RecommendationPriority::from(worst),
                title: category.title().to_string(),
                description,
                action: schema.remediation_for(category).map(|action| {
                    let automatic = if action.is_automatic() {
                        " (run with --fix)"
                    } else if action.requires_approval {
                        " (requires approval)"
                    } else {
                        ""
                    };
                    format!("{}{automatic}", describe(action.action))
                }),
            }
        })
        .collect()
}

fn describe(kind: RemediationKind) -> &'static str {
    match kind {
        RemediationKind::CreateFile => "Create the missing files from the protocol template",
        RemediationKind::AppendSection => "Append the missing sections",
        RemediationKind::AppendField => "Add the required fields",
        RemediationKind::SyncVersion => "Synchronize declared versions with the ledger",
        RemediationKind::Manual => "Review and update the documents manually",
    }
}
