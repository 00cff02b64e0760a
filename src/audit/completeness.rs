//! Documentation completeness
//!
//! Ratio of required and recommended sections present, plus the quality
//! metric floors (words, cross-references, examples) over the required set.

use crate::audit::{ratio_score, AuditCategory, AuditFinding, Workspace};
use crate::models::Severity;
use crate::schema::QualityMetricKind;
use crate::validator::checks::measure;
use crate::validator::markdown;

pub const NAME: &str = "completeness";

pub fn audit(ws: &Workspace) -> AuditCategory {
    let mut findings = Vec::new();
    let mut passed = 0;
    let mut total = 0;
    let mut required_text = String::new();

    for rule in &ws.schema.required_files {
        let sections = rule.required_sections.iter().chain(&rule.recommended_sections);
        let Some(doc) = ws.document(&rule.path) else {
            total += rule.required_sections.len() + rule.recommended_sections.len() + 1;
            findings.push(AuditFinding::new(Severity::High, format!("{} does not exist", rule.path)).in_file(&rule.path));
            continue;
        };

        total += 1;
        passed += 1;
        required_text.push_str(&doc.text);
        required_text.push('\n');

        for section in sections {
            total += 1;
            if markdown::has_section(&doc.text, section) {
                passed += 1;
            } else {
                findings.push(
                    AuditFinding::new(Severity::Medium, format!("section '{section}' not found"))
                        .in_file(&rule.path),
                );
            }
        }
    }

    let metrics = &ws.schema.quality_metrics;
    let floors = [
        (QualityMetricKind::WordCount, metrics.min_word_count, "words"),
        (QualityMetricKind::CrossReferences, metrics.min_cross_references, "cross-references"),
        (QualityMetricKind::Examples, metrics.min_examples, "examples"),
    ];
    for (metric, minimum, label) in floors {
        if minimum == 0 {
            continue;
        }
        total += 1;
        let value = measure(metric, &required_text);
        if value >= minimum {
            passed += 1;
        } else {
            findings.push(AuditFinding::new(
                Severity::Low,
                format!("required documents have {value} {label}, expected at least {minimum}"),
            ));
        }
    }

    let mut recommendations = Vec::new();
    if findings.iter().any(|f| f.severity == Severity::High) {
        recommendations.push("Create the missing protocol documents (charter init)".to_string());
    }
    if findings.iter().any(|f| f.severity == Severity::Medium) {
        recommendations.push("Add the missing sections to the required documents".to_string());
    }
    if findings.iter().any(|f| f.severity == Severity::Low) {
        recommendations.push("Expand documentation with more prose, links and examples".to_string());
    }

    AuditCategory::new(NAME, ratio_score(passed, total), findings, recommendations)
}
