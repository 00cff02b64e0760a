//! Consistency heuristics
//!
//! Terminology and formatting uniformity across markdown documents:
//! product-name spellings, list-marker style, heading structure.

use crate::audit::{deduction_score, AuditCategory, AuditFinding, Document, Workspace};
use crate::models::Severity;
use crate::validator::markdown;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

pub const NAME: &str = "consistency";

/// (variant, preferred) spellings
const TERMS: &[(&str, &str)] = &[
    ("Github", "GitHub"),
    ("Gitlab", "GitLab"),
    ("Javascript", "JavaScript"),
    ("Typescript", "TypeScript"),
    ("Postgresql", "PostgreSQL"),
    ("e-mail", "email"),
    ("web site", "website"),
    ("data base", "database"),
];

static TERM_PATTERNS: Lazy<Vec<(Regex, &'static str, &'static str)>> = Lazy::new(|| {
    TERMS
        .iter()
        .map(|(variant, preferred)| {
            let re = Regex::new(&format!(r"\b{}\b", regex::escape(variant))).expect("term pattern");
            (re, *variant, *preferred)
        })
        .collect()
});

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([-*+])\s+\S").expect("list pattern"));

pub fn audit(ws: &Workspace) -> AuditCategory {
    let docs: Vec<&Document> = ws.markdown().collect();
    let mut findings = Vec::new();

    for doc in &docs {
        findings.extend(terminology(doc));
        findings.extend(heading_structure(doc));
    }
    findings.extend(list_markers(&docs));

    let mut recommendations = Vec::new();
    if !findings.is_empty() {
        recommendations.push("Align terminology and formatting across documents".to_string());
    }
    if findings.iter().any(|f| f.message.contains("heading")) {
        recommendations.push("Use a single top-level heading and do not skip heading levels".to_string());
    }

    AuditCategory::new(NAME, deduction_score(&findings), findings, recommendations)
}

fn terminology(doc: &Document) -> Vec<AuditFinding> {
    let mut out = Vec::new();
    let mut in_fence = false;
    for (idx, line) in doc.text.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for (re, variant, preferred) in TERM_PATTERNS.iter() {
            if re.is_match(line) {
                out.push(
                    AuditFinding::new(Severity::Low, format!("'{variant}' should be written '{preferred}'"))
                        .in_file(&doc.path)
                        .at_line(idx + 1),
                );
            }
        }
    }
    out
}

fn heading_structure(doc: &Document) -> Vec<AuditFinding> {
    let headings = markdown::headings(&doc.text);
    let mut out = Vec::new();

    let top_level = headings.iter().filter(|h| h.level == 1).count();
    if top_level > 1 {
        out.push(
            AuditFinding::new(Severity::Low, format!("{top_level} top-level headings, expected one"))
                .in_file(&doc.path),
        );
    }

    for pair in headings.windows(2) {
        if pair[1].level > pair[0].level + 1 {
            out.push(
                AuditFinding::new(
                    Severity::Low,
                    format!(
                        "heading '{}' jumps from level {} to {}",
                        pair[1].title, pair[0].level, pair[1].level
                    ),
                )
                .in_file(&doc.path)
                .at_line(pair[1].line),
            );
        }
    }
    out
}

/// Flag documents whose bullet style differs from the project majority
fn list_markers(docs: &[&Document]) -> Vec<AuditFinding> {
    let mut per_doc: Vec<(&Document, char)> = Vec::new();
    let mut votes: BTreeMap<char, usize> = BTreeMap::new();

    for doc in docs {
        let mut counts: BTreeMap<char, usize> = BTreeMap::new();
        let mut in_fence = false;
        for line in doc.text.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(marker) = LIST_MARKER.captures(line).and_then(|c| c[1].chars().next()) {
                *counts.entry(marker).or_default() += 1;
            }
        }
        if let Some((marker, _)) = counts.iter().max_by_key(|(_, n)| **n) {
            per_doc.push((*doc, *marker));
            *votes.entry(*marker).or_default() += 1;
        }
    }

    let Some((majority, _)) = votes.iter().max_by_key(|(_, n)| **n) else {
        return Vec::new();
    };
    per_doc
        .into_iter()
        .filter(|(_, marker)| marker != majority)
        .map(|(doc, marker)| {
            AuditFinding::new(
                Severity::Low,
                format!("uses '{marker}' list markers, other documents use '{majority}'"),
            )
            .in_file(&doc.path)
        })
        .collect()
}
