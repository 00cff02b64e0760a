//! Rule evaluation
//!
//! Walks the schema's tagged rules in declared order and records, per scoring
//! category, how many checks ran and how many passed. Per-file read failures
//! become issues; only path-containment violations abort the scan.

use crate::error::AppResult;
use crate::ledger::{assess, Drift, Ledger};
use crate::models::{FixHint, Issue, IssueCategory, Severity};
use crate::safety::validate_path;
use crate::schema::types::{QualityMetricKind, QualityMetricRule, RequiredFileRule, Rule, RuleSchema, VersionRule};
use crate::validator::markdown;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub use crate::schema::types::{CONTENT, QUALITY, REQUIRED_FILES, VERSIONING};

/// Passed/total counters for one scoring category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTally {
    pub passed: usize,
    pub total: usize,
}

impl CategoryTally {
    /// Categories with no checks count as fully passed
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub issues: Vec<Issue>,
    pub tally: BTreeMap<String, CategoryTally>,
}

impl Evaluation {
    fn record(&mut self, category: &str, passed: bool) {
        self.record_many(category, usize::from(passed), 1);
    }

    fn record_many(&mut self, category: &str, passed: usize, total: usize) {
        let entry = self.tally.entry(category.to_string()).or_default();
        entry.passed += passed;
        entry.total += total;
    }
}

/// Contents of a file the checks care about
#[derive(Debug, Clone)]
enum Document {
    Missing,
    Unreadable(String),
    Text(String),
}

async fn read_document(path: &Path) -> Document {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Document::Text(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::Missing,
        Err(e) => Document::Unreadable(e.to_string()),
    }
}

/// Evaluate every schema rule against the project at `project`
pub async fn evaluate(project: &Path, schema: &RuleSchema, ledger: &Ledger) -> AppResult<Evaluation> {
    let mut eval = Evaluation::default();
    let mut documents: BTreeMap<String, Document> = BTreeMap::new();

    for rule in &schema.required_files {
        let path = validate_path(&rule.path, project)?;
        documents.insert(rule.path.clone(), read_document(&path).await);
    }

    for rule in schema.rules() {
        match rule {
            Rule::RequiredFile(rule) => {
                let doc = documents.get(&rule.path).cloned().unwrap_or(Document::Missing);
                check_required_file(&mut eval, &rule, &doc);
            }
            Rule::VersionConsistency(rule) => {
                check_version_rule(&mut eval, project, schema, ledger, &rule, &documents).await?;
            }
            Rule::QualityMetric(metric) => {
                check_quality_metric(&mut eval, &metric, &documents);
            }
        }
    }

    for issue in &mut eval.issues {
        issue.auto_fixable = issue.fix.is_some() && schema.is_auto_fixable(issue.category);
    }

    debug!(
        "Evaluated {} rules, {} issues",
        schema.rules().len(),
        eval.issues.len()
    );
    Ok(eval)
}

// =============================================================================
// REQUIRED FILES
// =============================================================================

fn content_check_count(rule: &RequiredFileRule) -> usize {
    rule.required_sections.len()
        + rule.recommended_sections.len()
        + rule.required_fields.len()
        + usize::from(rule.min_length > 0)
}

fn check_required_file(eval: &mut Evaluation, rule: &RequiredFileRule, doc: &Document) {
    let text = match doc {
        Document::Missing => {
            eval.record(REQUIRED_FILES, false);
            eval.record_many(CONTENT, 0, content_check_count(rule));
            eval.issues.push(
                Issue::new(
                    Severity::Critical,
                    IssueCategory::MissingFile,
                    &rule.path,
                    format!("Required file {} is missing", rule.path),
                )
                .in_file(&rule.path)
                .with_fix(FixHint::CreateFile { path: rule.path.clone() }),
            );
            return;
        }
        Document::Unreadable(reason) => {
            eval.record(REQUIRED_FILES, true);
            eval.record_many(CONTENT, 0, content_check_count(rule));
            eval.issues.push(
                Issue::new(
                    Severity::Critical,
                    IssueCategory::UnreadableFile,
                    &rule.path,
                    format!("Cannot read {}: {reason}", rule.path),
                )
                .in_file(&rule.path),
            );
            return;
        }
        Document::Text(text) => text,
    };

    eval.record(REQUIRED_FILES, true);

    if rule.min_length > 0 {
        let length = text.chars().count();
        let ok = length >= rule.min_length;
        eval.record(CONTENT, ok);
        if !ok {
            eval.issues.push(
                Issue::new(
                    Severity::Medium,
                    IssueCategory::ShallowContent,
                    &rule.path,
                    format!(
                        "{} has {length} characters, minimum is {}",
                        rule.path, rule.min_length
                    ),
                )
                .in_file(&rule.path),
            );
        }
    }

    for section in &rule.required_sections {
        let ok = markdown::has_section(text, section);
        eval.record(CONTENT, ok);
        if !ok {
            eval.issues.push(
                Issue::new(
                    Severity::Critical,
                    IssueCategory::MissingSection,
                    &rule.path,
                    format!("{} is missing required section '{section}'", rule.path),
                )
                .in_file(&rule.path)
                .with_fix(FixHint::AppendSection {
                    path: rule.path.clone(),
                    heading: section.clone(),
                }),
            );
        }
    }

    for section in &rule.recommended_sections {
        let ok = markdown::has_section(text, section);
        eval.record(CONTENT, ok);
        if !ok {
            eval.issues.push(
                Issue::new(
                    Severity::Medium,
                    IssueCategory::ShallowContent,
                    &rule.path,
                    format!("{} should have a '{section}' section", rule.path),
                )
                .in_file(&rule.path)
                .with_fix(FixHint::AppendSection {
                    path: rule.path.clone(),
                    heading: section.clone(),
                }),
            );
        }
    }

    for field in &rule.required_fields {
        let ok = text.contains(field.as_str());
        eval.record(CONTENT, ok);
        if !ok {
            eval.issues.push(
                Issue::new(
                    Severity::Critical,
                    IssueCategory::MissingField,
                    &rule.path,
                    format!("{} is missing required field '{field}'", rule.path),
                )
                .in_file(&rule.path)
                .with_fix(FixHint::AppendField {
                    path: rule.path.clone(),
                    field: field.clone(),
                }),
            );
        }
    }
}

// =============================================================================
// VERSION CONSISTENCY
// =============================================================================

async fn check_version_rule(
    eval: &mut Evaluation,
    project: &Path,
    schema: &RuleSchema,
    ledger: &Ledger,
    rule: &VersionRule,
    documents: &BTreeMap<String, Document>,
) -> AppResult<()> {
    let Some(canonical) = ledger.components.get(&rule.component).map(|c| c.current.as_str()) else {
        eval.record(VERSIONING, false);
        eval.issues.push(Issue::new(
            Severity::High,
            IssueCategory::VersionDrift,
            &rule.name,
            format!("Component '{}' is not tracked in the version ledger", rule.component),
        ));
        return Ok(());
    };

    for file in &rule.files {
        let path = validate_path(&file.path, project)?;
        let doc = match documents.get(&file.path) {
            Some(doc) => doc.clone(),
            None => read_document(&path).await,
        };
        let required = schema.is_required_file(&file.path);

        let text = match doc {
            // Reported once by the required-file check; optional files are not applicable
            Document::Missing => {
                if required {
                    eval.record(VERSIONING, false);
                }
                continue;
            }
            Document::Unreadable(reason) => {
                eval.record(VERSIONING, false);
                if !required {
                    eval.issues.push(
                        Issue::new(
                            Severity::Critical,
                            IssueCategory::UnreadableFile,
                            &rule.name,
                            format!("Cannot read {}: {reason}", file.path),
                        )
                        .in_file(&file.path),
                    );
                }
                continue;
            }
            Document::Text(text) => text,
        };

        let Some(found) = file.extract(&text)? else {
            eval.record(VERSIONING, false);
            eval.issues.push(
                Issue::new(
                    rule.severity,
                    IssueCategory::VersionDrift,
                    &rule.name,
                    format!("{} declares no '{}' version", file.path, rule.component),
                )
                .in_file(&file.path),
            );
            continue;
        };

        let replace = FixHint::ReplaceVersion {
            path: file.path.clone(),
            pattern: file.pattern.clone(),
            from: found.value.clone(),
            to: canonical.to_string(),
        };

        match assess(&found.value, canonical, rule.check_type, rule.max_drift) {
            Drift::Match => eval.record(VERSIONING, true),
            Drift::Within(level) => {
                eval.record(VERSIONING, true);
                eval.issues.push(
                    Issue::new(
                        Severity::Low,
                        IssueCategory::VersionDrift,
                        &rule.name,
                        format!(
                            "{} declares {} ({level} drift from {canonical}, within tolerance)",
                            file.path, found.value
                        ),
                    )
                    .in_file(&file.path)
                    .at_line(found.line)
                    .with_fix(replace),
                );
            }
            Drift::Outside(level) => {
                eval.record(VERSIONING, false);
                eval.issues.push(
                    Issue::new(
                        rule.severity,
                        IssueCategory::VersionDrift,
                        &rule.name,
                        format!(
                            "{} declares {} but {} is {canonical} ({level} drift)",
                            file.path, found.value, rule.component
                        ),
                    )
                    .in_file(&file.path)
                    .at_line(found.line)
                    .with_fix(replace),
                );
            }
            Drift::Malformed => {
                eval.record(VERSIONING, false);
                eval.issues.push(
                    Issue::new(
                        Severity::High,
                        IssueCategory::VersionDrift,
                        &rule.name,
                        format!(
                            "{} declares malformed version '{}' (expected MAJOR.MINOR.PATCH)",
                            file.path, found.value
                        ),
                    )
                    .in_file(&file.path)
                    .at_line(found.line),
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// QUALITY METRICS
// =============================================================================

/// Measured value of a metric across the readable required documents
pub fn measure(metric: QualityMetricKind, text: &str) -> usize {
    match metric {
        QualityMetricKind::SectionCount => markdown::headings(text).len(),
        QualityMetricKind::WordCount => markdown::word_count(text),
        QualityMetricKind::CrossReferences => markdown::links(text).len(),
        QualityMetricKind::Examples => markdown::code_blocks(text).len(),
    }
}

fn check_quality_metric(
    eval: &mut Evaluation,
    metric: &QualityMetricRule,
    documents: &BTreeMap<String, Document>,
) {
    let value: usize = documents
        .values()
        .filter_map(|doc| match doc {
            Document::Text(text) => Some(measure(metric.metric, text)),
            _ => None,
        })
        .sum();

    let ok = value >= metric.minimum;
    eval.record(QUALITY, ok);
    if !ok {
        eval.issues.push(Issue::new(
            Severity::Low,
            IssueCategory::QualityMetric,
            metric.metric.name(),
            format!(
                "{} is {value} across required documents, minimum is {}",
                metric.metric.name(),
                metric.minimum
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::VersionLedger;
    use crate::schema::SchemaStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RuleSchema, Ledger) {
        (
            TempDir::new().unwrap(),
            SchemaStore::builtin().unwrap(),
            VersionLedger::builtin(),
        )
    }

    #[tokio::test]
    async fn test_empty_project_fails_every_category() {
        let (dir, schema, ledger) = setup();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let missing: Vec<&Issue> = eval
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::MissingFile)
            .collect();
        assert_eq!(missing.len(), 3);
        assert!(missing.iter().all(|i| i.is_critical() && i.auto_fixable));
        for tally in eval.tally.values() {
            assert_eq!(tally.passed, 0);
            assert!(tally.total > 0);
        }
    }

    #[tokio::test]
    async fn test_missing_field_and_section_are_critical() {
        let (dir, schema, ledger) = setup();
        std::fs::write(dir.path().join("PROTOCOL.md"), "# Protocol\n\n## Safety\n").unwrap();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let field = eval
            .issues
            .iter()
            .find(|i| i.category == IssueCategory::MissingField)
            .unwrap();
        assert_eq!(field.severity, Severity::Critical);

        let sections: Vec<&Issue> = eval
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::MissingSection && i.file.as_deref() == Some("PROTOCOL.md"))
            .collect();
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|i| i.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn test_unreadable_files_become_issues_and_scan_continues() {
        let (dir, schema, ledger) = setup();
        std::fs::create_dir_all(dir.path().join("README.md")).unwrap();
        std::fs::create_dir_all(dir.path().join("package.json")).unwrap();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let unreadable: Vec<&Issue> = eval
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::UnreadableFile)
            .collect();
        assert_eq!(unreadable.len(), 2);
        assert!(unreadable.iter().all(|i| i.is_critical() && !i.auto_fixable));
        assert_eq!(unreadable[0].file.as_deref(), Some("README.md"));
        assert_eq!(unreadable[1].file.as_deref(), Some("package.json"));
        assert!(eval
            .issues
            .iter()
            .any(|i| i.category == IssueCategory::MissingFile && i.file.as_deref() == Some("CHANGELOG.md")));
    }

    #[tokio::test]
    async fn test_version_drift_reports_line() {
        let (dir, schema, ledger) = setup();
        std::fs::write(dir.path().join("package.json"), "{\n  \"version\": \"1.3.0\"\n}\n").unwrap();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let drift = eval
            .issues
            .iter()
            .find(|i| i.file.as_deref() == Some("package.json"))
            .unwrap();
        assert_eq!(drift.severity, Severity::High);
        assert_eq!(drift.line, Some(2));
        assert!(drift.auto_fixable);
    }

    #[tokio::test]
    async fn test_within_tolerance_drift_is_low_and_passes() {
        let (dir, mut schema, ledger) = setup();
        schema.version_consistency_rules[0].max_drift = crate::ledger::DriftTolerance::Patch;
        std::fs::write(dir.path().join("package.json"), "{\"version\": \"1.0.4\"}").unwrap();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let drift = eval
            .issues
            .iter()
            .find(|i| i.file.as_deref() == Some("package.json"))
            .unwrap();
        assert_eq!(drift.severity, Severity::Low);
        assert_eq!(eval.tally[VERSIONING].passed, 1);
    }

    #[tokio::test]
    async fn test_malformed_version_fails_closed() {
        let (dir, schema, ledger) = setup();
        std::fs::write(dir.path().join("package.json"), "{\"version\": \"1.0\"}").unwrap();
        let eval = evaluate(dir.path(), &schema, &ledger).await.unwrap();

        let drift = eval
            .issues
            .iter()
            .find(|i| i.file.as_deref() == Some("package.json"))
            .unwrap();
        assert!(drift.message.contains("malformed"));
        assert!(drift.fix.is_none());
        assert!(!drift.auto_fixable);
    }

    #[tokio::test]
    async fn test_schema_path_escape_is_fatal() {
        let (dir, mut schema, ledger) = setup();
        schema.required_files[0].path = "../outside.md".into();
        let err = evaluate(dir.path(), &schema, &ledger).await.unwrap_err();
        assert!(err.is_security());
    }
}
