//! Remediation
//!
//! Applies the concrete [`FixHint`] carried by an auto-fixable issue. Shared by
//! the Validator's `--fix` pass and the Governor's `auto_fix`.

use crate::error::AppResult;
use crate::ledger::Ledger;
use crate::models::{FixHint, Issue};
use crate::safety::{validate_path, write_atomic};
use crate::schema::types::{RequiredFileRule, RuleSchema, VersionFile};
use crate::validator::markdown;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FILLER: &str =
    "This document follows the project operating protocol and is kept under version control.\n";

/// Applies schema-approved fixes inside one project
pub struct Remediator {
    schema: Arc<RuleSchema>,
    ledger: Arc<Ledger>,
}

impl Remediator {
    pub fn new(schema: Arc<RuleSchema>, ledger: Arc<Ledger>) -> Self {
        Self { schema, ledger }
    }

    /// Apply every eligible fix; returns how many actually changed a file.
    ///
    /// A failing fix is logged and skipped; security errors abort.
    pub async fn apply_all(&self, project: &Path, issues: &[Issue]) -> AppResult<usize> {
        let mut fixed = 0;
        for issue in issues {
            if !issue.auto_fixable || !self.schema.is_auto_fixable(issue.category) {
                continue;
            }
            let Some(fix) = &issue.fix else { continue };

            match self.apply(project, fix).await {
                Ok(true) => {
                    info!("Fixed [{}] {}", issue.category, issue.message);
                    fixed += 1;
                }
                Ok(false) => debug!("Nothing to fix for [{}] {}", issue.category, issue.message),
                Err(e) if e.is_security() => return Err(e),
                Err(e) => warn!("Auto-fix failed for [{}] {}: {}", issue.category, issue.message, e),
            }
        }
        Ok(fixed)
    }

    /// Apply one fix. `Ok(false)` when the target is already in the desired state.
    pub async fn apply(&self, project: &Path, fix: &FixHint) -> AppResult<bool> {
        match fix {
            FixHint::CreateFile { path } => {
                let target = validate_path(path, project)?;
                if tokio::fs::try_exists(&target).await? {
                    return Ok(false);
                }
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let content = match self.schema.required_files.iter().find(|r| &r.path == path) {
                    Some(rule) => self.render_document(rule),
                    None => format!("# {}\n", title_for(path)),
                };
                write_atomic(&target, content.as_bytes()).await?;
                Ok(true)
            }
            FixHint::AppendSection { path, heading } => {
                let target = validate_path(path, project)?;
                let text = tokio::fs::read_to_string(&target).await?;
                if markdown::has_section(&text, heading) {
                    return Ok(false);
                }
                let addition = format!("## {heading}\n\n{}\n", placeholder(heading));
                write_atomic(&target, append(&text, &addition).as_bytes()).await?;
                Ok(true)
            }
            FixHint::AppendField { path, field } => {
                let target = validate_path(path, project)?;
                let text = tokio::fs::read_to_string(&target).await?;
                if text.contains(field.as_str()) {
                    return Ok(false);
                }
                let line = format!("{}\n", self.field_line(path, field));
                write_atomic(&target, append(&text, &line).as_bytes()).await?;
                Ok(true)
            }
            FixHint::ReplaceVersion { path, pattern, from, to } => {
                let target = validate_path(path, project)?;
                let text = tokio::fs::read_to_string(&target).await?;
                let file = VersionFile {
                    path: path.clone(),
                    pattern: pattern.clone(),
                };
                match file.extract(&text)? {
                    Some(found) if &found.value == from => {
                        write_atomic(&target, found.replace_in(&text, to).as_bytes()).await?;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }

    /// Stub document satisfying a required-file rule's structure and length
    pub fn render_document(&self, rule: &RequiredFileRule) -> String {
        let mut out = format!("# {}\n\n", title_for(&rule.path));
        for field in &rule.required_fields {
            out.push_str(&self.field_line(&rule.path, field));
            out.push('\n');
        }
        if !rule.required_fields.is_empty() {
            out.push('\n');
        }
        for section in rule.required_sections.iter().chain(&rule.recommended_sections) {
            out.push_str(&format!("## {section}\n\n{}\n\n", placeholder(section)));
        }
        while out.chars().count() < rule.min_length {
            out.push_str(FILLER);
        }
        out
    }

    /// Canonical version a tracked file must declare, if any rule tracks it
    pub fn canonical_for(&self, path: &str) -> Option<&str> {
        self.schema
            .version_bearing_files()
            .into_iter()
            .find(|(_, file)| file.path == path)
            .and_then(|(rule, _)| self.ledger.components.get(&rule.component))
            .map(|entry| entry.current.as_str())
    }

    fn field_line(&self, path: &str, field: &str) -> String {
        if !field.trim_end().ends_with(':') {
            return field.to_string();
        }
        let value = if field.to_lowercase().starts_with("version") {
            self.canonical_for(path).unwrap_or("0.1.0")
        } else {
            "TBD"
        };
        format!("{} {value}", field.trim_end())
    }
}

fn append(text: &str, addition: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(addition);
    out
}

fn placeholder(section: &str) -> String {
    format!("_Document the {} for this project._", section.to_lowercase())
}

/// `docs/SAFETY_POLICY.md` → `Safety Policy`
pub fn title_for(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path);
    stem.split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
