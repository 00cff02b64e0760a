//! Technical accuracy
//!
//! - Version-bearing files declare the ledger's canonical version
//! - Relative links resolve to files inside the project
//! - URLs parse; shell examples are at least syntactically plausible
//!
//! Nothing here touches the network.

use crate::audit::{ratio_score, AuditCategory, AuditFinding, Document, Workspace};
use crate::error::AppResult;
use crate::models::Severity;
use crate::safety::validate_path;
use crate::validator::markdown;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use url::Url;

pub const NAME: &str = "technical_accuracy";

static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`)\]]+"#).expect("url pattern"));

const SHELL_LANGS: &[&str] = &["bash", "sh", "shell", "console", "zsh"];

#[derive(Default)]
struct Tally {
    passed: usize,
    total: usize,
    findings: Vec<AuditFinding>,
}

impl Tally {
    fn check(&mut self, ok: bool, finding: impl FnOnce() -> AuditFinding) {
        self.total += 1;
        if ok {
            self.passed += 1;
        } else {
            self.findings.push(finding());
        }
    }
}

pub fn audit(ws: &Workspace) -> AppResult<AuditCategory> {
    let mut tally = Tally::default();

    versions(ws, &mut tally)?;
    for doc in ws.markdown() {
        references(ws, doc, &mut tally);
        commands(doc, &mut tally);
    }

    let mut recommendations = Vec::new();
    let messages = |needle: &str| tally.findings.iter().any(|f| f.message.contains(needle));
    if messages("ledger") {
        recommendations.push("Run `charter sync --force` to align declared versions".to_string());
    }
    if messages("broken") || messages("outside") {
        recommendations.push("Fix or remove links to files that do not exist".to_string());
    }
    if messages("URL") {
        recommendations.push("Correct malformed URLs".to_string());
    }
    if messages("command") {
        recommendations.push("Review shell examples for unbalanced quotes or dangling operators".to_string());
    }

    Ok(AuditCategory::new(
        NAME,
        ratio_score(tally.passed, tally.total),
        tally.findings,
        recommendations,
    ))
}

fn versions(ws: &Workspace, tally: &mut Tally) -> AppResult<()> {
    for (rule, file) in ws.schema.version_bearing_files() {
        let Some(doc) = ws.document(&file.path) else { continue };
        let Some(canonical) = ws.ledger.components.get(&rule.component) else { continue };
        match file.extract(&doc.text)? {
            Some(found) => tally.check(found.value == canonical.current, || {
                AuditFinding::new(
                    Severity::High,
                    format!(
                        "declares {} {} but the ledger has {}",
                        rule.component, found.value, canonical.current
                    ),
                )
                .in_file(&file.path)
                .at_line(found.line)
            }),
            None => tally.check(false, || {
                AuditFinding::new(Severity::Medium, format!("no {} version declared", rule.component))
                    .in_file(&file.path)
            }),
        }
    }
    Ok(())
}

fn references(ws: &Workspace, doc: &Document, tally: &mut Tally) {
    let base = Path::new(&doc.path).parent().unwrap_or(Path::new(""));

    for link in markdown::links(&doc.text) {
        let target = link.target.as_str();
        if target.starts_with('#') {
            continue;
        }
        if let Some((scheme, _)) = target.split_once(':') {
            if scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
                tally.check(Url::parse(target).is_ok(), || {
                    AuditFinding::new(Severity::Medium, format!("malformed URL '{target}'"))
                        .in_file(&doc.path)
                        .at_line(link.line)
                });
                continue;
            }
        }

        let path = target.split('#').next().unwrap_or(target);
        let relative = base.join(path);
        match validate_path(&relative, &ws.root) {
            Ok(resolved) => tally.check(resolved.exists(), || {
                AuditFinding::new(Severity::Medium, format!("broken reference to '{path}'"))
                    .in_file(&doc.path)
                    .at_line(link.line)
            }),
            Err(_) => tally.check(false, || {
                AuditFinding::new(Severity::High, format!("reference '{path}' points outside the project"))
                    .in_file(&doc.path)
                    .at_line(link.line)
            }),
        }
    }

    for (idx, line) in doc.text.lines().enumerate() {
        for m in BARE_URL.find_iter(line) {
            let raw = m.as_str().trim_end_matches(['.', ',', ';', ':']);
            if markdown::links(line).iter().any(|l| l.target == raw) {
                continue;
            }
            tally.check(Url::parse(raw).is_ok_and(|u| u.host().is_some()), || {
                AuditFinding::new(Severity::Medium, format!("malformed URL '{raw}'"))
                    .in_file(&doc.path)
                    .at_line(idx + 1)
            });
        }
    }
}

fn commands(doc: &Document, tally: &mut Tally) {
    for block in markdown::code_blocks(&doc.text) {
        let is_shell = block
            .lang
            .as_deref()
            .is_some_and(|lang| SHELL_LANGS.contains(&lang.to_lowercase().as_str()));
        if !is_shell {
            continue;
        }
        let mut continued = false;
        for (offset, line) in block.body.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let command = trimmed.trim_start_matches("$ ");
            let wraps = command.ends_with('\\');
            if !continued {
                tally.check(plausible_command(command), || {
                    AuditFinding::new(Severity::Low, format!("command looks malformed: {command}"))
                        .in_file(&doc.path)
                        .at_line(block.line + offset + 1)
                });
            }
            continued = wraps;
        }
    }
}

/// Balanced quotes and no dangling operator at the end of the line
pub fn plausible_command(command: &str) -> bool {
    let command = command.trim_end_matches('\\').trim_end();
    let balanced = |quote: char| command.chars().filter(|c| *c == quote).count() % 2 == 0;
    let dangling = ["|", "&&", "||", ">", "<"].iter().any(|op| command.ends_with(op));
    !command.is_empty() && balanced('"') && balanced('\'') && !dangling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::VersionLedger;
    use crate::schema::SchemaStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn workspace(root: &Path, documents: Vec<Document>) -> Workspace {
        Workspace {
            root: root.to_path_buf(),
            declared: Vec::new(),
            documents,
            schema: Arc::new(SchemaStore::builtin().unwrap()),
            ledger: Arc::new(VersionLedger::builtin()),
            constitution: "PROTOCOL.md".into(),
        }
    }

    #[test]
    fn test_plausible_command() {
        assert!(plausible_command("cargo test --all"));
        assert!(plausible_command("echo 'hi there'"));
        assert!(!plausible_command("echo \"unterminated"));
        assert!(!plausible_command("cat file |"));
    }

    #[test]
    fn test_references_resolve_inside_project() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("CHANGELOG.md"), "x").unwrap();
        let text = "[log](CHANGELOG.md) [gone](docs/missing.md) [esc](../../etc/passwd) [site](https://example.com/a)";
        let ws = workspace(dir.path(), vec![Document { path: "README.md".into(), text: text.into() }]);

        let category = audit(&ws).unwrap();
        let messages: Vec<&str> = category.issues.iter().map(|f| f.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("broken reference to 'docs/missing.md'")));
        assert!(messages.iter().any(|m| m.contains("outside the project")));
        assert_eq!(category.issues.len(), 2);
    }

    #[test]
    fn test_version_mismatch_is_reported() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(
            dir.path(),
            vec![Document {
                path: "PROTOCOL.md".into(),
                text: "Version: 2.0.0\n".into(),
            }],
        );
        let category = audit(&ws).unwrap();
        assert!(category.issues.iter().any(|f| f.message.contains("ledger has 1.0.0")));
        assert!(category.score < 100.0);
    }
}
