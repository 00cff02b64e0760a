//! Security categories
//!
//! Secret exposure scans every collected text file with the same credential
//! patterns used for log redaction. Findings never include the secret itself.
//! Safety policy checks that the operating-protocol document carries the
//! schema's policy sections.

use crate::audit::{deduction_score, ratio_score, AuditCategory, AuditFinding, Workspace};
use crate::error::AppResult;
use crate::models::Severity;
use crate::safety::redact::{find_secrets, SecretKind};
use crate::safety::validate_path;
use crate::validator::markdown;

pub const SECRET_EXPOSURE: &str = "secret_exposure";
pub const SAFETY_POLICY: &str = "safety_policy";

fn describe(kind: SecretKind) -> &'static str {
    match kind {
        SecretKind::Assignment => "credential assignment",
        SecretKind::ConnectionString => "connection string with embedded credentials",
        SecretKind::AuthorizationHeader => "authorization header",
        SecretKind::BearerToken => "bearer token",
        SecretKind::OpaqueToken => "long opaque token",
    }
}

pub fn secret_exposure(ws: &Workspace) -> AuditCategory {
    let mut findings = Vec::new();
    for doc in &ws.documents {
        for found in find_secrets(&doc.text) {
            let severity = match found.kind {
                SecretKind::OpaqueToken => Severity::Medium,
                _ => Severity::High,
            };
            findings.push(
                AuditFinding::new(severity, format!("possible {}", describe(found.kind)))
                    .in_file(&doc.path)
                    .at_line(found.line),
            );
        }
    }

    let recommendations = if findings.is_empty() {
        Vec::new()
    } else {
        vec![
            "Remove credentials from tracked files and rotate any that were committed".to_string(),
            "Load secrets from the environment or a secret manager instead".to_string(),
        ]
    };
    AuditCategory::new(SECRET_EXPOSURE, deduction_score(&findings), findings, recommendations)
}

pub fn safety_policy(ws: &Workspace) -> AppResult<AuditCategory> {
    // containment still applies to a configured path
    validate_path(&ws.constitution, &ws.root)?;
    let sections = &ws.schema.quality_metrics.policy_sections;

    let Some(doc) = ws.document(&ws.constitution) else {
        let finding = AuditFinding::new(
            Severity::Critical,
            format!("operating protocol {} is missing", ws.constitution),
        )
        .in_file(&ws.constitution);
        return Ok(AuditCategory::new(
            SAFETY_POLICY,
            0.0,
            vec![finding],
            vec![format!("Create {} with {} sections", ws.constitution, sections.join(" and "))],
        ));
    };

    let mut findings = Vec::new();
    let mut passed = 0;
    for section in sections {
        if markdown::has_section(&doc.text, section) {
            passed += 1;
        } else {
            findings.push(
                AuditFinding::new(Severity::High, format!("no '{section}' policy section"))
                    .in_file(&ws.constitution),
            );
        }
    }

    let recommendations = findings
        .iter()
        .map(|f| format!("Document the {} in {}", f.message.trim_start_matches("no "), ws.constitution))
        .collect();
    Ok(AuditCategory::new(
        SAFETY_POLICY,
        ratio_score(passed, sections.len()),
        findings,
        recommendations,
    ))
}
