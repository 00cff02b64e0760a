//! Project scaffolding templates

use crate::error::{AppError, AppResult};
use crate::ledger::Ledger;
use crate::safety::{validate_path, write_atomic, write_json_atomic};
use crate::schema::RuleSchema;
use crate::validator::Remediator;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub const SCHEMA_FILE: &str = ".charter/schema.json";
pub const LEDGER_FILE: &str = ".charter/versions.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Template {
    /// Required documents only
    #[default]
    Minimal,
    /// Required documents plus a project-local schema and ledger
    Standard,
}

impl FromStr for Template {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(Template::Minimal),
            "standard" => Ok(Template::Standard),
            other => Err(AppError::UnknownTemplate(other.to_string())),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Minimal => f.write_str("minimal"),
            Template::Standard => f.write_str("standard"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub template: String,
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Write the template's files, never overwriting unless `force`
pub async fn scaffold(
    project: &Path,
    template: Template,
    force: bool,
    schema: Arc<RuleSchema>,
    ledger: Arc<Ledger>,
) -> AppResult<InitReport> {
    tokio::fs::create_dir_all(project).await?;
    let mut report = InitReport {
        template: template.to_string(),
        ..Default::default()
    };

    let remediator = Remediator::new(schema.clone(), ledger.clone());
    for rule in &schema.required_files {
        let target = validate_path(&rule.path, project)?;
        if !force && tokio::fs::try_exists(&target).await? {
            debug!("Keeping existing {}", rule.path);
            report.skipped.push(rule.path.clone());
            continue;
        }
        write_atomic(&target, remediator.render_document(rule).as_bytes()).await?;
        report.created.push(rule.path.clone());
    }

    if template == Template::Standard {
        for (relative, is_schema) in [(SCHEMA_FILE, true), (LEDGER_FILE, false)] {
            let target = validate_path(relative, project)?;
            if !force && tokio::fs::try_exists(&target).await? {
                report.skipped.push(relative.to_string());
                continue;
            }
            if is_schema {
                write_json_atomic(&target, &*schema).await?;
            } else {
                write_json_atomic(&target, &*ledger).await?;
            }
            report.created.push(relative.to_string());
        }
    }

    info!(
        "Initialized {} from '{}' template: {} created, {} kept",
        project.display(),
        template,
        report.created.len(),
        report.skipped.len()
    );
    Ok(report)
}
