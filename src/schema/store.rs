//! Schema Store
//!
//! Loads the declarative rule set once per run and hands out shared
//! read-only copies. Saving replaces the file atomically.

use crate::error::{AppError, AppResult};
use crate::models::IssueCategory;
use crate::safety::write_json_atomic;
use crate::schema::types::*;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const BUILTIN_SCHEMA: &str = include_str!("default_schema.json");

/// Grade used when no threshold matches and the schema declares none
const FALLBACK_GRADE: &str = "F";

/// Outcome of [`SchemaStore::validate_self`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Caller-owned schema store with memoized loading
pub struct SchemaStore {
    path: PathBuf,
    fallback: Option<RuleSchema>,
    cache: RwLock<Option<Arc<RuleSchema>>>,
}

impl SchemaStore {
    /// Store backed strictly by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: None,
            cache: RwLock::new(None),
        }
    }

    /// Store that serves the embedded schema when `path` is absent
    pub fn with_builtin_fallback(path: impl Into<PathBuf>) -> AppResult<Self> {
        Ok(Self {
            path: path.into(),
            fallback: Some(Self::builtin()?),
            cache: RwLock::new(None),
        })
    }

    /// The embedded operating-protocol schema
    pub fn builtin() -> AppResult<RuleSchema> {
        serde_json::from_str(BUILTIN_SCHEMA)
            .map_err(|e| AppError::SchemaLoad(format!("built-in schema is malformed: {e}")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, self-check and memoize the schema
    pub async fn load(&self) -> AppResult<Arc<RuleSchema>> {
        if let Some(schema) = self.cache.read().await.as_ref() {
            return Ok(schema.clone());
        }

        let schema = self.read().await?;
        let check = Self::validate_self(&schema);
        if !check.valid {
            return Err(AppError::SchemaInvalid(check.errors));
        }

        info!(
            "Loaded schema '{}' v{} ({} rules)",
            schema.name,
            schema.version,
            schema.rules().len()
        );
        let schema = Arc::new(schema);
        *self.cache.write().await = Some(schema.clone());
        Ok(schema)
    }

    /// Parse the schema file (or the fallback) without self-checking it
    pub async fn read(&self) -> AppResult<RuleSchema> {
        let schema = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str::<RuleSchema>(&text).map_err(|e| {
                AppError::SchemaLoad(format!("malformed schema {}: {e}", self.path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match &self.fallback {
                Some(builtin) => {
                    debug!("No schema at {}, using built-in rules", self.path.display());
                    builtin.clone()
                }
                None => {
                    return Err(AppError::SchemaLoad(format!(
                        "schema not found: {}",
                        self.path.display()
                    )))
                }
            },
            Err(e) => {
                return Err(AppError::SchemaLoad(format!(
                    "cannot read schema {}: {e}",
                    self.path.display()
                )))
            }
        };
        Ok(schema)
    }

    /// Self-check, then replace the schema file atomically
    pub async fn save(&self, schema: &RuleSchema) -> AppResult<()> {
        let check = Self::validate_self(schema);
        if !check.valid {
            return Err(AppError::SchemaInvalid(check.errors));
        }
        write_json_atomic(&self.path, schema).await?;
        *self.cache.write().await = Some(Arc::new(schema.clone()));
        info!("Saved schema to {}", self.path.display());
        Ok(())
    }

    /// Structural consistency checks a schema must pass before use
    pub fn validate_self(schema: &RuleSchema) -> SelfCheck {
        let mut errors = Vec::new();

        let total: u64 = schema.scoring_categories.values().map(|w| u64::from(*w)).sum();
        if total != 100 {
            errors.push(format!("scoring category weights sum to {total}, expected 100"));
        }
        for name in schema.scoring_categories.keys() {
            if !SCORING_CATEGORIES.contains(&name.as_str()) {
                errors.push(format!(
                    "unknown scoring category '{name}' (expected one of {})",
                    SCORING_CATEGORIES.join(", ")
                ));
            }
        }

        if schema.grade_thresholds.is_empty() {
            errors.push("at least one grade threshold is required".to_string());
        }
        for pair in schema.grade_thresholds.windows(2) {
            if pair[1].min >= pair[0].min {
                errors.push(format!(
                    "grade thresholds must be strictly descending: {} ({}) then {} ({})",
                    pair[0].grade, pair[0].min, pair[1].grade, pair[1].min
                ));
            }
        }

        for key in schema.remediation_actions.keys() {
            if key.parse::<IssueCategory>().is_err() {
                errors.push(format!("remediation action for unknown issue category '{key}'"));
            }
        }

        for rule in &schema.version_consistency_rules {
            if rule.files.is_empty() {
                errors.push(format!("version rule '{}' declares no files", rule.name));
            }
            for file in &rule.files {
                match Regex::new(&file.pattern) {
                    Ok(re) if re.captures_len() < 2 => errors.push(format!(
                        "version pattern for {} has no capture group",
                        file.path
                    )),
                    Ok(_) => {}
                    Err(e) => errors.push(format!("invalid version pattern for {}: {e}", file.path)),
                }
            }
        }

        SelfCheck {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub async fn get_rules(&self, kind: Option<RuleKind>) -> AppResult<Vec<Rule>> {
        let schema = self.load().await?;
        Ok(schema
            .rules()
            .into_iter()
            .filter(|rule| kind.map_or(true, |k| rule.kind() == k))
            .collect())
    }

    pub async fn get_scoring_weights(&self) -> AppResult<BTreeMap<String, u32>> {
        Ok(self.load().await?.scoring_categories.clone())
    }

    pub async fn calculate_grade(&self, score: f64) -> AppResult<String> {
        Ok(self.load().await?.calculate_grade(score))
    }

    pub async fn get_remediation_action(
        &self,
        category: IssueCategory,
    ) -> AppResult<Option<RemediationAction>> {
        Ok(self.load().await?.remediation_for(category).cloned())
    }
}

impl RuleSchema {
    /// First threshold whose minimum is met, scanning from the highest
    pub fn calculate_grade(&self, score: f64) -> String {
        let mut thresholds: Vec<&GradeThreshold> = self.grade_thresholds.iter().collect();
        thresholds.sort_by(|a, b| b.min.total_cmp(&a.min));

        thresholds
            .iter()
            .find(|t| t.min <= score)
            .or_else(|| thresholds.last())
            .map(|t| t.grade.clone())
            .unwrap_or_else(|| FALLBACK_GRADE.to_string())
    }

    pub fn remediation_for(&self, category: IssueCategory) -> Option<&RemediationAction> {
        self.remediation_actions.get(category.as_str())
    }

    /// Auto-fixable means a remediation exists and needs no approval
    pub fn is_auto_fixable(&self, category: IssueCategory) -> bool {
        self.remediation_for(category)
            .is_some_and(RemediationAction::is_automatic)
    }

    /// SHA-256 over the canonical JSON form
    pub fn digest(&self) -> AppResult<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}
