//! Synchronizer
//!
//! Reconciles the version tokens declared in schema-tracked files with the
//! Version Ledger. Conflicts are reported by default and only rewritten when
//! the caller forces it. Files are handled one at a time in schema order, so
//! a failure on one file never blocks the rest.

pub mod scanner;
pub mod vcs;

pub use vcs::RepositoryState;

use crate::error::AppResult;
use crate::ledger::{assess, Drift, DriftTolerance, VersionLedger};
use crate::safety::{write_atomic, SecureExecutor};
use crate::schema::SchemaStore;
use crate::validator::require_project;
use async_trait::async_trait;
use scanner::Located;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Scan only, never write
    pub dry_run: bool,
    /// Rewrite drifted files to the canonical version
    pub force: bool,
    /// Record a read-only `git status` summary
    pub git_status: bool,
    /// Tag `v<canonical>` after a successful forced sync
    pub tag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Update,
    Skip,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConflict {
    pub file: String,
    pub component: String,
    pub current: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub updated: usize,
    pub skipped: usize,
    pub conflicts: Vec<VersionConflict>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryState>,
}

impl SyncResult {
    /// Conflicts nobody resolved, or that need a human
    pub fn unresolved(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| matches!(c.resolution, None | Some(Resolution::Manual)))
            .count()
    }
}

/// Contract every synchronizer implementation satisfies
#[async_trait]
pub trait Synchronizer: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    async fn sync(&self, project: &Path, options: &SyncOptions) -> AppResult<SyncResult>;

    /// Identical scan with writes disabled
    async fn preview(&self, project: &Path, options: &SyncOptions) -> AppResult<SyncResult> {
        let options = SyncOptions {
            dry_run: true,
            ..options.clone()
        };
        self.sync(project, &options).await
    }
}

/// Built-in synchronizer over schema-declared version-bearing files
pub struct VersionSynchronizer {
    schema: Arc<SchemaStore>,
    ledger: Arc<VersionLedger>,
    executor: SecureExecutor,
}

impl VersionSynchronizer {
    pub fn new(schema: Arc<SchemaStore>, ledger: Arc<VersionLedger>) -> Self {
        Self {
            schema,
            ledger,
            executor: SecureExecutor::git_only(),
        }
    }

    pub fn with_executor(mut self, executor: SecureExecutor) -> Self {
        self.executor = executor;
        self
    }
}

#[async_trait]
impl Synchronizer for VersionSynchronizer {
    fn name(&self) -> &str {
        "version-sync"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn sync(&self, project: &Path, options: &SyncOptions) -> AppResult<SyncResult> {
        require_project(project)?;
        let schema = self.schema.load().await?;
        let ledger = self.ledger.load().await?;

        let mut result = SyncResult {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut updated_versions: Vec<String> = Vec::new();

        for (rule, file) in schema.version_bearing_files() {
            let conflict = |current: &str, line: Option<usize>, resolution, reason: Option<String>| {
                VersionConflict {
                    file: file.path.clone(),
                    component: rule.component.clone(),
                    current: current.to_string(),
                    target: ledger
                        .components
                        .get(&rule.component)
                        .map(|c| c.current.clone())
                        .unwrap_or_default(),
                    line,
                    resolution,
                    reason,
                }
            };

            let Some(canonical) = ledger.components.get(&rule.component).map(|c| c.current.clone()) else {
                result.conflicts.push(conflict(
                    "",
                    None,
                    Some(Resolution::Manual),
                    Some(format!("component '{}' is not tracked in the ledger", rule.component)),
                ));
                continue;
            };

            let (path, located) = scanner::locate(project, file).await?;
            let (text, token) = match located {
                Located::Missing => {
                    debug!("{} not present, nothing to sync", file.path);
                    continue;
                }
                Located::Unreadable(reason) => {
                    result.conflicts.push(conflict("", None, Some(Resolution::Manual), Some(reason)));
                    continue;
                }
                Located::NoDeclaration => {
                    result.conflicts.push(conflict(
                        "",
                        None,
                        Some(Resolution::Manual),
                        Some("no version declaration found".to_string()),
                    ));
                    continue;
                }
                Located::Found { text, token } => (text, token),
            };

            if token.value == canonical {
                result.skipped += 1;
                continue;
            }

            if assess(&token.value, &canonical, rule.check_type, DriftTolerance::None) == Drift::Malformed {
                result.conflicts.push(conflict(
                    &token.value,
                    Some(token.line),
                    Some(Resolution::Manual),
                    Some("malformed version token".to_string()),
                ));
                continue;
            }

            if !options.force {
                result.conflicts.push(conflict(&token.value, Some(token.line), None, None));
                continue;
            }

            if options.dry_run {
                result
                    .conflicts
                    .push(conflict(&token.value, Some(token.line), Some(Resolution::Update), None));
                continue;
            }

            match write_atomic(&path, token.replace_in(&text, &canonical).as_bytes()).await {
                Ok(()) => {
                    info!("Updated {} from {} to {}", file.path, token.value, canonical);
                    result.updated += 1;
                    if !updated_versions.contains(&canonical) {
                        updated_versions.push(canonical);
                    }
                }
                Err(e) => {
                    warn!("Could not update {}: {}", file.path, e);
                    result.conflicts.push(conflict(
                        &token.value,
                        Some(token.line),
                        Some(Resolution::Manual),
                        Some(e.to_string()),
                    ));
                }
            }
        }

        if options.git_status || options.tag {
            match vcs::status(&self.executor, project).await {
                Ok(state) => result.repository = Some(state),
                Err(e) if e.is_security() => return Err(e),
                Err(e) => warn!("Repository status unavailable: {}", e),
            }
        }

        if options.tag && options.force && !options.dry_run && result.unresolved() == 0 {
            for version in &updated_versions {
                let tag = format!("v{version}");
                vcs::create_tag(&self.executor, project, &tag).await?;
                if let Some(repo) = result.repository.as_mut() {
                    repo.tags.push(tag);
                }
            }
        }

        info!(
            "Sync finished: {} updated, {} skipped, {} conflicts{}",
            result.updated,
            result.skipped,
            result.conflicts.len(),
            if result.dry_run { " (dry run)" } else { "" }
        );
        Ok(result)
    }
}
