//! Engine wiring
//!
//! Builds every component for one project in dependency order:
//! stores first, then the tools that read them, then the Governor over the tools.

use crate::audit::{Auditor, ProtocolAuditor};
use crate::config::Settings;
use crate::error::AppResult;
use crate::governor::Governor;
use crate::ledger::VersionLedger;
use crate::safety::SecureExecutor;
use crate::schema::SchemaStore;
use crate::sync::{Synchronizer, VersionSynchronizer};
use crate::validator::{ComplianceValidator, ExternalValidator, SchemaValidator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a command needs for one project
pub struct Engine {
    pub project: PathBuf,
    pub settings: Settings,
    pub schema: Arc<SchemaStore>,
    pub ledger: Arc<VersionLedger>,
    pub validator: Arc<dyn ComplianceValidator>,
    pub synchronizer: Arc<dyn Synchronizer>,
    pub auditor: Arc<dyn Auditor>,
    pub governor: Governor,
}

impl Engine {
    pub fn new(project: &Path, settings: Settings) -> AppResult<Self> {
        let schema_path = settings.schema_path(project);
        let schema = Arc::new(if schema_path.explicit {
            SchemaStore::new(schema_path.path)
        } else {
            SchemaStore::with_builtin_fallback(schema_path.path)?
        });

        let ledger_path = settings.ledger_path(project);
        let ledger = Arc::new(if ledger_path.explicit {
            VersionLedger::new(ledger_path.path)
        } else {
            VersionLedger::with_builtin_fallback(ledger_path.path)
        });

        let validator: Arc<dyn ComplianceValidator> = match settings.external_validator() {
            Some(executable) => {
                info!("Using external validator {}", executable.display());
                Arc::new(ExternalValidator::new(project, executable)?)
            }
            None => Arc::new(SchemaValidator::new(schema.clone(), ledger.clone())),
        };

        let mut executor = SecureExecutor::git_only();
        for plugin in &settings.plugins {
            debug!("Allowing plugin executable {plugin}");
            executor.allow(plugin.clone());
        }
        let synchronizer: Arc<dyn Synchronizer> =
            Arc::new(VersionSynchronizer::new(schema.clone(), ledger.clone()).with_executor(executor));

        let auditor: Arc<dyn Auditor> = Arc::new(ProtocolAuditor::new(
            schema.clone(),
            ledger.clone(),
            settings.constitution.source.clone(),
        ));

        let governor = Governor::new(
            schema.clone(),
            ledger.clone(),
            validator.clone(),
            synchronizer.clone(),
            auditor.clone(),
        )
        .with_standards(settings.standards.clone());

        Ok(Self {
            project: project.to_path_buf(),
            settings,
            schema,
            ledger,
            validator,
            synchronizer,
            auditor,
            governor,
        })
    }

    /// Load settings for `project` and build the engine
    pub fn for_project(project: &Path, config: Option<&Path>) -> AppResult<Self> {
        let settings = Settings::load(project, config)?;
        Self::new(project, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_engine_uses_builtin_stores() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::for_project(dir.path(), None).unwrap();
        assert_eq!(engine.validator.name(), "schema");
        assert!(engine.validator.supports_auto_fix());
        assert_eq!(engine.schema.load().await.unwrap().required_files.len(), 3);
        assert!(engine.ledger.get_version("protocol").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_explicit_missing_schema_fails_on_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".charter.json"),
            r#"{ "validation": { "schema": "missing.json" } }"#,
        )
        .unwrap();
        let engine = Engine::for_project(dir.path(), None).unwrap();
        let err = engine.schema.load().await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_plugin_validator_must_exist() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".charter.json"),
            r#"{ "validation": { "validator": "bin/check" }, "tools": { "validator": { "type": "plugin" } } }"#,
        )
        .unwrap();
        assert!(Engine::for_project(dir.path(), None).is_err());
    }
}
