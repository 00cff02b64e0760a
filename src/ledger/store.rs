//! Version Ledger store
//!
//! Caller-owned, lazily loaded and memoized for the lifetime of one run.
//! Every mutation rewrites the ledger file atomically.

use crate::error::{AppError, AppResult};
use crate::ledger::types::*;
use crate::safety::write_json_atomic;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Store for canonical component versions
pub struct VersionLedger {
    path: PathBuf,
    /// Used when `path` does not exist
    fallback: Option<Ledger>,
    cache: RwLock<Option<Arc<Ledger>>>,
}

impl VersionLedger {
    /// Ledger backed strictly by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: None,
            cache: RwLock::new(None),
        }
    }

    /// Ledger at `path`, falling back to the built-in defaults when absent
    pub fn with_builtin_fallback(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: Some(Self::builtin()),
            cache: RwLock::new(None),
        }
    }

    /// Built-in ledger: the protocol and governance documents at 1.0.0
    pub fn builtin() -> Ledger {
        let entry = ComponentVersion {
            current: "1.0.0".to_string(),
            previous: None,
            released_date: None,
            status: ReleaseStatus::Stable,
        };
        let mut ledger = Ledger::default();
        ledger.components.insert("protocol".to_string(), entry.clone());
        ledger.components.insert("governance".to_string(), entry);
        ledger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, reading the file at most once
    pub async fn load(&self) -> AppResult<Arc<Ledger>> {
        if let Some(ledger) = self.cache.read().await.as_ref() {
            return Ok(ledger.clone());
        }

        let ledger = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str::<Ledger>(&text).map_err(|e| {
                AppError::SchemaLoad(format!("malformed version ledger {}: {e}", self.path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match &self.fallback {
                Some(builtin) => {
                    debug!("No ledger at {}, using built-in defaults", self.path.display());
                    builtin.clone()
                }
                None => {
                    return Err(AppError::SchemaLoad(format!(
                        "version ledger not found: {}",
                        self.path.display()
                    )))
                }
            },
            Err(e) => return Err(AppError::Io(e)),
        };

        for (component, entry) in &ledger.components {
            if !validate_version(&entry.current) {
                return Err(AppError::VersionFormat(format!(
                    "{component}: {}",
                    entry.current
                )));
            }
        }

        let ledger = Arc::new(ledger);
        *self.cache.write().await = Some(ledger.clone());
        Ok(ledger)
    }

    /// Persist atomically and refresh the memoized copy
    pub async fn save(&self, ledger: &Ledger) -> AppResult<()> {
        write_json_atomic(&self.path, ledger).await?;
        *self.cache.write().await = Some(Arc::new(ledger.clone()));
        info!("Saved version ledger to {}", self.path.display());
        Ok(())
    }

    pub async fn get_version(&self, component: &str) -> AppResult<Option<String>> {
        let ledger = self.load().await?;
        Ok(ledger.components.get(component).map(|c| c.current.clone()))
    }

    /// Record a new release: rotates current → previous and stamps the date
    pub async fn update_version(
        &self,
        component: &str,
        new_version: &str,
        released_date: Option<NaiveDate>,
    ) -> AppResult<ComponentVersion> {
        if !validate_version(new_version) {
            return Err(AppError::VersionFormat(new_version.to_string()));
        }

        let mut ledger = (*self.load().await?).clone();
        let date = released_date.unwrap_or_else(|| Local::now().date_naive());

        let entry = match ledger.components.get(component) {
            Some(existing) => ComponentVersion {
                current: new_version.to_string(),
                previous: Some(existing.current.clone()),
                released_date: Some(date),
                status: existing.status,
            },
            None => ComponentVersion {
                current: new_version.to_string(),
                previous: None,
                released_date: Some(date),
                status: ReleaseStatus::Stable,
            },
        };
        ledger.components.insert(component.to_string(), entry.clone());
        self.save(&ledger).await?;

        info!(
            "Bumped {} to {} (previous: {})",
            component,
            new_version,
            entry.previous.as_deref().unwrap_or("none")
        );
        Ok(entry)
    }

    /// Flag deprecations past their removal point and known breaking versions
    pub async fn check_compatibility(&self, version: &str, component: &str) -> AppResult<Compatibility> {
        if !validate_version(version) {
            return Err(AppError::VersionFormat(version.to_string()));
        }
        let ledger = self.load().await?;
        let target = semver::Version::parse(version)
            .map_err(|_| AppError::VersionFormat(version.to_string()))?;
        let today = Local::now().date_naive();
        let mut issues = Vec::new();

        if let Some(entry) = ledger.components.get(component) {
            if entry.status == ReleaseStatus::Deprecated {
                issues.push(format!("component '{component}' is deprecated"));
            }
        }

        for feature in ledger.deprecated_features.iter().filter(|f| f.feature == component) {
            let replacement = feature
                .replacement
                .as_deref()
                .map(|r| format!("; use '{r}' instead"))
                .unwrap_or_default();

            let past_version = feature
                .removal_version
                .as_deref()
                .and_then(|v| semver::Version::parse(v).ok())
                .is_some_and(|removal| target >= removal);
            if past_version {
                issues.push(format!(
                    "'{component}' was removed in {}{replacement}",
                    feature.removal_version.as_deref().unwrap_or_default()
                ));
            }

            if let Some(date) = feature.removal_date {
                if today > date {
                    issues.push(format!("'{component}' passed its removal date {date}{replacement}"));
                }
            }
        }

        for change in ledger.breaking_changes.iter().filter(|c| c.version == version) {
            let migration = change
                .migration
                .as_deref()
                .map(|m| format!(" (migration: {m})"))
                .unwrap_or_default();
            issues.push(format!("breaking change in {}: {}{migration}", change.version, change.description));
        }

        Ok(Compatibility {
            compatible: issues.is_empty(),
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn ledger_with(component: &str, version: &str) -> Ledger {
        let mut ledger = Ledger::default();
        ledger.components.insert(
            component.to_string(),
            ComponentVersion {
                current: version.to_string(),
                previous: None,
                released_date: None,
                status: ReleaseStatus::Stable,
            },
        );
        ledger
    }

    #[tokio::test]
    async fn test_missing_file_without_fallback_fails() {
        let dir = TempDir::new().unwrap();
        let store = VersionLedger::new(dir.path().join("versions.json"));
        assert!(matches!(store.load().await, Err(AppError::SchemaLoad(_))));
    }

    #[tokio::test]
    async fn test_builtin_fallback() {
        let dir = TempDir::new().unwrap();
        let store = VersionLedger::with_builtin_fallback(dir.path().join("versions.json"));
        assert_eq!(store.get_version("protocol").await.unwrap().as_deref(), Some("1.0.0"));
        assert_eq!(store.get_version("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_rotates_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("versions.json");
        let store = VersionLedger::new(&path);
        assert_ok!(store.save(&ledger_with("protocol", "1.2.0")).await);

        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let entry = store.update_version("protocol", "1.3.0", Some(date)).await.unwrap();
        assert_eq!(entry.previous.as_deref(), Some("1.2.0"));
        assert_eq!(entry.released_date, Some(date));

        let reloaded = VersionLedger::new(&path);
        let ledger = reloaded.load().await.unwrap();
        assert_eq!(ledger.components["protocol"].current, "1.3.0");
        assert_eq!(ledger.components["protocol"].previous.as_deref(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_version_and_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("versions.json");
        let store = VersionLedger::new(&path);
        store.save(&ledger_with("protocol", "1.2.0")).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = store.update_version("protocol", "1.3", None).await.unwrap_err();
        assert!(matches!(err, AppError::VersionFormat(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_malformed_canonical_version_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("versions.json");
        std::fs::write(&path, r#"{"components":{"protocol":{"current":"1.2"}}}"#).unwrap();
        let store = VersionLedger::new(&path);
        assert!(matches!(store.load().await, Err(AppError::VersionFormat(_))));
    }

    #[tokio::test]
    async fn test_compatibility_flags_removal_and_breaking_change() {
        let dir = TempDir::new().unwrap();
        let store = VersionLedger::new(dir.path().join("versions.json"));
        let mut ledger = ledger_with("legacy-api", "1.0.0");
        ledger.deprecated_features.push(DeprecatedFeature {
            feature: "legacy-api".into(),
            replacement: Some("api-v2".into()),
            removal_version: Some("2.0.0".into()),
            removal_date: None,
        });
        ledger.breaking_changes.push(BreakingChange {
            version: "3.0.0".into(),
            description: "config layout changed".into(),
            migration: Some("run migrate".into()),
        });
        store.save(&ledger).await.unwrap();

        let ok = store.check_compatibility("1.5.0", "legacy-api").await.unwrap();
        assert!(ok.compatible);

        let removed = store.check_compatibility("2.1.0", "legacy-api").await.unwrap();
        assert!(!removed.compatible);
        assert!(removed.issues[0].contains("api-v2"));

        let breaking = store.check_compatibility("3.0.0", "other").await.unwrap();
        assert!(!breaking.compatible);
        assert!(breaking.issues[0].contains("run migrate"));
    }
}
