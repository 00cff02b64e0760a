//! Version Ledger data model

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static STRICT_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)$").expect("version pattern")
});

/// Strict numeric `MAJOR.MINOR.PATCH`. No prefixes, suffixes or leading zeros.
pub fn validate_version(version: &str) -> bool {
    STRICT_VERSION.is_match(version)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    #[default]
    Stable,
    Beta,
    Deprecated,
}

/// Canonical version record for one tracked component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVersion {
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChange {
    pub version: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedFeature {
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removal_date: Option<NaiveDate>,
}

/// On-disk ledger document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub components: BTreeMap<String, ComponentVersion>,
    #[serde(default)]
    pub breaking_changes: Vec<BreakingChange>,
    #[serde(default)]
    pub deprecated_features: Vec<DeprecatedFeature>,
}

/// Result of a compatibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    pub compatible: bool,
    pub issues: Vec<String>,
}
