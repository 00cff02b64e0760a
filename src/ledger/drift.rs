//! Drift classification
//!
//! Two comparison modes are supported:
//! - `semver`: both tokens must be strict `MAJOR.MINOR.PATCH`; the drift level
//!   is the most significant differing component. Malformed tokens fail closed.
//! - `prefix`: dotted string comparison for files that carry looser version
//!   tokens (`1.2`, `1.2.3-rc1`). Tolerance is expressed as how many leading
//!   components must match.

use crate::ledger::types::validate_version;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftComparison {
    #[default]
    Semver,
    Prefix,
}

/// Largest drift a rule tolerates before the mismatch is out of policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftTolerance {
    #[default]
    #[serde(alias = "exact")]
    None,
    #[serde(alias = "patch-level")]
    Patch,
    #[serde(alias = "minor-level")]
    Minor,
    #[serde(alias = "major-level", alias = "any")]
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftLevel {
    Patch,
    Minor,
    Major,
}

impl fmt::Display for DriftLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftLevel::Patch => f.write_str("patch"),
            DriftLevel::Minor => f.write_str("minor"),
            DriftLevel::Major => f.write_str("major"),
        }
    }
}

impl DriftTolerance {
    pub fn allows(&self, level: DriftLevel) -> bool {
        match self {
            DriftTolerance::None => false,
            DriftTolerance::Patch => level == DriftLevel::Patch,
            DriftTolerance::Minor => level <= DriftLevel::Minor,
            DriftTolerance::Major => true,
        }
    }
}

/// Result of comparing a discovered version against the canonical one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    Match,
    Within(DriftLevel),
    Outside(DriftLevel),
    Malformed,
}

impl Drift {
    pub fn is_violation(&self) -> bool {
        matches!(self, Drift::Outside(_) | Drift::Malformed)
    }
}

pub fn assess(
    found: &str,
    canonical: &str,
    comparison: DriftComparison,
    tolerance: DriftTolerance,
) -> Drift {
    let level = match comparison {
        DriftComparison::Semver => semver_level(found, canonical),
        DriftComparison::Prefix => prefix_level(found, canonical),
    };

    match level {
        Err(()) => Drift::Malformed,
        Ok(None) => Drift::Match,
        Ok(Some(level)) if tolerance.allows(level) => Drift::Within(level),
        Ok(Some(level)) => Drift::Outside(level),
    }
}

fn semver_level(found: &str, canonical: &str) -> Result<Option<DriftLevel>, ()> {
    if !validate_version(found) || !validate_version(canonical) {
        return Err(());
    }
    let a = semver::Version::parse(found).map_err(|_| ())?;
    let b = semver::Version::parse(canonical).map_err(|_| ())?;

    Ok(if a.major != b.major {
        Some(DriftLevel::Major)
    } else if a.minor != b.minor {
        Some(DriftLevel::Minor)
    } else if a.patch != b.patch {
        Some(DriftLevel::Patch)
    } else {
        None
    })
}

fn prefix_level(found: &str, canonical: &str) -> Result<Option<DriftLevel>, ()> {
    let found = found.trim().trim_start_matches('v');
    let canonical = canonical.trim().trim_start_matches('v');
    if found.is_empty() || canonical.is_empty() {
        return Err(());
    }
    if found == canonical {
        return Ok(None);
    }

    let a: Vec<&str> = found.split('.').collect();
    let b: Vec<&str> = canonical.split('.').collect();
    Ok(Some(if a.first() != b.first() {
        DriftLevel::Major
    } else if a.get(1) != b.get(1) {
        DriftLevel::Minor
    } else {
        DriftLevel::Patch
    }))
}
