//! Version Ledger
//!
//! Canonical version per tracked component, plus breaking-change and
//! deprecation metadata used by compatibility checks.

pub mod drift;
pub mod store;
pub mod types;

pub use drift::{assess, Drift, DriftComparison, DriftLevel, DriftTolerance};
pub use store::VersionLedger;
pub use types::{validate_version, Compatibility, ComponentVersion, Ledger, ReleaseStatus};
