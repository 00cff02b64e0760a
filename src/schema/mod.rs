//! Rule Schema
//!
//! The declarative rule set every other component evaluates against:
//! required files, version-consistency rules, quality metrics, scoring
//! weights, grade thresholds, remediation actions and exception policies.

pub mod store;
pub mod types;

pub use store::{SchemaStore, SelfCheck};
pub use types::{
    ExceptionCondition, ExceptionPolicy, QualityMetricKind, RemediationAction, RemediationKind,
    RequiredFileRule, Rule, RuleKind, RuleSchema, VersionFile, VersionRule,
};
