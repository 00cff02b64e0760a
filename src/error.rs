//! Error handling module
//!
//! Provides the unified error taxonomy for the engine. Structural errors abort a
//! command, per-file problems are captured as issues by the scanners instead.

use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Schema load error: {0}")]
    SchemaLoad(String),

    #[error("Schema invalid: {}", .0.join("; "))]
    SchemaInvalid(Vec<String>),

    #[error("Project not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Invalid version format: {0} (expected MAJOR.MINOR.PATCH)")]
    VersionFormat(String),

    #[error("Process timed out after {timeout_ms} ms: {command}")]
    ProcessTimeout { command: String, timeout_ms: u64 },

    #[error("Process rejected: {0}")]
    ProcessRejected(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::SchemaLoad(_) => "SCHEMA_LOAD",
            AppError::SchemaInvalid(_) => "SCHEMA_INVALID",
            AppError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            AppError::PathTraversal(_) => "PATH_TRAVERSAL",
            AppError::PathNotFound(_) => "PATH_NOT_FOUND",
            AppError::VersionFormat(_) => "VERSION_FORMAT",
            AppError::ProcessTimeout { .. } => "PROCESS_TIMEOUT",
            AppError::ProcessRejected(_) => "PROCESS_REJECTED",
            AppError::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Security-relevant errors are fatal to the triggering operation and are
    /// never downgraded by exception policies.
    pub fn is_security(&self) -> bool {
        matches!(self, AppError::PathTraversal(_) | AppError::ProcessRejected(_))
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::PathTraversal(_) | AppError::ProcessRejected(_) => 3,
            AppError::SchemaLoad(_)
            | AppError::SchemaInvalid(_)
            | AppError::ProjectNotFound(_)
            | AppError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_errors_are_flagged() {
        assert!(AppError::PathTraversal("../x".into()).is_security());
        assert!(AppError::ProcessRejected("rm".into()).is_security());
        assert!(!AppError::SchemaLoad("missing".into()).is_security());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::ProjectNotFound(PathBuf::from("/nope")).exit_code(), 2);
        assert_eq!(AppError::PathTraversal("..".into()).exit_code(), 3);
        assert_eq!(AppError::Internal("boom".into()).exit_code(), 1);
        assert_eq!(AppError::VersionFormat("1.2".into()).code(), "VERSION_FORMAT");
    }
}
