//! External validator plugin
//!
//! Runs a project-supplied executable as `<exe> <project>` through the
//! constrained executor and reads a JSON `ValidationResult` from stdout.

use crate::error::{AppError, AppResult};
use crate::models::ValidationResult;
use crate::safety::exec::DEFAULT_TIMEOUT;
use crate::safety::{validate_existing_path, ExecOptions, SecureExecutor};
use crate::validator::{require_project, write_report, ComplianceValidator, ValidateOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub struct ExternalValidator {
    executable: PathBuf,
    name: String,
    executor: SecureExecutor,
    timeout: Duration,
}

impl ExternalValidator {
    /// `executable` must resolve inside `project`; it becomes the only allowed binary
    pub fn new(project: &Path, executable: impl AsRef<Path>) -> AppResult<Self> {
        let executable = validate_existing_path(executable, project)?;
        let program = executable.to_string_lossy().into_owned();
        let name = executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.clone());

        Ok(Self {
            executor: SecureExecutor::new([program]),
            executable,
            name,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ComplianceValidator for ExternalValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "external"
    }

    fn supports_auto_fix(&self) -> bool {
        false
    }

    async fn validate(&self, project: &Path, options: &ValidateOptions) -> AppResult<ValidationResult> {
        require_project(project)?;
        let program = self.executable.to_string_lossy();
        let target = project.to_string_lossy();

        info!("Running external validator {}", self.name);
        let output = self
            .executor
            .exec(
                &*program,
                &[&*target],
                ExecOptions::in_dir(project).with_timeout(self.timeout),
            )
            .await?
            .require_completion(&self.name, self.timeout)?;

        if !output.success {
            return Err(AppError::Validation(format!(
                "external validator {} exited with {}: {}",
                self.name,
                output.exit_code.map_or("signal".to_string(), |c| c.to_string()),
                output.stderr.trim()
            )));
        }

        let result: ValidationResult = serde_json::from_str(output.stdout.trim()).map_err(|e| {
            AppError::Validation(format!("external validator {} printed invalid JSON: {e}", self.name))
        })?;

        if let Some(report) = &options.report {
            write_report(report, &result).await?;
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_plugin_result_is_parsed() {
        let dir = TempDir::new().unwrap();
        script(
            dir.path(),
            "check.sh",
            r#"echo '{"score": 88.5, "grade": "B", "issues": [], "recommendations": []}'"#,
        );
        let validator = ExternalValidator::new(dir.path(), "check.sh").unwrap();
        let result = validator
            .validate(dir.path(), &ValidateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.score, 88.5);
        assert_eq!(result.grade, "B");
        assert!(!validator.supports_auto_fix());
    }

    #[tokio::test]
    async fn test_plugin_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        script(dir.path(), "fail.sh", "echo broken >&2\nexit 4");
        let validator = ExternalValidator::new(dir.path(), "fail.sh").unwrap();
        let err = validator
            .validate(dir.path(), &ValidateOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with 4"));
    }

    #[test]
    fn test_plugin_outside_project_rejected() {
        let dir = TempDir::new().unwrap();
        let err = ExternalValidator::new(dir.path(), "../../bin/sh").err().unwrap();
        assert!(err.is_security());
    }
}
