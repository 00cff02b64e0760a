//! Constrained process execution
//!
//! Commands are always spawned with an explicit argument vector; there is no
//! shell in between. Anything that looks like shell syntax is refused before a
//! process is created.

use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Default timeout applied when the caller does not pass one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '\n', '\r'];

/// Uniform result of a child process run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ExecOutput {
    /// Convert a timeout into [`AppError::ProcessTimeout`], pass everything else through
    pub fn require_completion(self, command: &str, timeout: Duration) -> AppResult<Self> {
        if self.timed_out {
            return Err(AppError::ProcessTimeout {
                command: command.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(self)
    }
}

/// Per-call execution options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    pub fn in_dir(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: Some(cwd.as_ref().to_path_buf()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Allow-listed executor for external binaries
#[derive(Debug, Clone)]
pub struct SecureExecutor {
    allowed: BTreeSet<String>,
    default_timeout: Duration,
}

impl SecureExecutor {
    /// Executor that may only run the named binaries
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Executor restricted to the version-control binary
    pub fn git_only() -> Self {
        Self::new(["git"])
    }

    pub fn allow(&mut self, command: impl Into<String>) {
        self.allowed.insert(command.into());
    }

    pub fn is_command_allowed(&self, command: &str) -> bool {
        self.allowed.contains(command)
    }

    /// Run `command` with `args`.
    ///
    /// Errors only when the invocation is refused or the process cannot be
    /// spawned; a non-zero exit or a timeout is reported in [`ExecOutput`].
    pub async fn exec(&self, command: &str, args: &[&str], options: ExecOptions) -> AppResult<ExecOutput> {
        check_arguments(command, args)?;
        if !self.is_command_allowed(command) {
            warn!(command, "refusing to run command outside the allow-list");
            return Err(AppError::ProcessRejected(format!(
                "command not allowed: {command}"
            )));
        }

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command, ?args, timeout_ms = timeout.as_millis() as u64, "spawning process");
        let started = Instant::now();
        let child = cmd.spawn()?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
                timed_out: false,
                duration_ms: started.elapsed().as_millis() as u64,
            }),
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(_) => {
                // the dropped future owned the child; kill_on_drop terminates it
                warn!(command, timeout_ms = timeout.as_millis() as u64, "process timed out and was killed");
                Ok(ExecOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: format!("timed out after {} ms", timeout.as_millis()),
                    exit_code: None,
                    timed_out: true,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

fn check_arguments(command: &str, args: &[&str]) -> AppResult<()> {
    if command.is_empty() || command.contains(SHELL_METACHARACTERS) {
        return Err(AppError::ProcessRejected(format!(
            "shell metacharacters in command: {command:?}"
        )));
    }
    if let Some(bad) = args.iter().find(|a| a.contains(SHELL_METACHARACTERS)) {
        return Err(AppError::ProcessRejected(format!(
            "shell metacharacters in argument: {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injection_in_argument_is_rejected_before_spawn() {
        let exec = SecureExecutor::git_only();
        let err = exec
            .exec("git", &["status; rm -rf /"], ExecOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProcessRejected(_)));
    }

    #[tokio::test]
    async fn test_each_metacharacter_is_rejected() {
        let exec = SecureExecutor::git_only();
        for arg in ["a|b", "a&b", "$HOME", "`id`"] {
            let result = exec.exec("git", &[arg], ExecOptions::default()).await;
            assert!(matches!(result, Err(AppError::ProcessRejected(_))), "{arg}");
        }
    }

    #[tokio::test]
    async fn test_command_outside_allow_list_is_rejected() {
        let exec = SecureExecutor::git_only();
        let err = exec.exec("rm", &["-rf", "x"], ExecOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::ProcessRejected(_)));
    }

    #[test]
    fn test_allow_list() {
        let mut exec = SecureExecutor::git_only();
        assert!(exec.is_command_allowed("git"));
        assert!(!exec.is_command_allowed("sh"));
        exec.allow("sh");
        assert!(exec.is_command_allowed("sh"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_child_is_not_an_error() {
        let exec = SecureExecutor::new(["false"]);
        let out = exec.exec("false", &[], ExecOptions::default()).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(1));
        assert!(!out.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_and_reports() {
        let exec = SecureExecutor::new(["sleep"]);
        let options = ExecOptions::default().with_timeout(Duration::from_millis(100));
        let out = exec.exec("sleep", &["5"], options).await.unwrap();
        assert!(out.timed_out);
        assert!(!out.success);
        assert!(out.duration_ms < 5_000);

        let err = out
            .require_completion("sleep", Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, AppError::ProcessTimeout { .. }));
    }
}
