//! Repository integration
//!
//! Everything goes through the allow-listed executor. `status` is read-only;
//! `create_tag` is only called when the operator explicitly asked for it.

use crate::error::{AppError, AppResult};
use crate::safety::{ExecOptions, SecureExecutor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const GIT: &str = "git";
const GIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Snapshot of the working tree around a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryState {
    pub branch: Option<String>,
    pub clean: bool,
    pub changed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Parse `git status --porcelain=v1 --branch`
pub fn parse_porcelain(output: &str) -> RepositoryState {
    let mut state = RepositoryState::default();
    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            let branch = header.split("...").next().unwrap_or(header).trim();
            state.branch = Some(branch.to_string());
        } else if line.len() > 3 {
            state.changed.push(line[3..].trim().to_string());
        }
    }
    state.clean = state.changed.is_empty();
    state
}

pub async fn status(executor: &SecureExecutor, project: &Path) -> AppResult<RepositoryState> {
    let output = executor
        .exec(
            GIT,
            &["status", "--porcelain=v1", "--branch"],
            ExecOptions::in_dir(project).with_timeout(GIT_TIMEOUT),
        )
        .await?
        .require_completion(GIT, GIT_TIMEOUT)?;

    if !output.success {
        return Err(AppError::Validation(format!(
            "git status failed: {}",
            output.stderr.trim()
        )));
    }
    Ok(parse_porcelain(&output.stdout))
}

/// Create a lightweight tag at HEAD
pub async fn create_tag(executor: &SecureExecutor, project: &Path, tag: &str) -> AppResult<()> {
    let output = executor
        .exec(
            GIT,
            &["tag", tag],
            ExecOptions::in_dir(project).with_timeout(GIT_TIMEOUT),
        )
        .await?
        .require_completion(GIT, GIT_TIMEOUT)?;

    if !output.success {
        return Err(AppError::Validation(format!(
            "git tag {tag} failed: {}",
            output.stderr.trim()
        )));
    }
    info!("Tagged {} as {}", project.display(), tag);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_porcelain() {
        let state = parse_porcelain("## main...origin/main [ahead 1]\n M PROTOCOL.md\n?? notes.txt\n");
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(state.changed, vec!["PROTOCOL.md", "notes.txt"]);
        assert!(!state.clean);
    }

    #[test]
    fn test_parse_clean_tree() {
        let state = parse_porcelain("## release\n");
        assert_eq!(state.branch.as_deref(), Some("release"));
        assert!(state.clean);
    }

    #[tokio::test]
    async fn test_tag_injection_is_rejected() {
        let exec = SecureExecutor::git_only();
        let err = create_tag(&exec, Path::new("."), "v1.0.0;rm -rf /").await.unwrap_err();
        assert!(err.is_security());
    }
}
