//! Version declaration scanner

use crate::error::AppResult;
use crate::safety::validate_path;
use crate::schema::types::{VersionFile, VersionMatch};
use std::path::{Path, PathBuf};

/// What was found at one version-bearing path
#[derive(Debug, Clone)]
pub enum Located {
    Missing,
    Unreadable(String),
    NoDeclaration,
    Found { text: String, token: VersionMatch },
}

/// Resolve `file` inside `project` and extract its version declaration.
///
/// Only containment and pattern errors propagate; I/O trouble is reported
/// as [`Located::Unreadable`] so the caller can keep going.
pub async fn locate(project: &Path, file: &VersionFile) -> AppResult<(PathBuf, Located)> {
    let path = validate_path(&file.path, project)?;
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((path, Located::Missing)),
        Err(e) => return Ok((path, Located::Unreadable(e.to_string()))),
    };

    let located = match file.extract(&text)? {
        Some(token) => Located::Found { text, token },
        None => Located::NoDeclaration,
    };
    Ok((path, located))
}
