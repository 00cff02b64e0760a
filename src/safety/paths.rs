//! Path containment checks
//!
//! All schema-declared paths are resolved through here before the engine reads
//! or writes anything under a project.

use crate::error::{AppError, AppResult};
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `base_dir` and require that the result stays inside it.
///
/// The check is component-wise on the lexically normalised path, so
/// `../`-escapes and sibling directories sharing a name prefix are rejected.
/// When both paths exist on disk they are also canonicalised, which catches
/// symlinks pointing outside the base.
pub fn validate_path(path: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> AppResult<PathBuf> {
    let path = path.as_ref();
    let base = absolutize(base_dir.as_ref())?;

    let joined = if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    };

    if !joined.starts_with(&base) {
        return Err(AppError::PathTraversal(format!(
            "{} escapes {}",
            path.display(),
            base.display()
        )));
    }

    if let (Ok(real_base), Ok(real_path)) = (base.canonicalize(), joined.canonicalize()) {
        if !real_path.starts_with(&real_base) {
            return Err(AppError::PathTraversal(format!(
                "{} resolves outside {}",
                path.display(),
                base.display()
            )));
        }
    }

    Ok(joined)
}

/// Like [`validate_path`] but additionally requires the target to exist
pub fn validate_existing_path(
    path: impl AsRef<Path>,
    base_dir: impl AsRef<Path>,
) -> AppResult<PathBuf> {
    let resolved = validate_path(path, base_dir)?;
    if !resolved.exists() {
        return Err(AppError::PathNotFound(resolved));
    }
    Ok(resolved)
}

/// Strip separators and parent-directory tokens from a bare file name.
///
/// A name that would change under sanitisation is treated as hostile and
/// rejected instead of being silently rewritten.
pub fn sanitize_filename(name: &str) -> AppResult<String> {
    let cleaned: String = name
        .replace("..", "")
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .collect();

    if cleaned != name || cleaned.is_empty() || cleaned == "." {
        return Err(AppError::PathTraversal(format!(
            "unsafe file name: {name:?}"
        )));
    }
    Ok(cleaned)
}

/// Path of `path` relative to `base`, for display in issues and reports
pub fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn absolutize(path: &Path) -> AppResult<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Lexical normalisation: drops `.` and folds `..` without touching the disk
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
