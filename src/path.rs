//! Project-relative path resolution.
//!
//! Journal records store file paths relative to the project root so that a
//! session recorded on one machine can be analysed on another. Files outside
//! the project keep their (normalized) absolute path.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors raised for unusable path arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// One of the paths was empty.
    #[error("{0} path must not be empty")]
    Empty(&'static str),
}

/// Resolve `absolute` against `project`.
///
/// Both paths are normalized lexically (`.` and `..` segments are resolved
/// without touching the file system). When the file lies under the project
/// root the relative remainder is returned, otherwise the normalized file path.
pub fn relative_path(absolute: &Path, project: &Path) -> Result<String, PathError> {
    if absolute.as_os_str().is_empty() {
        return Err(PathError::Empty("file"));
    }
    if project.as_os_str().is_empty() {
        return Err(PathError::Empty("project"));
    }

    let absolute = normalize(absolute);
    let project = normalize(project);

    match absolute.strip_prefix(&project) {
        Ok(relative) => Ok(relative.to_string_lossy().into_owned()),
        Err(_) => Ok(absolute.to_string_lossy().into_owned()),
    }
}

/// Lexically normalize a path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root; a leading `..` in a
                // relative path is kept.
                match normalized.components().next_back() {
                    Some(Component::Normal(_)) => {
                        normalized.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => normalized.push(".."),
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
