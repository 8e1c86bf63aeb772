//! Path validation: every file tool is confined to the workspace root.
//!
//! Relative paths resolve against the root. Paths that escape it, or that
//! fall under a forbidden prefix (e.g. `~/.ssh`), are refused.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path is empty")]
    Empty,
}

/// Built-in forbidden prefixes, always in effect.
pub const DEFAULT_FORBIDDEN: &[&str] = &["~/.ssh", "~/.gnupg", "~/.aws", "/etc/shadow", "/etc/sudoers"];

/// The workspace root plus forbidden prefixes.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    root: PathBuf,
    forbidden: Vec<String>,
}

impl PathPolicy {
    /// A policy rooted at `root`, with the built-in forbidden list plus `extra_forbidden`.
    pub fn new(root: impl Into<PathBuf>, extra_forbidden: &[String]) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        let mut forbidden: Vec<String> = DEFAULT_FORBIDDEN.iter().map(|s| s.to_string()).collect();
        forbidden.extend(extra_forbidden.iter().cloned());
        Self { root, forbidden }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path to an absolute path inside the workspace.
    ///
    /// The target need not exist (writes create files). Symlinks in the
    /// existing part of the path are resolved before the containment check.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathValidationError::Empty);
        }

        let input = Path::new(trimmed);
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PathValidationError::PathTraversal { path: path.into() });
        }

        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };
        let resolved = canonicalize_existing_prefix(&joined);

        let resolved_str = resolved.to_string_lossy().replace('\\', "/");
        for pattern in &self.forbidden {
            let expanded = expand_tilde(pattern).replace('\\', "/");
            if resolved_str.starts_with(expanded.trim_end_matches('/')) {
                return Err(PathValidationError::ForbiddenPath {
                    path: path.into(),
                    pattern: pattern.clone(),
                });
            }
        }

        if !resolved.starts_with(&self.root) {
            return Err(PathValidationError::OutsideWorkspace { path: path.into() });
        }

        Ok(resolved)
    }

    /// Display form of `path` relative to the workspace root.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Canonicalize the longest existing ancestor and re-append the rest.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in rest.iter().rev() {
        resolved.push(name);
    }
    resolved
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}
