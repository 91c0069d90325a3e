// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefix-anchored path validation.
//!
//! Validation uses true resolution, not lexical prefix matching: the
//! deepest existing ancestor is canonicalised (following symlinks) and any
//! `..` left in the not-yet-existing remainder is rejected outright. A
//! symlink under an allowed prefix pointing outside it therefore fails.

use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};

/// The closed list of roots a request may touch.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    prefixes: Vec<PathBuf>,
}

impl PathPolicy {
    pub fn new(prefixes: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { prefixes: prefixes.into_iter().collect() }
    }

    /// The production allow-list: apps, wineprefix, temp, artifacts,
    /// installation and tool areas.
    pub fn default_allowed() -> Self {
        Self::new(
            ["/apps", "/wineprefix", "/tmp", "/artifacts", "/opt/winebot", "/usr/bin"]
                .into_iter()
                .map(PathBuf::from),
        )
    }

    /// Resolve `path` and require it to live under one of the prefixes.
    pub fn validate(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let resolved = resolve(path).map_err(|_| self.denied(path))?;
        for prefix in &self.prefixes {
            let prefix = resolve(prefix).unwrap_or_else(|_| prefix.clone());
            if resolved.starts_with(&prefix) {
                return Ok(resolved);
            }
        }
        Err(self.denied(path))
    }

    fn denied(&self, path: &Path) -> StorageError {
        let allowed = self
            .prefixes
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        StorageError::InvalidPath { path: path.to_path_buf(), allowed }
    }
}

/// Canonicalise a path that may not fully exist yet.
///
/// The deepest existing ancestor is resolved through the filesystem; the
/// remaining (virtual) components are appended verbatim, except that `..`
/// cannot be resolved without the directory existing and is an error.
fn resolve(path: &Path) -> std::io::Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = abs.clone();
    let mut virtual_tail: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                virtual_tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for name in virtual_tail.iter().rev() {
        match Path::new(name).components().next() {
            Some(Component::ParentDir) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "'..' through a non-existent directory",
                ));
            }
            Some(Component::CurDir) | None => {}
            _ => resolved.push(name),
        }
    }
    Ok(resolved)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
