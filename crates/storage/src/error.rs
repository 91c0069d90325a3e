// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error taxonomy. The HTTP layer maps these onto status codes:
//! `BadRequest`/`InvalidPath` → 400, `NotFound` → 404, `Io` → 500.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path not allowed: {path} (must be under one of: {allowed})")]
    InvalidPath { path: PathBuf, allowed: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("session directory not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True when the error came from the filesystem rather than the caller.
    pub fn is_io(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}
