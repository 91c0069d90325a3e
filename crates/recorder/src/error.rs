// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] wb_storage::StorageError),

    #[error("event serialisation failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("no recorder pid file in {0}")]
    NotRunning(std::path::PathBuf),

    #[error("session manifest not found in {0}")]
    NoManifest(std::path::PathBuf),
}
