// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] wb_storage::StorageError),

    #[error("capture backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("windows hook backend failed to start")]
    BackendFailed,

    #[error("no input devices resolved")]
    NoDevices,
}
