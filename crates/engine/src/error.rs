// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::broker::BrokerError;
use thiserror::Error;
use wb_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("recorder failed to start: {0}")]
    RecorderStartFailed(String),

    #[error("failed to signal {target}: {source}")]
    SignalFailed {
        target: String,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
