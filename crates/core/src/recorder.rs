// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recorder lifecycle states shared between the supervisor and the HTTP
//! surface. The on-disk `recorder.state` sidecar holds the lowercase form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopping,
}

impl RecorderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Paused => "paused",
            RecorderState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecorderState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(RecorderState::Idle),
            "recording" => Ok(RecorderState::Recording),
            "paused" => Ok(RecorderState::Paused),
            "stopping" => Ok(RecorderState::Stopping),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_sidecar_form() {
        for state in [
            RecorderState::Idle,
            RecorderState::Recording,
            RecorderState::Paused,
            RecorderState::Stopping,
        ] {
            assert_eq!(state.as_str().parse::<RecorderState>(), Ok(state));
        }
    }

    #[test]
    fn unknown_sidecar_content_is_rejected() {
        assert!("finalising".parse::<RecorderState>().is_err());
    }
}
