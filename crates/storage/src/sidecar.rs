// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pid/state/backend sidecar files.
//!
//! Each long-running helper owns a small set of files directly inside the
//! session directory. A missing or unreadable pid file means "not running";
//! stale pids are detected with a zero signal.

use crate::error::StorageError;
use crate::fsio::{atomic_write_small, read_trimmed};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use wb_core::RecorderState;

/// One of the four independent capture layers plus the canonical XI2 feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceSource {
    Canonical,
    X11Core,
    Client,
    Windows,
    Network,
}

impl TraceSource {
    pub const ALL: [TraceSource; 5] = [
        TraceSource::Canonical,
        TraceSource::X11Core,
        TraceSource::Client,
        TraceSource::Windows,
        TraceSource::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraceSource::Canonical => "canonical",
            TraceSource::X11Core => "x11_core",
            TraceSource::Client => "client",
            TraceSource::Windows => "windows",
            TraceSource::Network => "network",
        }
    }

    /// The `source` filter value used by `/input/events`.
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "client" => Some(TraceSource::Client),
            "x11_core" => Some(TraceSource::X11Core),
            "windows" => Some(TraceSource::Windows),
            "network" => Some(TraceSource::Network),
            _ => None,
        }
    }

    pub fn log_path(&self, session_dir: &Path) -> PathBuf {
        let name = match self {
            TraceSource::Canonical => "input_events.jsonl",
            TraceSource::X11Core => "input_events_x11_core.jsonl",
            TraceSource::Client => "input_events_client.jsonl",
            TraceSource::Windows => "input_events_windows.jsonl",
            TraceSource::Network => "input_events_network.jsonl",
        };
        session_dir.join("logs").join(name)
    }

    /// The client layer has no process of its own, hence no pid file.
    pub fn pid_path(&self, session_dir: &Path) -> Option<PathBuf> {
        let name = match self {
            TraceSource::Canonical => "input_trace.pid",
            TraceSource::X11Core => "input_trace_x11_core.pid",
            TraceSource::Client => return None,
            TraceSource::Windows => "input_trace_windows.pid",
            TraceSource::Network => "input_trace_network.pid",
        };
        Some(session_dir.join(name))
    }

    pub fn state_path(&self, session_dir: &Path) -> PathBuf {
        let name = match self {
            TraceSource::Canonical => "input_trace.state",
            TraceSource::X11Core => "input_trace_x11_core.state",
            TraceSource::Client => "input_trace_client.state",
            TraceSource::Windows => "input_trace_windows.state",
            TraceSource::Network => "input_trace_network.state",
        };
        session_dir.join(name)
    }

    /// Only the windows tracer records which backend it chose.
    pub fn backend_path(&self, session_dir: &Path) -> Option<PathBuf> {
        match self {
            TraceSource::Windows => Some(session_dir.join("input_trace_windows.backend")),
            _ => None,
        }
    }

    pub fn stderr_path(&self, session_dir: &Path) -> PathBuf {
        let name = match self {
            TraceSource::Canonical => "input_trace.log",
            TraceSource::X11Core => "input_trace_x11_core.stderr",
            TraceSource::Client => "input_trace_client.stderr",
            TraceSource::Windows => "input_trace_windows.stderr",
            TraceSource::Network => "input_trace_network.stderr",
        };
        session_dir.join("logs").join(name)
    }

    pub fn pid(&self, session_dir: &Path) -> Option<i32> {
        read_pid(&self.pid_path(session_dir)?)
    }

    pub fn running(&self, session_dir: &Path) -> bool {
        self.pid(session_dir).is_some_and(pid_running)
    }

    pub fn state(&self, session_dir: &Path) -> Option<String> {
        read_trimmed(&self.state_path(session_dir))
    }

    pub fn backend(&self, session_dir: &Path) -> Option<String> {
        read_trimmed(&self.backend_path(session_dir)?)
    }

    pub fn write_state(&self, session_dir: &Path, state: &str) -> Result<(), StorageError> {
        atomic_write_small(&self.state_path(session_dir), state.as_bytes())
    }

    pub fn write_backend(&self, session_dir: &Path, backend: &str) -> Result<(), StorageError> {
        match self.backend_path(session_dir) {
            Some(path) => atomic_write_small(&path, backend.as_bytes()),
            None => Ok(()),
        }
    }

    pub fn write_pid(&self, session_dir: &Path, pid: i32) -> Result<(), StorageError> {
        match self.pid_path(session_dir) {
            Some(path) => atomic_write_small(&path, pid.to_string().as_bytes()),
            None => Ok(()),
        }
    }

    /// The client trace toggles a state file rather than a process.
    pub fn client_enabled(session_dir: &Path) -> bool {
        TraceSource::Client
            .state(session_dir)
            .is_some_and(|s| s == "enabled")
    }
}

/// Parse a pid file; any failure reads as "not running".
pub fn read_pid(path: &Path) -> Option<i32> {
    read_trimmed(path)?.parse().ok()
}

/// Probe a pid with signal 0. EPERM means the process exists but is not
/// ours, which still counts as running.
pub fn pid_running(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

// --- recorder sidecars ---

pub fn recorder_pid_path(session_dir: &Path) -> PathBuf {
    session_dir.join("recorder.pid")
}

pub fn ffmpeg_pid_path(session_dir: &Path) -> PathBuf {
    session_dir.join("ffmpeg.pid")
}

pub fn recorder_state_path(session_dir: &Path) -> PathBuf {
    session_dir.join("recorder.state")
}

pub fn recorder_pid(session_dir: &Path) -> Option<i32> {
    read_pid(&recorder_pid_path(session_dir))
}

pub fn recorder_running(session_dir: &Path) -> bool {
    recorder_pid(session_dir).is_some_and(pid_running)
}

pub fn recorder_state(session_dir: &Path) -> Option<RecorderState> {
    read_trimmed(&recorder_state_path(session_dir))?.parse().ok()
}

pub fn write_recorder_state(session_dir: &Path, state: RecorderState) -> Result<(), StorageError> {
    atomic_write_small(&recorder_state_path(session_dir), state.as_str().as_bytes())
}

#[cfg(test)]
#[path = "sidecar_tests.rs"]
mod tests;
