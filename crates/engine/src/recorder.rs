// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP-side recorder supervision.
//!
//! The recorder itself is a separate process (`winebot-recorder`); this
//! module spawns it per segment and drives it over the POSIX signal
//! contract: SIGUSR1 pauses, SIGUSR2 resumes, SIGTERM stops and finalises.
//! Idempotent operations report their terminal state instead of failing.

use crate::error::EngineError;
use crate::registry::ProcessRegistry;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use wb_core::session::generate_session_id;
use wb_core::RecorderState;
use wb_storage::logs::append_lifecycle_event;
use wb_storage::segments::{events_path, next_segment_index, video_path};
use wb_storage::sidecar;
use wb_storage::{ManifestDefaults, SessionStore, StorageError};

/// Recording stops when free space under the session drops below this.
pub const DISK_FLOOR_MB: u64 = 300;

#[derive(Debug, Clone, Default)]
pub struct RecordingStart {
    pub session_label: Option<String>,
    pub session_root: Option<PathBuf>,
    pub display: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<u32>,
    pub new_session: bool,
}

#[derive(Debug, Serialize)]
pub struct RecorderAction {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder_pid: Option<i32>,
}

impl RecorderAction {
    fn status_only(status: &'static str) -> Self {
        Self {
            status,
            session_id: None,
            session_dir: None,
            segment: None,
            output_file: None,
            events_file: None,
            display: None,
            resolution: None,
            fps: None,
            recorder_pid: None,
        }
    }

    fn for_session(status: &'static str, session_dir: &Path) -> Self {
        let mut action = Self::status_only(status);
        action.session_id = SessionStore::session_id_from_dir(session_dir);
        action.session_dir = Some(session_dir.to_path_buf());
        action
    }
}

#[derive(Debug, Serialize)]
pub struct RecorderStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RecorderState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,
}

pub struct RecorderSupervisor {
    store: SessionStore,
    defaults: ManifestDefaults,
    recorder_bin: PathBuf,
    registry: Arc<ProcessRegistry>,
}

impl RecorderSupervisor {
    pub fn new(
        store: SessionStore,
        defaults: ManifestDefaults,
        recorder_bin: PathBuf,
        registry: Arc<ProcessRegistry>,
    ) -> Self {
        Self { store, defaults, recorder_bin, registry }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start recording, or resume a paused segment, or report that one is
    /// already live.
    pub async fn start(&self, opts: RecordingStart) -> Result<RecorderAction, EngineError> {
        let current = self.store.current();
        if let Some(dir) = current.as_deref().filter(|d| sidecar::recorder_running(d)) {
            if sidecar::recorder_state(dir) == Some(RecorderState::Paused) {
                self.signal_recorder(dir, Signal::SIGUSR2)?;
                return Ok(RecorderAction::for_session("resumed", dir));
            }
            return Ok(RecorderAction::for_session("already_recording", dir));
        }

        let defaults = ManifestDefaults {
            display: opts.display.clone().unwrap_or_else(|| self.defaults.display.clone()),
            resolution: opts
                .resolution
                .clone()
                .unwrap_or_else(|| self.defaults.resolution.clone()),
            fps: opts.fps.unwrap_or(self.defaults.fps),
            git_sha: self.defaults.git_sha.clone(),
        };

        let session_dir = self.adopt_or_create_session(&opts, &defaults)?;
        let segment = next_segment_index(&session_dir)?;

        let mut cmd = Command::new(&self.recorder_bin);
        cmd.arg("start")
            .arg("--session-dir")
            .arg(&session_dir)
            .arg("--display")
            .arg(&defaults.display)
            .arg("--resolution")
            .arg(&defaults.resolution)
            .arg("--fps")
            .arg(defaults.fps.to_string())
            .arg("--segment")
            .arg(segment.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd
            .spawn()
            .map_err(|e| EngineError::RecorderStartFailed(e.to_string()))?;
        self.registry.track(child);

        // The recorder writes its pid once it is up; give it a moment.
        let mut pid = None;
        for _ in 0..10 {
            pid = sidecar::recorder_pid(&session_dir);
            if pid.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut action = RecorderAction::for_session("started", &session_dir);
        action.segment = Some(segment);
        action.output_file = Some(video_path(&session_dir, segment));
        action.events_file = Some(events_path(&session_dir, segment));
        action.display = Some(defaults.display);
        action.resolution = Some(defaults.resolution);
        action.fps = Some(defaults.fps);
        action.recorder_pid = pid;
        Ok(action)
    }

    pub async fn pause(&self) -> Result<RecorderAction, EngineError> {
        let Some(dir) = self.store.current() else {
            return Ok(RecorderAction::status_only("idle"));
        };
        if !sidecar::recorder_running(&dir)
            || sidecar::recorder_state(&dir) == Some(RecorderState::Paused)
        {
            return Ok(RecorderAction::for_session("already_paused", &dir));
        }
        self.signal_recorder(&dir, Signal::SIGUSR1)?;
        Ok(RecorderAction::for_session("paused", &dir))
    }

    pub async fn resume(&self) -> Result<RecorderAction, EngineError> {
        let Some(dir) = self.store.current() else {
            return Ok(RecorderAction::status_only("idle"));
        };
        if !sidecar::recorder_running(&dir) {
            return Ok(RecorderAction::for_session("idle", &dir));
        }
        if sidecar::recorder_state(&dir) != Some(RecorderState::Paused) {
            return Ok(RecorderAction::for_session("already_recording", &dir));
        }
        self.signal_recorder(&dir, Signal::SIGUSR2)?;
        Ok(RecorderAction::for_session("resumed", &dir))
    }

    /// Stop recording. The recorder finalises the segment on SIGTERM and
    /// removes its own sidecars; we wait briefly for that to happen.
    pub async fn stop(&self) -> Result<RecorderAction, EngineError> {
        let Some(dir) = self.store.current() else {
            return Ok(RecorderAction::status_only("already_stopped"));
        };
        if !sidecar::recorder_running(&dir) {
            let _ = sidecar::write_recorder_state(&dir, RecorderState::Idle);
            return Ok(RecorderAction::for_session("already_stopped", &dir));
        }
        sidecar::write_recorder_state(&dir, RecorderState::Stopping)?;
        self.signal_recorder(&dir, Signal::SIGTERM)?;
        for _ in 0..10 {
            if !sidecar::recorder_running(&dir) {
                let _ = sidecar::write_recorder_state(&dir, RecorderState::Idle);
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(RecorderAction::for_session("stopped", &dir))
    }

    pub fn status(&self) -> RecorderStatus {
        let session_dir = self.store.current();
        match session_dir {
            Some(dir) => RecorderStatus {
                running: sidecar::recorder_running(&dir),
                state: sidecar::recorder_state(&dir),
                pid: sidecar::recorder_pid(&dir),
                session_dir: Some(dir),
            },
            None => RecorderStatus { running: false, state: None, pid: None, session_dir: None },
        }
    }

    /// Monitor-tick hook: stop the recorder when disk space runs out.
    pub fn disk_watchdog(&self) {
        let Some(dir) = self.store.current() else { return };
        if !sidecar::recorder_running(&dir) {
            return;
        }
        let Some(free_mb) = free_megabytes(&dir) else { return };
        if free_mb >= DISK_FLOOR_MB {
            return;
        }
        tracing::warn!(free_mb, "low disk space; force-stopping recorder");
        append_lifecycle_event(
            Some(&dir),
            "recorder_force_stop",
            &format!("Low disk space ({free_mb}MB)"),
            "api_watchdog",
            None,
        );
        let _ = sidecar::write_recorder_state(&dir, RecorderState::Stopping);
        let _ = self.signal_recorder(&dir, Signal::SIGTERM);
    }

    fn adopt_or_create_session(
        &self,
        opts: &RecordingStart,
        defaults: &ManifestDefaults,
    ) -> Result<PathBuf, EngineError> {
        if !opts.new_session {
            if let Some(current) = self.store.current() {
                if current.join("session.json").exists() {
                    SessionStore::ensure_subdirs(&current)?;
                    return Ok(current);
                }
            }
        }
        let root = opts.session_root.as_deref().unwrap_or(self.store.root());
        let root = self.store.policy().validate(root)?;
        std::fs::create_dir_all(&root).map_err(StorageError::Io)?;
        let epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let id = generate_session_id(opts.session_label.as_deref(), epoch);
        Ok(self.store.create_session(&root, &id, defaults)?)
    }

    fn signal_recorder(&self, session_dir: &Path, sig: Signal) -> Result<(), EngineError> {
        let Some(pid) = sidecar::recorder_pid(session_dir) else {
            return Ok(());
        };
        kill(Pid::from_raw(pid), sig).map_err(|source| EngineError::SignalFailed {
            target: format!("recorder pid {pid}"),
            source,
        })
    }
}

fn free_megabytes(path: &Path) -> Option<u64> {
    let stat = nix::sys::statvfs::statvfs(path).ok()?;
    Some((stat.blocks_available() as u64 * stat.fragment_size() as u64) / (1024 * 1024))
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
