// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guest-side (windows layer) tracer backends.
//!
//! Two ways to capture input inside the compatibility layer: `hook` runs a
//! low-level keyboard/mouse hook through the in-prefix python runtime,
//! `ahk` runs the packaged AutoHotkey script. `auto` tries the hook first
//! and falls back to the script if the hook dies within its startup probe
//! window.

use crate::error::TraceError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::{Child, Command};
use wb_storage::TraceSource;

pub const DEFAULT_HOOK_SCRIPT: &str = "/scripts/wine-input-hook.py";
pub const DEFAULT_AHK_SCRIPT: &str = "/automation/input_trace_windows.ahk";
const HOOK_PROBE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowsBackend {
    #[default]
    Auto,
    Ahk,
    Hook,
}

impl FromStr for WindowsBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(WindowsBackend::Auto),
            "ahk" => Ok(WindowsBackend::Ahk),
            "hook" => Ok(WindowsBackend::Hook),
            _ => Err(()),
        }
    }
}

/// Map a host path into the guest's `Z:` drive view.
pub fn to_windows_path(path: &Path) -> String {
    format!("Z:{}", path.display().to_string().replace('/', "\\"))
}

#[derive(Debug, Clone)]
pub struct WindowsStartOptions {
    pub backend: WindowsBackend,
    pub motion_sample_ms: u64,
    pub debug_keys: Vec<String>,
    pub debug_sample_ms: Option<u64>,
}

impl Default for WindowsStartOptions {
    fn default() -> Self {
        Self {
            backend: WindowsBackend::Auto,
            motion_sample_ms: 10,
            debug_keys: Vec::new(),
            debug_sample_ms: Some(200),
        }
    }
}

/// Tool paths, overridable for tests.
#[derive(Debug, Clone)]
pub struct WindowsLauncher {
    pub hook_runtime: PathBuf,
    pub hook_script: PathBuf,
    pub ahk_runtime: PathBuf,
    pub ahk_script: PathBuf,
}

impl Default for WindowsLauncher {
    fn default() -> Self {
        Self {
            hook_runtime: PathBuf::from("winpy"),
            hook_script: PathBuf::from(DEFAULT_HOOK_SCRIPT),
            ahk_runtime: PathBuf::from("ahk"),
            ahk_script: PathBuf::from(DEFAULT_AHK_SCRIPT),
        }
    }
}

#[derive(Debug)]
pub struct WindowsStart {
    pub child: Child,
    pub backend: &'static str,
    pub warnings: Vec<String>,
}

impl WindowsLauncher {
    pub fn hook_args(&self, log_path: &Path, session_id: &str) -> Vec<String> {
        let mut args = vec![
            self.hook_script.display().to_string(),
            "--out".to_string(),
            log_path.display().to_string(),
            "--duration".to_string(),
            "0".to_string(),
            "--source".to_string(),
            "windows".to_string(),
            "--layer".to_string(),
            "windows".to_string(),
            "--origin".to_string(),
            "unknown".to_string(),
            "--tool".to_string(),
            "win_hook".to_string(),
        ];
        if !session_id.is_empty() {
            args.push("--session-id".to_string());
            args.push(session_id.to_string());
        }
        args
    }

    pub fn ahk_args(&self, log_path: &Path, opts: &WindowsStartOptions, session_id: &str) -> Vec<String> {
        let mut args = vec![
            self.ahk_script.display().to_string(),
            to_windows_path(log_path),
            opts.motion_sample_ms.to_string(),
            session_id.to_string(),
        ];
        if !opts.debug_keys.is_empty() {
            args.push(opts.debug_keys.join(","));
            if let Some(sample) = opts.debug_sample_ms {
                args.push(sample.to_string());
            }
        }
        args
    }

    /// Start the configured backend for `session_dir`.
    pub async fn start(
        &self,
        session_dir: &Path,
        session_id: &str,
        opts: &WindowsStartOptions,
    ) -> Result<WindowsStart, TraceError> {
        let log_path = TraceSource::Windows.log_path(session_dir);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut warnings = Vec::new();

        if matches!(opts.backend, WindowsBackend::Auto | WindowsBackend::Hook) {
            match self.try_hook(&log_path, session_id).await {
                Some(child) => {
                    if !opts.debug_keys.is_empty() {
                        warnings.push("windows trace hook backend ignores debug_keys".to_string());
                    }
                    return Ok(WindowsStart { child, backend: "hook", warnings });
                }
                None if opts.backend == WindowsBackend::Hook => {
                    return Err(TraceError::BackendFailed);
                }
                None => {}
            }
        }

        let child = Command::new(&self.ahk_runtime)
            .args(self.ahk_args(&log_path, opts, session_id))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(WindowsStart { child, backend: "ahk", warnings })
    }

    /// Spawn the hook and probe that it survived startup.
    async fn try_hook(&self, log_path: &Path, session_id: &str) -> Option<Child> {
        if which(&self.hook_runtime).is_none() || !self.hook_script.exists() {
            return None;
        }
        let mut child = Command::new(&self.hook_runtime)
            .args(self.hook_args(log_path, session_id))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;
        tokio::time::sleep(HOOK_PROBE).await;
        match child.try_wait() {
            Ok(None) => Some(child),
            _ => {
                tracing::warn!("windows hook exited during startup probe");
                None
            }
        }
    }
}

/// Resolve a binary against PATH; absolute/relative paths check directly.
fn which(bin: &Path) -> Option<PathBuf> {
    if bin.components().count() > 1 {
        return bin.exists().then(|| bin.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
#[path = "windows_tests.rs"]
mod tests;
