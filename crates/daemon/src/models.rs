// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request bodies. Every mutating POST accepts an empty body; defaults
//! mirror the documented contract, so `Default` is implemented manually
//! where a flag defaults to true.

use serde::Deserialize;
use std::path::PathBuf;
use wb_core::UserIntent;

fn default_true() -> bool {
    true
}

/// The usual id/dir/root triple accepted by session-scoped endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSelector {
    pub session_id: Option<String>,
    pub session_dir: Option<PathBuf>,
    pub session_root: Option<PathBuf>,
}

impl SessionSelector {
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.session_dir.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct ClickModel {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Deserialize)]
pub struct GrantControlModel {
    pub lease_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct UserIntentModel {
    pub intent: UserIntent,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordingStartModel {
    pub session_label: Option<String>,
    pub session_root: Option<PathBuf>,
    pub display: Option<String>,
    pub resolution: Option<String>,
    pub fps: Option<u32>,
    #[serde(default)]
    pub new_session: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionSuspendModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
    #[serde(default = "default_true")]
    pub shutdown_wine: bool,
    #[serde(default = "default_true")]
    pub stop_recording: bool,
}

impl Default for SessionSuspendModel {
    fn default() -> Self {
        Self {
            selector: SessionSelector::default(),
            shutdown_wine: true,
            stop_recording: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionResumeModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
    #[serde(default = "default_true")]
    pub restart_wine: bool,
    #[serde(default = "default_true")]
    pub stop_recording: bool,
}

impl Default for SessionResumeModel {
    fn default() -> Self {
        Self {
            selector: SessionSelector::default(),
            restart_wine: true,
            stop_recording: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InputTraceStartModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
    #[serde(default)]
    pub include_raw: bool,
    #[serde(default)]
    pub motion_sample_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputTraceX11CoreStartModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
    #[serde(default)]
    pub motion_sample_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputTraceStopModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputTraceWindowsStartModel {
    #[serde(flatten)]
    pub selector: SessionSelector,
    pub motion_sample_ms: Option<u64>,
    pub debug_keys: Option<Vec<String>>,
    pub debug_keys_csv: Option<String>,
    pub debug_sample_ms: Option<u64>,
    pub backend: Option<String>,
}

impl InputTraceWindowsStartModel {
    /// Explicit list wins over the CSV convenience form.
    pub fn debug_keys(&self) -> Vec<String> {
        if let Some(keys) = &self.debug_keys {
            return keys.iter().filter(|k| !k.is_empty()).cloned().collect();
        }
        if let Some(csv) = &self.debug_keys_csv {
            return csv
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct AppRunModel {
    pub path: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub detach: bool,
}

#[derive(Debug, Deserialize)]
pub struct AhkModel {
    pub script: String,
    pub focus_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutoItModel {
    pub script: String,
    pub focus_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PythonScriptModel {
    pub script: String,
}

fn default_max_controls() -> u32 {
    200
}

#[derive(Debug, Deserialize)]
pub struct InspectWindowModel {
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
    pub handle: Option<String>,
    #[serde(default = "default_true")]
    pub include_controls: bool,
    #[serde(default = "default_max_controls")]
    pub max_controls: u32,
    #[serde(default)]
    pub list_only: bool,
    #[serde(default)]
    pub include_empty: bool,
}

#[derive(Debug, Deserialize)]
pub struct FocusModel {
    pub window_id: String,
}

fn default_limit() -> usize {
    200
}

// Flattening SessionSelector here would break query-string parsing of the
// numeric fields (serde_urlencoded buffers flattened content as strings),
// so the selector fields are spelled out.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub since_epoch_ms: Option<u64>,
    pub source: Option<String>,
    pub origin: Option<String>,
    pub session_id: Option<String>,
    pub session_dir: Option<PathBuf>,
    pub session_root: Option<PathBuf>,
}

impl EventsQuery {
    pub fn selector(&self) -> SessionSelector {
        SessionSelector {
            session_id: self.session_id.clone(),
            session_dir: self.session_dir.clone(),
            session_root: self.session_root.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LifecycleEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_delay() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
pub struct ShutdownQuery {
    #[serde(default = "default_delay")]
    pub delay: f64,
    #[serde(default = "default_true")]
    pub wine_shutdown: bool,
    #[serde(default)]
    pub power_off: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionsListQuery {
    pub root: Option<PathBuf>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotQuery {
    #[serde(default = "default_window_id")]
    pub window_id: String,
    #[serde(default)]
    pub delay: u32,
    pub label: Option<String>,
    pub tag: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub session_root: Option<PathBuf>,
}

fn default_window_id() -> String {
    "root".to_string()
}
