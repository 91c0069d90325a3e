// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state, wired once at startup and handed to every
//! handler by reference. No module-level singletons.

use crate::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use wb_engine::{Broker, LifecycleSupervisor, ProcessRegistry, RecorderSupervisor};
use wb_storage::{ManifestDefaults, PathPolicy, SessionStore};

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub api_token: Option<String>,
    pub session_root: PathBuf,
    pub pointer_path: PathBuf,
    pub record_enabled: bool,
    pub windows_backend: String,
    pub network_trace_enabled: bool,
    pub display: String,
    pub resolution: String,
    pub fps: u32,
    pub wineprefix: PathBuf,
    pub interactive: bool,
    pub recorder_bin: PathBuf,
    pub input_trace_bin: PathBuf,
}

impl DaemonConfig {
    /// Snapshot the environment once at startup.
    pub fn from_env() -> Self {
        Self {
            api_token: env::api_token(),
            session_root: env::session_root(),
            pointer_path: PathBuf::from(wb_storage::session::DEFAULT_POINTER_PATH),
            record_enabled: env::record_enabled(),
            windows_backend: env::windows_backend(),
            network_trace_enabled: env::network_trace_enabled(),
            display: env::display(),
            resolution: env::parse_resolution(&env::screen()),
            fps: 30,
            wineprefix: env::wineprefix(),
            interactive: env::interactive(),
            recorder_bin: env::sibling_binary("winebot-recorder"),
            input_trace_bin: env::sibling_binary("winebot-input-trace"),
        }
    }

    pub fn manifest_defaults(&self) -> ManifestDefaults {
        ManifestDefaults {
            display: self.display.clone(),
            resolution: self.resolution.clone(),
            fps: self.fps,
            git_sha: std::env::var("GIT_SHA").ok(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DaemonConfig>,
    pub broker: Arc<Broker>,
    pub registry: Arc<ProcessRegistry>,
    pub store: SessionStore,
    pub recorder: Arc<RecorderSupervisor>,
    pub lifecycle: Arc<LifecycleSupervisor>,
    /// Serialises recorder start/stop/pause/resume.
    pub recorder_lock: Arc<tokio::sync::Mutex<()>>,
    /// Serialises tracer start/stop across sources.
    pub trace_lock: Arc<tokio::sync::Mutex<()>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: DaemonConfig) -> Self {
        Self::with_policy(config, PathPolicy::default_allowed())
    }

    /// Tests inject a sandboxed path policy.
    pub fn with_policy(config: DaemonConfig, policy: PathPolicy) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ProcessRegistry::new());
        let store = SessionStore::new(
            config.session_root.clone(),
            config.pointer_path.clone(),
            policy,
        );
        let recorder = Arc::new(RecorderSupervisor::new(
            store.clone(),
            config.manifest_defaults(),
            config.recorder_bin.clone(),
            Arc::clone(&registry),
        ));
        let lifecycle = Arc::new(LifecycleSupervisor::new(
            store.clone(),
            config.manifest_defaults(),
            config.wineprefix.clone(),
            config.interactive,
            Arc::clone(&registry),
        ));
        let broker = Arc::new(Broker::new());
        broker.update_session("unknown", config.interactive);

        Self {
            config,
            broker,
            registry,
            store,
            recorder,
            lifecycle,
            recorder_lock: Arc::new(tokio::sync::Mutex::new(())),
            trace_lock: Arc::new(tokio::sync::Mutex::new(())),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
