// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle supervision: suspend/resume of sessions, graceful component
//! shutdown, and scheduled self-termination of the container.
//!
//! Component stops are best-effort TERM signals issued in a fixed order;
//! nothing waits for a component to fully exit. The final signal to PID 1
//! is scheduled twice — from a detached thread and from a `sh -c` child —
//! so it still fires if the daemon dies first.

use crate::broker::Broker;
use crate::command::{safe_command, CommandOutcome};
use crate::error::EngineError;
use crate::recorder::RecorderSupervisor;
use crate::registry::{find_processes, ProcessRegistry};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use wb_core::Clock;
use wb_storage::logs::append_lifecycle_event;
use wb_storage::sidecar;
use wb_storage::{ManifestDefaults, SessionStore};

/// TERM order for the UI/VNC component sweep.
pub const COMPONENT_SHUTDOWN_ORDER: [(&str, &str, bool); 8] = [
    ("novnc_proxy", "novnc_proxy", false),
    ("websockify", "websockify", false),
    ("x11vnc", "x11vnc", true),
    ("winedbg", "winedbg", true),
    ("gdb", "gdb", true),
    ("openbox", "openbox", true),
    ("wine_explorer", "explorer.exe", false),
    ("xvfb", "Xvfb", true),
];

const WINEBOOT_TIMEOUT: Duration = Duration::from_secs(10);
const WINESERVER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SuspendOptions {
    pub shutdown_wine: bool,
    pub stop_recording: bool,
}

#[derive(Debug, Clone)]
pub struct ResumeOptions {
    pub restart_wine: bool,
    pub stop_recording: bool,
}

#[derive(Debug, Clone)]
pub struct ShutdownOptions {
    pub delay: f64,
    pub wine_shutdown: bool,
    pub power_off: bool,
}

pub struct LifecycleSupervisor {
    store: SessionStore,
    defaults: ManifestDefaults,
    wineprefix: PathBuf,
    interactive: bool,
    registry: Arc<ProcessRegistry>,
}

impl LifecycleSupervisor {
    pub fn new(
        store: SessionStore,
        defaults: ManifestDefaults,
        wineprefix: PathBuf,
        interactive: bool,
        registry: Arc<ProcessRegistry>,
    ) -> Self {
        Self { store, defaults, wineprefix, interactive, registry }
    }

    /// Suspend a session: optionally stop recording and shut Wine down,
    /// then mark the directory suspended.
    pub async fn suspend(
        &self,
        target: &Path,
        opts: &SuspendOptions,
        recorder: &RecorderSupervisor,
    ) -> Result<Value, EngineError> {
        let current = self.store.current();
        if opts.stop_recording
            && current.as_deref() == Some(target)
            && sidecar::recorder_running(target)
        {
            if let Err(err) = recorder.stop().await {
                tracing::warn!(error = %err, "recorder stop during suspend failed");
            }
        }
        if opts.shutdown_wine {
            self.graceful_wine_shutdown(Some(target)).await;
        }
        SessionStore::write_state(target, "suspended")?;
        append_lifecycle_event(
            Some(target),
            "session_suspended",
            "Session suspended via API",
            "api",
            None,
        );
        Ok(json!({
            "status": "suspended",
            "session_dir": target,
            "session_id": SessionStore::session_id_from_dir(target),
        }))
    }

    /// Resume a session directory: re-ensure its layout, swap the pointer,
    /// relink the Wine user dir, and rebind the broker.
    pub async fn resume<C: Clock>(
        &self,
        target: &Path,
        opts: &ResumeOptions,
        recorder: &RecorderSupervisor,
        broker: &Broker<C>,
    ) -> Result<Value, EngineError> {
        if !target.join("session.json").exists() {
            let session_id = SessionStore::session_id_from_dir(target).unwrap_or_default();
            SessionStore::write_manifest(target, &session_id, &self.defaults)?;
        }
        SessionStore::ensure_subdirs(target)?;
        let user_dir = target.join("user");
        std::fs::create_dir_all(&user_dir)?;
        SessionStore::ensure_user_profile(&user_dir)?;

        let previous = self.store.current();
        if let Some(prev) = previous.as_deref().filter(|p| *p != target) {
            if opts.stop_recording && sidecar::recorder_running(prev) {
                if let Err(err) = recorder.stop().await {
                    tracing::warn!(error = %err, "recorder stop during resume failed");
                }
            }
            let _ = SessionStore::write_state(prev, "suspended");
            append_lifecycle_event(
                Some(prev),
                "session_suspended",
                "Session suspended via API",
                "api",
                None,
            );
            if opts.restart_wine {
                self.graceful_wine_shutdown(Some(prev)).await;
            }
        }

        self.store.write_pointer(target)?;
        if let Err(err) = SessionStore::link_user_dir(&user_dir, &self.wineprefix) {
            tracing::warn!(error = %err, "user dir relink failed");
        }
        SessionStore::write_state(target, "active")?;
        append_lifecycle_event(Some(target), "session_resumed", "Session resumed via API", "api", None);

        if opts.restart_wine {
            self.spawn_detached(&["wine", "explorer"]);
        }

        let session_id = SessionStore::session_id_from_dir(target).unwrap_or_default();
        broker.update_session(&session_id, self.interactive);

        let status = if previous.as_deref() == Some(target) { "already_active" } else { "resumed" };
        Ok(json!({
            "status": status,
            "session_dir": target,
            "session_id": session_id,
            "previous_session": previous,
        }))
    }

    /// `wineboot --shutdown` then `wineserver -k`, with telemetry.
    pub async fn graceful_wine_shutdown(&self, session_dir: Option<&Path>) -> Value {
        append_lifecycle_event(session_dir, "wine_shutdown_requested", "Requesting Wine shutdown", "api", None);
        let wineboot = safe_command(&["wineboot", "--shutdown"], WINEBOOT_TIMEOUT).await;
        self.report_step(session_dir, "wine_shutdown", "Wine shutdown", &wineboot);
        let wineserver = safe_command(&["wineserver", "-k"], WINESERVER_TIMEOUT).await;
        self.report_step(session_dir, "wineserver_kill", "wineserver -k", &wineserver);
        json!({ "wineboot": wineboot, "wineserver": wineserver })
    }

    /// TERM the UI/VNC components in the fixed order. Best-effort: the
    /// signal is sent and we move on.
    pub fn component_shutdown(&self, session_dir: Option<&Path>) -> Value {
        append_lifecycle_event(
            session_dir,
            "component_shutdown_requested",
            "Stopping UI/VNC components",
            "api",
            None,
        );
        let mut results = serde_json::Map::new();
        for (name, pattern, exact) in COMPONENT_SHUTDOWN_ORDER {
            let pids = find_processes(pattern, exact);
            let mut ok = !pids.is_empty();
            for pid in &pids {
                if kill(Pid::from_raw(*pid), Signal::SIGTERM).is_err() {
                    ok = false;
                }
            }
            let result = json!({ "ok": ok, "pids": pids });
            if ok {
                append_lifecycle_event(session_dir, &format!("{name}_stopped"), &format!("{name} stopped"), "api", None);
            } else {
                append_lifecycle_event(
                    session_dir,
                    &format!("{name}_stop_failed"),
                    &format!("{name} stop failed"),
                    "api",
                    Some(result.clone()),
                );
            }
            results.insert(name.to_string(), result);
        }
        Value::Object(results)
    }

    /// Full container shutdown orchestration.
    pub async fn shutdown(
        &self,
        opts: &ShutdownOptions,
        recorder: &RecorderSupervisor,
    ) -> Value {
        let session_dir = self.store.current();
        let session = session_dir.as_deref();
        append_lifecycle_event(session, "shutdown_requested", "Shutdown requested via API", "api", None);

        if opts.power_off {
            append_lifecycle_event(session, "power_off", "Immediate shutdown requested", "api", None);
            let keepalive_pids = find_processes("tail -f /dev/null", false);
            let mut ok = !keepalive_pids.is_empty();
            for pid in &keepalive_pids {
                if kill(Pid::from_raw(*pid), Signal::SIGKILL).is_err() {
                    ok = false;
                }
            }
            append_lifecycle_event(
                session,
                "power_off_keepalive_kill",
                "Attempted to stop keepalive process",
                "api",
                Some(json!({ "ok": ok, "pids": keepalive_pids })),
            );
            self.schedule_pid1_signal(session_dir.clone(), opts.delay.max(0.0), Signal::SIGKILL);
            return json!({ "status": "powering_off", "delay_seconds": opts.delay });
        }

        let wine_result = if opts.wine_shutdown {
            Some(self.graceful_wine_shutdown(session).await)
        } else {
            None
        };
        if session.is_some_and(sidecar::recorder_running) {
            if let Err(err) = recorder.stop().await {
                tracing::warn!(error = %err, "recorder stop during shutdown failed");
            }
        }
        let components = self.component_shutdown(session);
        self.schedule_pid1_signal(session_dir, opts.delay, Signal::SIGTERM);

        let mut response = json!({
            "status": "shutting_down",
            "delay_seconds": opts.delay,
            "component_shutdown": components,
        });
        if let Some(wine) = wine_result {
            response["wine_shutdown"] = wine;
        }
        response
    }

    /// Schedule the final signal to PID 1 after `delay` seconds.
    pub fn schedule_pid1_signal(&self, session_dir: Option<PathBuf>, delay: f64, sig: Signal) {
        let delay = delay.max(0.0);
        append_lifecycle_event(
            session_dir.as_deref(),
            "shutdown_scheduled",
            "Shutdown scheduled",
            "api",
            Some(json!({ "signal": sig as i32, "delay": delay })),
        );

        let dir = session_dir.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f64(delay));
            append_lifecycle_event(
                dir.as_deref(),
                "shutdown_signal",
                &format!("Sending signal {} to pid 1", sig as i32),
                "api",
                Some(json!({ "signal": sig as i32, "delay": delay })),
            );
            if let Err(err) = kill(Pid::from_raw(1), sig) {
                append_lifecycle_event(
                    dir.as_deref(),
                    "shutdown_signal_failed",
                    "Failed to signal pid 1",
                    "api",
                    Some(json!({ "signal": sig as i32, "error": err.to_string() })),
                );
                std::process::exit(0);
            }
        });

        // Shell-scheduled duplicate survives a crash of this process.
        self.spawn_detached(&[
            "/bin/sh",
            "-c",
            &format!("sleep {delay}; kill -{} 1", sig as i32),
        ]);
    }

    fn spawn_detached(&self, argv: &[&str]) {
        let Some((program, args)) = argv.split_first() else { return };
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        match cmd.spawn() {
            Ok(child) => self.registry.track(child),
            Err(err) => tracing::warn!(?argv, error = %err, "detached spawn failed"),
        }
    }

    fn report_step(&self, session_dir: Option<&Path>, step: &str, label: &str, outcome: &CommandOutcome) {
        if outcome.ok {
            append_lifecycle_event(
                session_dir,
                &format!("{step}_complete"),
                &format!("{label} complete"),
                "api",
                None,
            );
        } else {
            append_lifecycle_event(
                session_dir,
                &format!("{step}_failed"),
                &format!("{label} failed"),
                "api",
                serde_json::to_value(outcome).ok(),
            );
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
