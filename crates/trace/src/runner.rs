// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracer runner processes for the canonical (XI2) and x11_core layers.
//!
//! Each runner owns its pid/state sidecars, streams `xinput` child output
//! through the matching parser, and appends events to the session log
//! under the shared file lock. SIGTERM tears the children down and flips
//! the state sidecar to `stopped`.

use crate::core_stream::{find_master_devices, parse_device_id, CoreStreamParser, ResolvedDevice};
use crate::error::TraceError;
use crate::xi2::Xi2Parser;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use wb_core::{DeviceInfo, TraceEvent};
use wb_storage::logs::append_trace_event;
use wb_storage::{SessionStore, TraceSource};

const CANDIDATE_PROBE: Duration = Duration::from_millis(200);

fn stderr_log(session_dir: &Path, source: TraceSource, message: &str) {
    let path = source.stderr_path(session_dir);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut f) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(f, "{message}");
    }
}

async fn xinput(args: &[&str]) -> Option<String> {
    let output = Command::new("xinput")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        None
    }
}

/// Combined help text, whatever the exit status; some xinput builds exit
/// nonzero for `--help` and print the usage to stderr.
async fn xinput_help() -> String {
    match Command::new("xinput").arg("--help").stdin(Stdio::null()).output().await {
        Ok(output) => format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
        Err(_) => String::new(),
    }
}

fn append_or_warn(log_path: &Path, event: &TraceEvent) {
    match serde_json::to_value(event) {
        Ok(value) => {
            if let Err(err) = append_trace_event(log_path, value) {
                tracing::warn!(error = %err, "trace append failed");
            }
        }
        Err(err) => tracing::warn!(error = %err, "trace event serialise failed"),
    }
}

/// `winebot-input-trace canonical start`.
pub async fn run_canonical(
    session_dir: &Path,
    include_raw: bool,
    motion_sample_ms: u64,
) -> Result<(), TraceError> {
    let source = TraceSource::Canonical;
    std::fs::create_dir_all(session_dir.join("logs"))?;
    let log_path = source.log_path(session_dir);
    let session_id = SessionStore::session_id_from_dir(session_dir);

    let help = xinput_help().await;
    if !help.contains("test-xi2") {
        stderr_log(session_dir, source, "xinput test-xi2 not available; canonical trace aborted");
        return Err(TraceError::BackendUnavailable("xinput test-xi2".to_string()));
    }

    let stderr_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(source.stderr_path(session_dir))?;
    let mut child = Command::new("xinput")
        .args(["test-xi2", "--root"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::from(stderr_file))
        .spawn()?;
    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill().await;
        return Err(TraceError::BackendUnavailable("xinput stdout".to_string()));
    };

    source.write_pid(session_dir, std::process::id() as i32)?;
    source.write_state(session_dir, "running")?;

    let mut parser = Xi2Parser::new(session_id, include_raw, motion_sample_ms);
    let mut lines = BufReader::new(stdout).lines();
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(event) = parser.push_line(&line) {
                        append_or_warn(&log_path, &event);
                    }
                }
                _ => break,
            },
            _ = term.recv() => break,
            _ = int.recv() => break,
        }
    }
    if let Some(event) = parser.finish() {
        append_or_warn(&log_path, &event);
    }
    let _ = child.kill().await;
    source.write_state(session_dir, "stopped")?;
    if let Some(pid_path) = source.pid_path(session_dir) {
        let _ = std::fs::remove_file(pid_path);
    }
    Ok(())
}

/// Resolve the master pointer/keyboard, preferring explicit id lookups and
/// filling the rest from the short listing.
async fn resolve_devices() -> (ResolvedDevice, ResolvedDevice) {
    let listing = xinput(&["list", "--short"]).await.unwrap_or_default();
    let (mut pointer, mut keyboard) = find_master_devices(&listing);
    for (device, name) in [
        (&mut pointer, "Virtual core pointer"),
        (&mut keyboard, "Virtual core keyboard"),
    ] {
        if device.id.is_none() {
            if let Some(stdout) = xinput(&["list", "--id-only", name]).await {
                device.id = parse_device_id(&stdout);
            }
        }
    }
    (pointer, keyboard)
}

/// Try each candidate spec until one produces a child that survives the
/// startup probe.
async fn start_device(
    session_dir: &Path,
    label: &str,
    device: &ResolvedDevice,
) -> Option<(Child, DeviceInfo)> {
    for spec in device.candidates() {
        stderr_log(
            session_dir,
            TraceSource::X11Core,
            &format!("xinput test candidate '{spec}' for {label}"),
        );
        let Ok(mut child) = Command::new("xinput")
            .args(["test", &spec])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };
        tokio::time::sleep(CANDIDATE_PROBE).await;
        match child.try_wait() {
            Ok(None) => {
                let info = DeviceInfo {
                    id: device.id,
                    name: Some(device.name.clone()),
                    spec: Some(spec),
                };
                return Some((child, info));
            }
            _ => {
                stderr_log(
                    session_dir,
                    TraceSource::X11Core,
                    &format!("xinput test '{spec}' exited early; trying next candidate"),
                );
            }
        }
    }
    None
}

/// `winebot-input-trace x11core start`.
pub async fn run_x11_core(session_dir: &Path, motion_sample_ms: u64) -> Result<(), TraceError> {
    let source = TraceSource::X11Core;
    std::fs::create_dir_all(session_dir.join("logs"))?;
    let log_path = source.log_path(session_dir);
    let session_id = SessionStore::session_id_from_dir(session_dir);

    let (pointer, keyboard) = resolve_devices().await;
    if pointer.id.is_none() && keyboard.id.is_none() {
        stderr_log(session_dir, source, "failed to locate master pointer/keyboard via xinput list");
        return Err(TraceError::NoDevices);
    }
    stderr_log(
        session_dir,
        source,
        &format!(
            "resolved devices: pointer id={:?} name={} fallback={:?}; keyboard id={:?} name={} fallback={:?}",
            pointer.id, pointer.name, pointer.fallback_id, keyboard.id, keyboard.name, keyboard.fallback_id
        ),
    );

    let mut children = Vec::new();
    let (tx, mut rx) = mpsc::channel::<TraceEvent>(256);
    for (label, device) in [("pointer", &pointer), ("keyboard", &keyboard)] {
        let Some((mut child, info)) = start_device(session_dir, label, device).await else {
            continue;
        };
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill().await;
            continue;
        };
        let mut parser = CoreStreamParser::new(session_id.clone(), info, motion_sample_ms);
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parser.push_line(&line) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });
        children.push(child);
    }
    drop(tx);

    if children.is_empty() {
        stderr_log(session_dir, source, "failed to start xinput test for any device");
        return Err(TraceError::NoDevices);
    }

    source.write_pid(session_dir, std::process::id() as i32)?;
    source.write_state(session_dir, "running")?;

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => append_or_warn(&log_path, &event),
                None => break,
            },
            _ = term.recv() => break,
            _ = int.recv() => break,
        }
    }

    for mut child in children {
        let _ = child.kill().await;
    }
    source.write_state(session_dir, "stopped")?;
    if let Some(pid_path) = source.pid_path(session_dir) {
        let _ = std::fs::remove_file(pid_path);
    }
    Ok(())
}

/// Signal a running tracer by its pid sidecar.
pub fn stop_tracer(session_dir: &Path, source: TraceSource) -> bool {
    let Some(pid) = source.pid(session_dir) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), nix::sys::signal::Signal::SIGTERM)
        .is_ok()
}

/// Status payload shared by the tracer CLI and the HTTP surface.
pub fn status(session_dir: &Path, source: TraceSource) -> serde_json::Value {
    serde_json::json!({
        "session_dir": session_dir,
        "pid": source.pid(session_dir),
        "running": source.running(session_dir),
        "state": source.state(session_dir),
        "log_path": source.log_path(session_dir),
    })
}

/// The runner pid files point at ourselves while running; used by tests
/// and the CLI to decide between start and already-running.
pub fn running(session_dir: &Path, source: TraceSource) -> bool {
    source.running(session_dir)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
