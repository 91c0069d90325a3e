// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health endpoints: a fast roll-up plus per-subsystem detail views.

use super::which;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use wb_core::versioning::BUILD_VERSION;
use wb_engine::{find_processes, safe_command};
use wb_storage::sidecar;

const X11_HELPER: &str = "/automation/x11.sh";
const REQUIRED_TOOLS: [&str; 7] = ["winedbg", "gdb", "ffmpeg", "xdotool", "wmctrl", "xdpyinfo", "Xvfb"];
const ALL_TOOLS: [&str; 10] =
    ["winedbg", "gdb", "ffmpeg", "xdotool", "wmctrl", "xdpyinfo", "Xvfb", "x11vnc", "websockify", "xinput"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/version", get(version))
        .route("/health", get(health))
        .route("/health/environment", get(environment))
        .route("/health/system", get(system))
        .route("/health/x11", get(x11))
        .route("/health/windows", get(windows))
        .route("/health/wine", get(wine))
        .route("/health/tools", get(tools))
        .route("/health/storage", get(storage))
        .route("/health/recording", get(recording))
}

async fn version() -> Json<Value> {
    Json(json!({ "version": BUILD_VERSION }))
}

fn check_binary(name: &str) -> Value {
    let path = which(name);
    json!({ "present": path.is_some(), "path": path })
}

pub(crate) fn statvfs_info(path: &Path) -> Value {
    match nix::sys::statvfs::statvfs(path) {
        Ok(stat) => {
            let frag = stat.fragment_size() as u64;
            json!({
                "path": path,
                "ok": true,
                "total_bytes": frag * stat.blocks() as u64,
                "free_bytes": frag * stat.blocks_free() as u64,
                "avail_bytes": frag * stat.blocks_available() as u64,
                "writable": nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok(),
            })
        }
        Err(_) => json!({ "path": path, "ok": false, "error": "not found" }),
    }
}

fn storage_paths(state: &AppState) -> Vec<std::path::PathBuf> {
    vec![
        state.config.wineprefix.clone(),
        state
            .config
            .session_root
            .parent()
            .unwrap_or(&state.config.session_root)
            .to_path_buf(),
        std::path::PathBuf::from("/tmp"),
    ]
}

/// High-level roll-up: X11, prefix, tools, storage.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let x11 = safe_command(&["xdpyinfo"], Duration::from_secs(5)).await;
    let prefix = &state.config.wineprefix;
    let prefix_ok = prefix.is_dir() && prefix.join("system.reg").exists();

    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .filter(|t| which(t).is_none())
        .copied()
        .collect();

    let storage: Vec<Value> = storage_paths(&state)
        .iter()
        .map(|p| statvfs_info(p))
        .collect();
    let storage_ok = storage
        .iter()
        .all(|s| s["ok"] == true && s["writable"] == true);

    let status = if x11.ok && prefix_ok && missing.is_empty() && storage_ok {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "x11": if x11.ok { "connected" } else { "unavailable" },
        "wineprefix": if prefix_ok { "ready" } else { "missing" },
        "tools_ok": missing.is_empty(),
        "missing_tools": missing,
        "storage_ok": storage_ok,
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Deep validation: is the X server reachable and can the guest driver
/// actually initialise?
async fn environment(State(state): State<AppState>) -> Json<Value> {
    let x11 = safe_command(&["xdpyinfo"], Duration::from_secs(5)).await;
    let wine_driver = safe_command(&["wine", "cmd", "/c", "echo Driver Check"], Duration::from_secs(5)).await;

    let wm_pids = find_processes("openbox", true);
    let xvfb_pids = find_processes("Xvfb", true);
    let explorer_pids = find_processes("explorer.exe", false);

    let driver_ok = wine_driver.ok;
    let nodrv_detected = wine_driver
        .stderr
        .as_deref()
        .is_some_and(|s| s.contains("nodrv_CreateWindow"));

    let status = if !x11.ok || !driver_ok || xvfb_pids.is_empty() {
        "error"
    } else if wm_pids.is_empty() || explorer_pids.is_empty() {
        "degraded"
    } else {
        "ok"
    };

    Json(json!({
        "status": status,
        "x11": {
            "ok": x11.ok,
            "display": state.config.display,
            "xvfb_running": !xvfb_pids.is_empty(),
            "wm_running": !wm_pids.is_empty(),
        },
        "wine": {
            "driver_ok": driver_ok,
            "nodrv_detected": nodrv_detected,
            "explorer_running": !explorer_pids.is_empty(),
            "stderr": if driver_ok { Value::Null } else { json!(wine_driver.stderr) },
        },
    }))
}

async fn system(State(state): State<AppState>) -> Json<Value> {
    let mut info = json!({
        "hostname": hostname(),
        "pid": std::process::id(),
        "uptime_seconds": state.uptime_seconds(),
        "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    });
    if let Some(loadavg) = loadavg() {
        info["loadavg"] = loadavg;
    }
    if let Some(mem) = meminfo_summary() {
        info["memory"] = mem;
    }
    Json(info)
}

async fn x11(State(state): State<AppState>) -> Json<Value> {
    let x11 = safe_command(&["xdpyinfo"], Duration::from_secs(5)).await;
    let wm_pids = find_processes("openbox", true);
    let active = safe_command(&[X11_HELPER, "active-window"], Duration::from_secs(5)).await;
    Json(json!({
        "display": state.config.display,
        "screen": state.config.resolution,
        "connected": x11.ok,
        "xdpyinfo_error": if x11.ok { Value::Null } else { json!(x11.failure_detail()) },
        "window_manager": { "name": "openbox", "running": !wm_pids.is_empty() },
        "active_window": if active.ok { json!(active.stdout_trimmed()) } else { Value::Null },
        "active_window_error": if active.ok { Value::Null } else { json!(active.failure_detail()) },
    }))
}

async fn windows() -> Json<Value> {
    let listing = safe_command(&[X11_HELPER, "list-windows"], Duration::from_secs(5)).await;
    let active = safe_command(&[X11_HELPER, "active-window"], Duration::from_secs(5)).await;
    let windows = parse_window_listing(listing.stdout.as_deref().unwrap_or(""));
    Json(json!({
        "count": windows.len(),
        "windows": windows,
        "active_window": if active.ok { json!(active.stdout_trimmed()) } else { Value::Null },
        "error": if listing.ok { Value::Null } else { json!(listing.failure_detail()) },
    }))
}

pub(crate) fn parse_window_listing(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(2, ' ');
            match (parts.next(), parts.next()) {
                (Some(id), Some(title)) if !id.is_empty() => {
                    Some(json!({ "id": id, "title": title }))
                }
                _ => None,
            }
        })
        .collect()
}

async fn wine(State(state): State<AppState>) -> Json<Value> {
    let prefix = &state.config.wineprefix;
    let version = safe_command(&["wine", "--version"], Duration::from_secs(5)).await;
    let owner_uid = std::fs::metadata(prefix)
        .map(|m| std::os::unix::fs::MetadataExt::uid(&m))
        .ok();
    Json(json!({
        "wineprefix": prefix,
        "prefix_exists": prefix.is_dir(),
        "system_reg_exists": prefix.join("system.reg").exists(),
        "prefix_owner_uid": owner_uid,
        "current_uid": nix::unistd::getuid().as_raw(),
        "wine_version": if version.ok { json!(version.stdout_trimmed()) } else { Value::Null },
        "wine_version_error": if version.ok { Value::Null } else { json!(version.failure_detail()) },
        "winearch": std::env::var("WINEARCH").ok(),
    }))
}

async fn tools() -> Json<Value> {
    let details: serde_json::Map<String, Value> = ALL_TOOLS
        .iter()
        .map(|name| (name.to_string(), check_binary(name)))
        .collect();
    let missing: Vec<&str> = ALL_TOOLS
        .iter()
        .filter(|name| details[**name]["present"] == false)
        .copied()
        .collect();
    Json(json!({ "ok": missing.is_empty(), "missing": missing, "tools": details }))
}

async fn storage(State(state): State<AppState>) -> Json<Value> {
    let details: Vec<Value> = storage_paths(&state).iter().map(|p| statvfs_info(p)).collect();
    let ok = details.iter().all(|d| d["ok"] == true && d["writable"] == true);
    Json(json!({ "ok": ok, "paths": details }))
}

async fn recording(State(state): State<AppState>) -> Json<Value> {
    let session_dir = state.store.current();
    let recorder_pids = find_processes("winebot-recorder start", false);
    let status = state.recorder.status();
    Json(json!({
        "enabled": state.config.record_enabled,
        "session_dir": session_dir,
        "session_dir_exists": session_dir.as_deref().map(Path::is_dir).unwrap_or(false),
        "recorder_running": session_dir.as_deref().map(sidecar::recorder_running).unwrap_or(false)
            || !recorder_pids.is_empty(),
        "recorder_pids": recorder_pids,
        "state": status.state,
    }))
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn loadavg() -> Option<Value> {
    let content = std::fs::read_to_string("/proc/loadavg").ok()?;
    let values: Vec<f64> = content
        .split_whitespace()
        .take(3)
        .filter_map(|v| v.parse().ok())
        .collect();
    (values.len() == 3).then(|| json!(values))
}

fn meminfo_summary() -> Option<Value> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    let mut total_kb = None;
    let mut available_kb = None;
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MemTotal:") => total_kb = parts.next().and_then(|v| v.parse::<u64>().ok()),
            Some("MemAvailable:") => available_kb = parts.next().and_then(|v| v.parse::<u64>().ok()),
            _ => {}
        }
    }
    Some(json!({ "mem_total_kb": total_kb, "mem_available_kb": available_kb }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_listing_splits_id_and_title() {
        let windows = parse_window_listing("0x1200003 Untitled - Notepad\n0x1400001 Wine desktop\nbroken\n");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0]["id"], "0x1200003");
        assert_eq!(windows[0]["title"], "Untitled - Notepad");
    }

    #[test]
    fn statvfs_reports_missing_paths() {
        let info = statvfs_info(Path::new("/no/such/path"));
        assert_eq!(info["ok"], false);
    }

    #[test]
    fn statvfs_reports_tmp_writable() {
        let info = statvfs_info(Path::new("/tmp"));
        assert_eq!(info["ok"], true);
        assert!(info["total_bytes"].as_u64().unwrap() > 0);
    }

    #[test]
    fn meminfo_parses_on_linux() {
        let mem = meminfo_summary().unwrap();
        assert!(mem["mem_total_kb"].as_u64().unwrap() > 0);
    }
}
