// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input endpoints: the event tail query, agent click, viewer-side client
//! events, and the lifecycle triples of the four trace sources.

use super::{epoch_ms_now, resolve_or_ensure, resolve_target};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ClickModel, EventsQuery, InputTraceStartModel, InputTraceStopModel,
    InputTraceWindowsStartModel, InputTraceX11CoreStartModel, SessionSelector,
};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use wb_core::time_fmt::utc_iso_now;
use wb_engine::safe_command;
use wb_storage::logs::{append_input_event, append_lifecycle_event, read_events_tail, EventFilter};
use wb_storage::{SessionStore, TraceSource};
use wb_trace::windows::{WindowsBackend, WindowsLauncher, WindowsStartOptions};

const X11_HELPER: &str = "/automation/x11.sh";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/input/events", get(events))
        .route("/input/mouse/click", post(mouse_click))
        .route("/input/client/event", post(client_event))
        .route("/input/trace/status", get(canonical_status))
        .route("/input/trace/start", post(canonical_start))
        .route("/input/trace/stop", post(canonical_stop))
        .route("/input/trace/x11core/status", get(x11_core_status))
        .route("/input/trace/x11core/start", post(x11_core_start))
        .route("/input/trace/x11core/stop", post(x11_core_stop))
        .route("/input/trace/client/status", get(client_status))
        .route("/input/trace/client/start", post(client_start))
        .route("/input/trace/client/stop", post(client_stop))
        .route("/input/trace/windows/status", get(windows_status))
        .route("/input/trace/windows/start", post(windows_start))
        .route("/input/trace/windows/stop", post(windows_stop))
        .route("/input/trace/network/status", get(network_status))
        .route("/input/trace/network/start", post(network_start))
        .route("/input/trace/network/stop", post(network_stop))
}

/// Recent input trace events from the selected layer's log.
async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Value>> {
    if query.limit < 1 {
        return Err(ApiError::BadRequest("limit must be >= 1".to_string()));
    }
    let Some(target) = resolve_target(&state, &query.selector())? else {
        return Ok(Json(json!({ "events": [] })));
    };
    let source = match query.source.as_deref() {
        Some(value) => TraceSource::from_query(value).unwrap_or(TraceSource::Canonical),
        None => TraceSource::Canonical,
    };
    let path = source.log_path(&target);
    let filter = EventFilter { since_epoch_ms: query.since_epoch_ms, origin: query.origin.clone() };
    let events = read_events_tail(&path, query.limit, &filter)?;
    Ok(Json(json!({ "events": events, "log_path": path })))
}

/// Agent-driven click: policy-gated, logged as a request/complete pair
/// correlated by a fresh trace id, mirrored into the windows layer.
async fn mouse_click(
    State(state): State<AppState>,
    Json(data): Json<ClickModel>,
) -> ApiResult<Json<Value>> {
    if !state.broker.check_access() {
        return Err(ApiError::PolicyDenied);
    }
    let session_dir = state.store.ensure_session(&state.config.manifest_defaults())?;
    let trace_id = uuid::Uuid::new_v4().simple().to_string();

    log_input(&session_dir, TraceSource::Canonical, json!({
        "event": "agent_click",
        "phase": "request",
        "origin": "agent",
        "source": "api",
        "tool": "api:/input/mouse/click",
        "x": data.x,
        "y": data.y,
        "button": 1,
        "trace_id": trace_id,
        "via": "xdotool",
    }));

    let outcome = safe_command(
        &[X11_HELPER, "click-at", &data.x.to_string(), &data.y.to_string()],
        Duration::from_secs(5),
    )
    .await;
    let status = if outcome.ok { "clicked" } else { "failed" };

    log_input(&session_dir, TraceSource::Canonical, json!({
        "event": "agent_click",
        "phase": "complete",
        "origin": "agent",
        "source": "api",
        "tool": "api:/input/mouse/click",
        "x": data.x,
        "y": data.y,
        "button": 1,
        "trace_id": trace_id,
        "status": status,
    }));

    // Cross-layer consistency: the click also lands in the windows log.
    log_input(&session_dir, TraceSource::Windows, json!({
        "event": "mouse_down",
        "origin": "agent",
        "source": "windows",
        "x": data.x,
        "y": data.y,
        "button": 1,
        "trace_id": trace_id,
        "timestamp_epoch_ms": epoch_ms_now(),
    }));

    if !outcome.ok {
        return Err(ApiError::Internal(outcome.failure_detail()));
    }
    Ok(Json(json!({ "status": "clicked", "x": data.x, "y": data.y, "trace_id": trace_id })))
}

/// Viewer-side event: reports user activity (pre-empting any agent lease)
/// then appends to the client layer when enabled.
async fn client_event(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Json<Value> {
    state.broker.report_user_activity();

    let Some(session_dir) = state.store.current() else {
        return Json(json!({ "status": "ignored", "reason": "no_session" }));
    };
    if !TraceSource::client_enabled(&session_dir) {
        return Json(json!({ "status": "ignored", "reason": "client_trace_disabled" }));
    }

    let mut payload = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    if let Some(map) = payload.as_object_mut() {
        let defaults = [
            ("source", json!("novnc_client")),
            ("layer", json!("client")),
            ("event", json!("client_event")),
            ("origin", json!("user")),
            ("tool", json!("novnc-ui")),
            ("timestamp_epoch_ms", json!(epoch_ms_now())),
            ("timestamp_utc", json!(utc_iso_now())),
        ];
        for (key, value) in defaults {
            map.entry(key.to_string()).or_insert(value);
        }
    }
    log_input(&session_dir, TraceSource::Client, payload);
    Json(json!({ "status": "ok" }))
}

fn log_input(session_dir: &Path, source: TraceSource, event: Value) {
    if let Err(err) = append_input_event(session_dir, source, event) {
        tracing::warn!(error = %err, source = source.as_str(), "input event append failed");
    }
}

// --- trace lifecycle helpers ---

fn status_payload(target: Option<&Path>, source: TraceSource) -> Value {
    let Some(dir) = target else {
        return json!({ "running": false, "state": null, "session_dir": null });
    };
    let mut payload = json!({
        "session_dir": dir,
        "pid": source.pid(dir),
        "running": source.running(dir),
        "state": source.state(dir),
        "log_path": source.log_path(dir),
    });
    if let Some(backend) = source.backend(dir) {
        payload["backend"] = json!(backend);
    }
    payload
}

async fn trace_status(
    state: &AppState,
    selector: &SessionSelector,
    source: TraceSource,
) -> ApiResult<Json<Value>> {
    let target = resolve_target(state, selector)?;
    Ok(Json(status_payload(target.as_deref(), source)))
}

/// SIGTERM the tracer pid recorded in the sidecar.
fn terminate_tracer(dir: &Path, source: TraceSource) -> ApiResult<()> {
    let Some(pid) = source.pid(dir) else { return Ok(()) };
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|e| ApiError::Internal(format!("failed to stop {} trace: {e}", source.as_str())))
}

// --- canonical (XI2) ---

async fn canonical_status(
    State(state): State<AppState>,
    Query(selector): Query<SessionSelector>,
) -> ApiResult<Json<Value>> {
    trace_status(&state, &selector, TraceSource::Canonical).await
}

async fn canonical_start(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStartModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let session_dir = resolve_or_ensure(&state, &data.selector)?;
    let source = TraceSource::Canonical;

    let _guard = state.trace_lock.lock().await;
    if source.running(&session_dir) {
        return Ok(Json(json!({
            "status": "already_running",
            "session_dir": session_dir,
            "pid": source.pid(&session_dir),
        })));
    }

    let mut cmd = tokio::process::Command::new(&state.config.input_trace_bin);
    cmd.arg("canonical")
        .arg("start")
        .arg("--session-dir")
        .arg(&session_dir);
    if data.include_raw {
        cmd.arg("--include-raw");
    }
    if data.motion_sample_ms > 0 {
        cmd.arg("--motion-sample-ms").arg(data.motion_sample_ms.to_string());
    }
    let pid = spawn_tracked(&state, cmd)?;

    append_lifecycle_event(Some(&session_dir), "input_trace_started", "Input trace started", "api", None);
    Ok(Json(json!({
        "status": "started",
        "session_dir": session_dir,
        "pid": pid,
        "log_path": source.log_path(&session_dir),
    })))
}

async fn canonical_stop(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let Some(session_dir) = resolve_target(&state, &data.selector)? else {
        return Ok(Json(json!({ "status": "already_stopped" })));
    };
    let source = TraceSource::Canonical;
    let _guard = state.trace_lock.lock().await;
    if !source.running(&session_dir) {
        return Ok(Json(json!({ "status": "already_stopped", "session_dir": session_dir })));
    }
    terminate_tracer(&session_dir, source)?;
    append_lifecycle_event(Some(&session_dir), "input_trace_stopped", "Input trace stopped", "api", None);
    Ok(Json(json!({ "status": "stopped", "session_dir": session_dir })))
}

// --- x11_core ---

async fn x11_core_status(
    State(state): State<AppState>,
    Query(selector): Query<SessionSelector>,
) -> ApiResult<Json<Value>> {
    trace_status(&state, &selector, TraceSource::X11Core).await
}

async fn x11_core_start(
    State(state): State<AppState>,
    body: Option<Json<InputTraceX11CoreStartModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let session_dir = resolve_or_ensure(&state, &data.selector)?;
    let source = TraceSource::X11Core;

    let _guard = state.trace_lock.lock().await;
    if source.running(&session_dir) {
        return Ok(Json(json!({
            "status": "already_running",
            "session_dir": session_dir,
            "pid": source.pid(&session_dir),
        })));
    }

    let mut cmd = tokio::process::Command::new(&state.config.input_trace_bin);
    cmd.arg("x11core")
        .arg("start")
        .arg("--session-dir")
        .arg(&session_dir);
    if data.motion_sample_ms > 0 {
        cmd.arg("--motion-sample-ms").arg(data.motion_sample_ms.to_string());
    }
    let pid = spawn_tracked(&state, cmd)?;

    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_x11_core_started",
        "X11 core input trace started",
        "api",
        None,
    );
    Ok(Json(json!({
        "status": "started",
        "session_dir": session_dir,
        "pid": pid,
        "log_path": source.log_path(&session_dir),
    })))
}

async fn x11_core_stop(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let Some(session_dir) = resolve_target(&state, &data.selector)? else {
        return Ok(Json(json!({ "status": "already_stopped" })));
    };
    let source = TraceSource::X11Core;
    let _guard = state.trace_lock.lock().await;
    if !source.running(&session_dir) {
        return Ok(Json(json!({ "status": "already_stopped", "session_dir": session_dir })));
    }
    terminate_tracer(&session_dir, source)?;
    let _ = source.write_state(&session_dir, "stopped");
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_x11_core_stopped",
        "X11 core input trace stopped",
        "api",
        None,
    );
    Ok(Json(json!({ "status": "stopped", "session_dir": session_dir })))
}

// --- client ---

async fn client_status(
    State(state): State<AppState>,
    Query(selector): Query<SessionSelector>,
) -> ApiResult<Json<Value>> {
    let Some(dir) = resolve_target(&state, &selector)? else {
        return Ok(Json(json!({ "enabled": false, "session_dir": null })));
    };
    Ok(Json(json!({
        "session_dir": dir,
        "enabled": TraceSource::client_enabled(&dir),
        "log_path": TraceSource::Client.log_path(&dir),
    })))
}

async fn client_start(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let session_dir = resolve_or_ensure(&state, &data.selector)?;
    TraceSource::Client.write_state(&session_dir, "enabled")?;
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_client_enabled",
        "Client input trace enabled",
        "api",
        None,
    );
    Ok(Json(json!({
        "status": "enabled",
        "session_dir": session_dir,
        "log_path": TraceSource::Client.log_path(&session_dir),
    })))
}

async fn client_stop(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let Some(session_dir) = resolve_target(&state, &data.selector)? else {
        return Ok(Json(json!({ "status": "disabled" })));
    };
    TraceSource::Client.write_state(&session_dir, "disabled")?;
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_client_disabled",
        "Client input trace disabled",
        "api",
        None,
    );
    Ok(Json(json!({ "status": "disabled", "session_dir": session_dir })))
}

// --- windows ---

async fn windows_status(
    State(state): State<AppState>,
    Query(selector): Query<SessionSelector>,
) -> ApiResult<Json<Value>> {
    trace_status(&state, &selector, TraceSource::Windows).await
}

async fn windows_start(
    State(state): State<AppState>,
    body: Option<Json<InputTraceWindowsStartModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let session_dir = resolve_or_ensure(&state, &data.selector)?;
    let source = TraceSource::Windows;

    let backend_name = data
        .backend
        .clone()
        .unwrap_or_else(|| state.config.windows_backend.clone())
        .to_lowercase();
    let backend: WindowsBackend = backend_name
        .parse()
        .map_err(|_| ApiError::BadRequest("backend must be one of: auto, ahk, hook".to_string()))?;

    let _guard = state.trace_lock.lock().await;
    if source.running(&session_dir) {
        return Ok(Json(json!({
            "status": "already_running",
            "session_dir": session_dir,
            "pid": source.pid(&session_dir),
        })));
    }

    let session_id = SessionStore::session_id_from_dir(&session_dir).unwrap_or_default();
    let opts = WindowsStartOptions {
        backend,
        motion_sample_ms: data.motion_sample_ms.unwrap_or(10),
        debug_keys: data.debug_keys(),
        debug_sample_ms: data.debug_sample_ms.or(Some(200)),
    };
    let started = WindowsLauncher::default()
        .start(&session_dir, &session_id, &opts)
        .await?;

    let pid = started.child.id().map(|p| p as i32);
    if let Some(pid) = pid {
        source.write_pid(&session_dir, pid)?;
    }
    source.write_state(&session_dir, "running")?;
    source.write_backend(&session_dir, started.backend)?;
    state.registry.track(started.child);

    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_windows_started",
        &format!("Windows input trace started ({})", started.backend),
        "api",
        None,
    );
    let mut payload = json!({
        "status": "started",
        "session_dir": session_dir,
        "pid": pid,
        "log_path": source.log_path(&session_dir),
        "backend": started.backend,
    });
    if !started.warnings.is_empty() {
        payload["warnings"] = json!(started.warnings);
    }
    Ok(Json(payload))
}

async fn windows_stop(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let Some(session_dir) = resolve_target(&state, &data.selector)? else {
        return Ok(Json(json!({ "status": "already_stopped" })));
    };
    let source = TraceSource::Windows;
    let _guard = state.trace_lock.lock().await;
    if !source.running(&session_dir) {
        let _ = source.write_state(&session_dir, "stopped");
        return Ok(Json(json!({ "status": "already_stopped", "session_dir": session_dir })));
    }
    terminate_tracer(&session_dir, source)?;
    source.write_state(&session_dir, "stopped")?;
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_windows_stopped",
        "Windows input trace stopped",
        "api",
        None,
    );
    Ok(Json(json!({ "status": "stopped", "session_dir": session_dir })))
}

// --- network ---

async fn network_status(
    State(state): State<AppState>,
    Query(selector): Query<SessionSelector>,
) -> ApiResult<Json<Value>> {
    trace_status(&state, &selector, TraceSource::Network).await
}

async fn network_start(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let session_dir = resolve_or_ensure(&state, &data.selector)?;
    let source = TraceSource::Network;
    let _guard = state.trace_lock.lock().await;
    if !source.running(&session_dir) {
        return Ok(Json(json!({
            "status": "not_running",
            "session_dir": session_dir,
            "hint": "Enable WINEBOT_INPUT_TRACE_NETWORK=1 and restart the container.",
        })));
    }
    source.write_state(&session_dir, "enabled")?;
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_network_enabled",
        "Network input trace enabled",
        "api",
        None,
    );
    Ok(Json(json!({
        "status": "enabled",
        "session_dir": session_dir,
        "log_path": source.log_path(&session_dir),
    })))
}

async fn network_stop(
    State(state): State<AppState>,
    body: Option<Json<InputTraceStopModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let Some(session_dir) = resolve_target(&state, &data.selector)? else {
        return Ok(Json(json!({ "status": "disabled" })));
    };
    let source = TraceSource::Network;
    let _guard = state.trace_lock.lock().await;
    if !source.running(&session_dir) {
        return Ok(Json(json!({ "status": "not_running", "session_dir": session_dir })));
    }
    source.write_state(&session_dir, "disabled")?;
    append_lifecycle_event(
        Some(&session_dir),
        "input_trace_network_disabled",
        "Network input trace disabled",
        "api",
        None,
    );
    Ok(Json(json!({ "status": "disabled", "session_dir": session_dir })))
}

/// Spawn a tracer child with its stdio detached and keep the handle for
/// reaping. Returns the child pid.
fn spawn_tracked(state: &AppState, mut cmd: tokio::process::Command) -> ApiResult<Option<u32>> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ApiError::Internal(format!("failed to start tracer: {e}")))?;
    let pid = child.id();
    state.registry.track(child);
    Ok(pid)
}
