// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle endpoints: component status, the lifecycle event tail,
//! graceful shutdown, workspace reset and window-manager control.

use crate::error::{ApiError, ApiResult};
use crate::models::{LifecycleEventsQuery, ShutdownQuery};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::time::Duration;
use wb_engine::{find_processes, safe_command, ShutdownOptions};
use wb_storage::logs::{lifecycle_log_path, read_events_tail, EventFilter};
use wb_storage::SessionStore;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lifecycle/status", get(status))
        .route("/lifecycle/events", get(events))
        .route("/lifecycle/shutdown", post(shutdown))
        .route("/lifecycle/reset_workspace", post(reset_workspace))
        .route("/openbox/reconfigure", post(openbox_reconfigure))
        .route("/openbox/restart", post(openbox_restart))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let session_dir = state.store.current();
    let session_id = session_dir.as_deref().and_then(SessionStore::session_id_from_dir);
    let recorder = state.recorder.status();
    Json(json!({
        "session_id": session_id,
        "session_dir": session_dir,
        "session_state": session_dir.as_deref().and_then(SessionStore::read_state),
        "components": {
            "xvfb": !find_processes("Xvfb", true).is_empty(),
            "openbox": !find_processes("openbox", true).is_empty(),
            "x11vnc": !find_processes("x11vnc", true).is_empty(),
            "websockify": !find_processes("websockify", false).is_empty(),
            "explorer": !find_processes("explorer.exe", false).is_empty(),
        },
        "recorder": recorder,
    }))
}

async fn events(
    State(state): State<AppState>,
    Query(query): Query<LifecycleEventsQuery>,
) -> ApiResult<Json<Value>> {
    if query.limit < 1 {
        return Err(ApiError::BadRequest("limit must be >= 1".to_string()));
    }
    let Some(session_dir) = state.store.current() else {
        return Ok(Json(json!({ "events": [] })));
    };
    let events = read_events_tail(
        &lifecycle_log_path(&session_dir),
        query.limit,
        &EventFilter::default(),
    )?;
    Ok(Json(json!({ "events": events })))
}

async fn shutdown(
    State(state): State<AppState>,
    Query(query): Query<ShutdownQuery>,
) -> Json<Value> {
    let opts = ShutdownOptions {
        delay: query.delay,
        wine_shutdown: query.wine_shutdown,
        power_off: query.power_off,
    };
    Json(state.lifecycle.shutdown(&opts, &state.recorder).await)
}

/// Bring the desktop back to a known state: restart explorer if it died
/// and pin its window geometry.
async fn reset_workspace(State(state): State<AppState>) -> Json<Value> {
    if find_processes("explorer.exe", false).is_empty() {
        let mut cmd = tokio::process::Command::new("wine");
        cmd.arg("explorer.exe")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        match cmd.spawn() {
            Ok(child) => {
                state.registry.track(child);
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            Err(err) => tracing::warn!(error = %err, "explorer restart failed"),
        }
    }

    let _ = safe_command(
        &["xdotool", "search", "--class", "explorer", "windowmove", "0", "0"],
        Duration::from_secs(5),
    )
    .await;
    Json(json!({ "status": "ok", "message": "Workspace reset requested" }))
}

async fn openbox_reconfigure() -> Json<Value> {
    safe_command(&["openbox", "--reconfigure"], Duration::from_secs(5)).await;
    Json(json!({ "status": "reconfigured" }))
}

async fn openbox_restart() -> Json<Value> {
    safe_command(&["openbox", "--restart"], Duration::from_secs(5)).await;
    Json(json!({ "status": "restarted" }))
}
