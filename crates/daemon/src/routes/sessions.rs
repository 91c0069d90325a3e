// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session listing, suspend and resume.

use super::resolve_target;
use crate::error::{ApiError, ApiResult};
use crate::models::{SessionResumeModel, SessionSuspendModel, SessionsListQuery};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use wb_engine::{ResumeOptions, SuspendOptions};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/suspend", post(suspend))
        .route("/sessions/resume", post(resume))
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsListQuery>,
) -> ApiResult<Json<Value>> {
    if query.limit < 1 {
        return Err(ApiError::BadRequest("limit must be >= 1".to_string()));
    }
    let (root, sessions) = state.store.list(query.root.as_deref(), query.limit)?;
    Ok(Json(json!({ "root": root, "sessions": sessions })))
}

async fn suspend(
    State(state): State<AppState>,
    body: Option<Json<SessionSuspendModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let target = resolve_target(&state, &data.selector)?
        .ok_or_else(|| ApiError::NotFound("No active session to suspend".to_string()))?;
    if !target.is_dir() {
        return Err(ApiError::NotFound("Session directory not found".to_string()));
    }
    let opts = SuspendOptions {
        shutdown_wine: data.shutdown_wine,
        stop_recording: data.stop_recording,
    };
    let result = state.lifecycle.suspend(&target, &opts, &state.recorder).await?;
    Ok(Json(result))
}

async fn resume(
    State(state): State<AppState>,
    body: Option<Json<SessionResumeModel>>,
) -> ApiResult<Json<Value>> {
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let target = state.store.resolve(
        data.selector.session_id.as_deref(),
        data.selector.session_dir.as_deref(),
        data.selector.session_root.as_deref(),
    )?;
    let opts = ResumeOptions {
        restart_wine: data.restart_wine,
        stop_recording: data.stop_recording,
    };
    let result = state
        .lifecycle
        .resume(&target, &opts, &state.recorder, &state.broker)
        .await?;
    Ok(Json(result))
}
