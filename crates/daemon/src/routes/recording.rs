// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording lifecycle, gated on the record-enabled configuration flag.

use crate::error::{ApiError, ApiResult};
use crate::models::RecordingStartModel;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use wb_engine::recorder::RecorderAction;
use wb_engine::RecordingStart;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recording/start", post(start))
        .route("/recording/stop", post(stop))
        .route("/recording/pause", post(pause))
        .route("/recording/resume", post(resume))
}

fn gate(state: &AppState) -> ApiResult<()> {
    if state.config.record_enabled {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Recording is disabled by configuration.".to_string(),
        ))
    }
}

async fn start(
    State(state): State<AppState>,
    body: Option<Json<RecordingStartModel>>,
) -> ApiResult<Json<RecorderAction>> {
    gate(&state)?;
    let data = body.map(|Json(d)| d).unwrap_or_default();
    let _guard = state.recorder_lock.lock().await;
    let action = state
        .recorder
        .start(RecordingStart {
            session_label: data.session_label,
            session_root: data.session_root,
            display: data.display,
            resolution: data.resolution,
            fps: data.fps,
            new_session: data.new_session,
        })
        .await?;
    Ok(Json(action))
}

async fn stop(State(state): State<AppState>) -> ApiResult<Json<RecorderAction>> {
    gate(&state)?;
    let _guard = state.recorder_lock.lock().await;
    Ok(Json(state.recorder.stop().await?))
}

async fn pause(State(state): State<AppState>) -> ApiResult<Json<RecorderAction>> {
    gate(&state)?;
    let _guard = state.recorder_lock.lock().await;
    Ok(Json(state.recorder.pause().await?))
}

async fn resume(State(state): State<AppState>) -> ApiResult<Json<RecorderAction>> {
    gate(&state)?;
    let _guard = state.recorder_lock.lock().await;
    Ok(Json(state.recorder.resume().await?))
}
