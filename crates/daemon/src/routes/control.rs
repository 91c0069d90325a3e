// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive control: lease grant/renew, user intent, state queries.

use crate::error::ApiResult;
use crate::models::{GrantControlModel, UserIntentModel};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use wb_core::ControlState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/:session_id/control", get(control_state))
        .route("/sessions/:session_id/control/grant", post(grant))
        .route("/sessions/:session_id/control/renew", post(renew))
        .route("/sessions/:session_id/user_intent", post(user_intent))
}

async fn control_state(
    State(state): State<AppState>,
    Path(_session_id): Path<String>,
) -> Json<ControlState> {
    Json(state.broker.state())
}

async fn grant(
    State(state): State<AppState>,
    Path(_session_id): Path<String>,
    Json(data): Json<GrantControlModel>,
) -> Json<ControlState> {
    state.broker.grant_agent(data.lease_seconds);
    Json(state.broker.state())
}

async fn renew(
    State(state): State<AppState>,
    Path(_session_id): Path<String>,
    Json(data): Json<GrantControlModel>,
) -> ApiResult<Json<ControlState>> {
    state.broker.renew_agent(data.lease_seconds)?;
    Ok(Json(state.broker.state()))
}

async fn user_intent(
    State(state): State<AppState>,
    Path(_session_id): Path<String>,
    Json(data): Json<UserIntentModel>,
) -> Json<ControlState> {
    state.broker.set_user_intent(data.intent);
    Json(state.broker.state())
}
