// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-cutting request plumbing: the auth gate and version headers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use wb_core::versioning::{API_VERSION, ARTIFACT_SCHEMA_VERSION, BUILD_VERSION, EVENT_SCHEMA_VERSION};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject non-`/ui` requests without the configured token, before any
/// handler side effect.
pub async fn auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !req.uri().path().starts_with("/ui") {
        if let Some(expected) = &state.config.api_token {
            let provided = req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok());
            if provided != Some(expected.as_str()) {
                return ApiError::Forbidden("Invalid or missing API Token".to_string())
                    .into_response();
            }
        }
    }
    next.run(req).await
}

/// Stamp every response with the version header quartet.
pub async fn version_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-winebot-api-version", API_VERSION),
        ("x-winebot-build-version", BUILD_VERSION),
        ("x-winebot-artifact-schema-version", ARTIFACT_SCHEMA_VERSION),
        ("x-winebot-event-schema-version", EVENT_SCHEMA_VERSION),
    ] {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
    response
}
