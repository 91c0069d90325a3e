// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error taxonomy.
//!
//! Every error body is `{"detail": "..."}`. Broker policy denials map to
//! 423 so clients can distinguish "you lost control" from auth failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use wb_engine::{BrokerError, EngineError};
use wb_storage::StorageError;
use wb_trace::TraceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Agent control denied by policy")]
    PolicyDenied,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PolicyDenied => StatusCode::LOCKED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, detail = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::BadRequest(_) | StorageError::InvalidPath { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            StorageError::NotFound(_) => ApiError::NotFound("Session directory not found".to_string()),
            StorageError::Io(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoControl => ApiError::Forbidden("Agent does not hold control".to_string()),
            BrokerError::StopRequested => {
                ApiError::Forbidden("User requested STOP_NOW".to_string())
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Storage(e) => e.into(),
            EngineError::Broker(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::BackendFailed => {
                ApiError::Internal("windows hook backend failed to start".to_string())
            }
            TraceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::BadRequest(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Forbidden(String::new()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PolicyDenied.status(), StatusCode::LOCKED);
        assert_eq!(ApiError::Internal(String::new()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn storage_errors_map_to_request_errors() {
        let invalid = StorageError::BadRequest("bad id".to_string());
        assert_eq!(ApiError::from(invalid).status(), StatusCode::BAD_REQUEST);
        let missing = StorageError::NotFound("/x".into());
        assert_eq!(ApiError::from(missing).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn broker_denials_are_forbidden() {
        assert_eq!(ApiError::from(BrokerError::NoControl).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(BrokerError::StopRequested).status(), StatusCode::FORBIDDEN);
    }
}
