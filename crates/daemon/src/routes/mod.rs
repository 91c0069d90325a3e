// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route assembly and helpers shared across route modules.

use crate::error::ApiError;
use crate::middleware;
use crate::models::SessionSelector;
use crate::state::AppState;
use axum::Router;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;

pub mod automation;
pub mod control;
pub mod health;
pub mod input;
pub mod lifecycle;
pub mod recording;
pub mod sessions;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(sessions::router())
        .merge(recording::router())
        .merge(control::router())
        .merge(input::router())
        .merge(automation::router())
        .merge(lifecycle::router())
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth))
        .layer(axum::middleware::from_fn(middleware::version_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve an explicitly selected session, or fall back to the current
/// one (`None` when neither exists).
pub(crate) fn resolve_target(
    state: &AppState,
    selector: &SessionSelector,
) -> Result<Option<PathBuf>, ApiError> {
    if selector.is_empty() {
        return Ok(state.store.current());
    }
    let dir = state.store.resolve(
        selector.session_id.as_deref(),
        selector.session_dir.as_deref(),
        selector.session_root.as_deref(),
    )?;
    Ok(Some(dir))
}

/// Like `resolve_target`, but synthesises a session when none is current.
pub(crate) fn resolve_or_ensure(
    state: &AppState,
    selector: &SessionSelector,
) -> Result<PathBuf, ApiError> {
    if selector.is_empty() {
        return Ok(state.store.ensure_session(&state.config.manifest_defaults())?);
    }
    Ok(state.store.resolve(
        selector.session_id.as_deref(),
        selector.session_dir.as_deref(),
        selector.session_root.as_deref(),
    )?)
}

/// Resolve a binary against PATH.
pub(crate) fn which(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn epoch_ms_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub(crate) fn truncate_text(value: &str, limit: usize) -> String {
    if value.len() <= limit {
        return value.to_string();
    }
    let mut cut = limit;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n...[truncated {} chars]", &value[..cut], value.len() - cut)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_reports_dropped_chars() {
        assert_eq!(truncate_text("short", 100), "short");
        let long = "x".repeat(120);
        let cut = truncate_text(&long, 100);
        assert!(cut.starts_with(&"x".repeat(100)));
        assert!(cut.ends_with("...[truncated 20 chars]"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "aé".repeat(50);
        let cut = truncate_text(&text, 3);
        assert!(cut.contains("truncated"));
    }
}
