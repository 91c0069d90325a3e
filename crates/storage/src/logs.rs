// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event logs: appends with defaults filled in, and the filtered
//! tail query behind `/input/events` and `/lifecycle/events`.
//!
//! Lifecycle writes are best-effort telemetry: a failed append must never
//! break the mutation it decorates, so it degrades to a warning.

use crate::error::StorageError;
use crate::fsio::{append_line, RevLines};
use crate::session::SessionStore;
use crate::sidecar::TraceSource;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use wb_core::event::LifecycleEvent;
use wb_core::time_fmt::utc_iso_now;
use wb_core::versioning::EVENT_SCHEMA_VERSION;

pub fn lifecycle_log_path(session_dir: &Path) -> PathBuf {
    session_dir.join("logs").join("lifecycle.jsonl")
}

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn set_default(map: &mut serde_json::Map<String, Value>, key: &str, value: Value) {
    map.entry(key.to_string()).or_insert(value);
}

/// Append one event object, stamping `schema_version` if absent.
pub fn append_trace_event(path: &Path, mut event: Value) -> Result<(), StorageError> {
    if let Some(map) = event.as_object_mut() {
        set_default(map, "schema_version", Value::from(EVENT_SCHEMA_VERSION));
    }
    let line =
        serde_json::to_string(&event).map_err(|e| StorageError::BadRequest(e.to_string()))?;
    append_line(path, &line)
}

/// Append to a layer log with the usual defaults (timestamps, session id).
pub fn append_input_event(
    session_dir: &Path,
    source: TraceSource,
    mut event: Value,
) -> Result<(), StorageError> {
    if let Some(map) = event.as_object_mut() {
        set_default(map, "schema_version", Value::from(EVENT_SCHEMA_VERSION));
        set_default(map, "timestamp_epoch_ms", Value::from(epoch_ms_now()));
        set_default(map, "timestamp_utc", Value::from(utc_iso_now()));
        if let Some(id) = SessionStore::session_id_from_dir(session_dir) {
            set_default(map, "session_id", Value::from(id));
        }
    }
    append_trace_event(&source.log_path(session_dir), event)
}

/// Best-effort lifecycle telemetry.
pub fn append_lifecycle_event(
    session_dir: Option<&Path>,
    kind: &str,
    message: &str,
    source: &str,
    extra: Option<Value>,
) {
    let Some(session_dir) = session_dir else { return };
    let mut event = LifecycleEvent::new(kind, message, source);
    if let Some(id) = SessionStore::session_id_from_dir(session_dir) {
        event = event.with_session(id);
    }
    if let Some(extra) = extra {
        event = event.with_extra(extra);
    }
    let Ok(line) = serde_json::to_string(&event) else {
        return;
    };
    if let Err(err) = append_line(&lifecycle_log_path(session_dir), &line) {
        tracing::warn!(kind, error = %err, "lifecycle event write failed");
    }
}

/// Filters applied by the event tail query.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub since_epoch_ms: Option<u64>,
    pub origin: Option<String>,
}

impl EventFilter {
    fn matches(&self, event: &Value) -> bool {
        if let Some(since) = self.since_epoch_ms {
            let ts = event
                .get("timestamp_epoch_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if ts < since {
                return false;
            }
        }
        if let Some(origin) = &self.origin {
            if event.get("origin").and_then(Value::as_str) != Some(origin) {
                return false;
            }
        }
        true
    }
}

/// The last `limit` matching events of a log, oldest first.
///
/// Lines that fail to parse as JSON are dropped silently; filters are
/// applied before the limit so a garbage line never shrinks the result.
pub fn read_events_tail(
    path: &Path,
    limit: usize,
    filter: &EventFilter,
) -> Result<Vec<Value>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for line in RevLines::open(path)? {
        if out.len() == limit {
            break;
        }
        let Ok(event) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        if filter.matches(&event) {
            out.push(event);
        }
    }
    out.reverse();
    Ok(out)
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
