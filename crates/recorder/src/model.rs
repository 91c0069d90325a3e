// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recorder event model and the per-segment event log.
//!
//! Segment event logs (`events_<NNN>.jsonl`) use a richer record than the
//! input trace logs: times are kept both as wall-clock epoch and as
//! milliseconds relative to the segment start, which is what the subtitle
//! projection consumes.

use crate::error::RecorderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use wb_core::versioning::EVENT_SCHEMA_VERSION;
use wb_storage::fsio::append_line;
use wb_storage::TraceSource;

fn default_schema_version() -> String {
    EVENT_SCHEMA_VERSION.to_string()
}

fn default_level() -> String {
    "INFO".to_string()
}

/// Position hint for overlay subtitles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub w: i64,
    #[serde(default)]
    pub h: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub session_id: String,
    pub t_rel_ms: i64,
    pub t_epoch_ms: u64,
    #[serde(default = "default_level")]
    pub level: String,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Pos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl RecorderEvent {
    pub fn new(
        session_id: impl Into<String>,
        t_rel_ms: i64,
        t_epoch_ms: u64,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            session_id: session_id.into(),
            t_rel_ms,
            t_epoch_ms,
            level: default_level(),
            kind: kind.into(),
            message: message.into(),
            pos: None,
            style: None,
            tags: None,
            source: None,
            extra: None,
        }
    }
}

/// Append one event to a segment's event log, under the file lock.
pub fn append_event(events_path: &Path, event: &RecorderEvent) -> Result<(), RecorderError> {
    let line = serde_json::to_string(event)?;
    append_line(events_path, &line)?;
    Ok(())
}

/// Load a segment event log, dropping unparsable lines.
pub fn load_events(events_path: &Path) -> Vec<RecorderEvent> {
    let Ok(content) = std::fs::read_to_string(events_path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// Rebase event times around pause intervals.
///
/// Each (pause, resume) pair removes its duration from the relative time
/// of everything after it, so subtitles stay aligned with the concatenated
/// video, which contains no paused footage. Raw logs are left untouched.
pub fn adjust_events_for_pauses(events: Vec<RecorderEvent>) -> Vec<RecorderEvent> {
    let mut pauses: Vec<(u64, u64)> = Vec::new();
    let mut pause_start: Option<u64> = None;
    for event in &events {
        match event.kind.as_str() {
            "recorder_pause" => pause_start = Some(event.t_epoch_ms),
            "recorder_resume" => {
                if let Some(start) = pause_start.take() {
                    pauses.push((start, event.t_epoch_ms));
                }
            }
            _ => {}
        }
    }
    if pauses.is_empty() {
        return events;
    }

    events
        .into_iter()
        .map(|mut event| {
            let mut offset: u64 = 0;
            for (start, end) in &pauses {
                if event.t_epoch_ms >= *end {
                    offset += end - start;
                } else if event.t_epoch_ms >= *start {
                    offset += event.t_epoch_ms - start;
                }
            }
            event.t_rel_ms = (event.t_rel_ms - offset as i64).max(0);
            event
        })
        .collect()
}

/// Layers folded into subtitles, with the label used in tags.
const INPUT_LAYERS: [(&str, TraceSource); 4] = [
    ("x11", TraceSource::Canonical),
    ("client", TraceSource::Client),
    ("windows", TraceSource::Windows),
    ("network", TraceSource::Network),
];

/// Only state-changing input makes it into subtitles; motion and releases
/// would drown everything else.
pub fn should_record_input_event(event: &Value) -> bool {
    match event.get("event").and_then(Value::as_str) {
        Some(
            "button_press" | "key_press" | "client_mouse_down" | "client_key_down" | "agent_click"
            | "mouse_down" | "key_down" | "vnc_key",
        ) => true,
        Some("vnc_pointer") => event
            .get("button_mask")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            != 0,
        _ => false,
    }
}

/// Compact one-line description of an input event.
pub fn input_event_message(event: &Value) -> String {
    let mut parts = vec![event
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("input")
        .to_string()];
    for key in ["button", "button_mask", "key", "keycode"] {
        if let Some(value) = event.get(key) {
            if !value.is_null() {
                let label = if key == "button_mask" { "mask" } else { key };
                parts.push(format!("{label}={value}"));
            }
        }
    }
    for key in ["origin", "tool"] {
        if let Some(value) = event.get(key).and_then(Value::as_str) {
            parts.push(format!("{key}={value}"));
        }
    }
    parts.join(" ")
}

/// Fold the session's input trace logs into recorder events.
///
/// Bounded: at most `max_events` are kept, oldest dropped first, so a
/// motion-heavy session cannot blow up the subtitle pass.
pub fn load_input_trace_events(
    session_dir: &Path,
    start_epoch_ms: u64,
    max_events: usize,
) -> Vec<RecorderEvent> {
    let session_id =
        wb_storage::SessionStore::session_id_from_dir(session_dir).unwrap_or_default();
    let mut buffer: VecDeque<RecorderEvent> = VecDeque::new();

    for (layer, source) in INPUT_LAYERS {
        let path = source.log_path(session_dir);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        for line in content.lines() {
            let Ok(event) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if !should_record_input_event(&event) {
                continue;
            }
            let Some(t_epoch) = event
                .get("t_wall_ms")
                .or_else(|| event.get("timestamp_epoch_ms"))
                .and_then(Value::as_u64)
            else {
                continue;
            };
            let t_rel = t_epoch.saturating_sub(start_epoch_ms) as i64;
            let pos = match (
                event.get("x").and_then(Value::as_i64),
                event.get("y").and_then(Value::as_i64),
            ) {
                (Some(x), Some(y)) => Some(Pos { x, y, w: 0, h: 0 }),
                _ => None,
            };
            let mut record = RecorderEvent::new(
                session_id.clone(),
                t_rel,
                t_epoch,
                "input",
                input_event_message(&event),
            );
            record.pos = pos;
            record.tags = Some(vec!["input".to_string(), layer.to_string()]);
            record.source = Some(layer.to_string());
            record.extra = Some(event);
            if max_events > 0 && buffer.len() == max_events {
                buffer.pop_front();
            }
            buffer.push_back(record);
        }
    }
    buffer.into()
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
