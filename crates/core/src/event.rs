// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trace and lifecycle event model.
//!
//! Every capture layer appends one JSON object per line to its session log.
//! The known fields are typed here; anything a layer adds beyond them rides
//! in the flattened `extra` map so logs from newer emitters still parse.

use crate::time_fmt::utc_iso_now;
use crate::versioning::EVENT_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Input device metadata attached by the X11 capture layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
}

/// One input trace record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub schema_version: String,
    pub timestamp_epoch_ms: u64,
    pub timestamp_utc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub source: String,
    pub layer: String,
    pub event: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_mask: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keycode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TraceEvent {
    /// New event stamped with the current wall time.
    pub fn new(
        source: impl Into<String>,
        layer: impl Into<String>,
        event: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self::at(
            source,
            layer,
            event,
            origin,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    /// New event at an explicit epoch-milliseconds timestamp.
    pub fn at(
        source: impl Into<String>,
        layer: impl Into<String>,
        event: impl Into<String>,
        origin: impl Into<String>,
        timestamp_epoch_ms: u64,
    ) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            timestamp_epoch_ms,
            timestamp_utc: utc_iso_now(),
            session_id: None,
            source: source.into(),
            layer: layer.into(),
            event: event.into(),
            origin: origin.into(),
            tool: None,
            seq: None,
            x: None,
            y: None,
            button: None,
            button_mask: None,
            keycode: None,
            key: None,
            down: None,
            trace_id: None,
            phase: None,
            device: None,
            extra: Map::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_pos(mut self, x: i64, y: i64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }
}

/// One lifecycle record, written only to `logs/lifecycle.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub schema_version: String,
    pub timestamp_utc: String,
    pub timestamp_epoch_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl LifecycleEvent {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION.to_string(),
            timestamp_utc: utc_iso_now(),
            timestamp_epoch_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            session_id: None,
            kind: kind.into(),
            message: message.into(),
            source: source.into(),
            extra: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
