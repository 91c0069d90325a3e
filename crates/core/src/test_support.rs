// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and fixtures shared by other crates' tests.

use crate::event::TraceEvent;

/// A minimal trace event with the given origin and timestamp, suitable for
/// seeding log files in tests.
pub fn trace_event(origin: &str, timestamp_epoch_ms: u64) -> TraceEvent {
    TraceEvent::at("x11", "x11", "button_press", origin, timestamp_epoch_ms)
}

/// Serialise an event the way the log writers do: one line, no trailing LF.
pub fn event_line(event: &TraceEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}
