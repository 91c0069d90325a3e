// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for `xinput test-xi2 --root` output (the canonical layer).
//!
//! The stream is block-structured: an `EVENT type N (Name)` header
//! followed by indented attribute lines. A block is emitted when the next
//! header arrives, so `finish()` must be called to flush the last one.

use crate::sampler::MotionSampler;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use wb_core::{DeviceInfo, TraceEvent};

const SOURCE: &str = "x11";
const LAYER: &str = "x11";
const TOOL: &str = "xinput";

struct Patterns {
    event: Regex,
    device: Regex,
    detail: Regex,
    root: Regex,
    flags: Regex,
}

// Patterns are literals; compilation cannot fail.
#[allow(clippy::unwrap_used)]
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        event: Regex::new(r"^EVENT type (\d+) \(([^)]+)\)").unwrap(),
        device: Regex::new(r"^\s*device:\s*(\d+)\s+\((.+)\)").unwrap(),
        detail: Regex::new(r"^\s*detail:\s*(\d+)").unwrap(),
        root: Regex::new(r"^\s*root:\s*([0-9.+-]+)/([0-9.+-]+)").unwrap(),
        flags: Regex::new(r"^\s*flags:\s*(.*)").unwrap(),
    })
}

#[derive(Debug, Default, Clone)]
struct Block {
    xi2_name: String,
    device_id: Option<i64>,
    device_name: Option<String>,
    detail: Option<i64>,
    root_x: Option<i64>,
    root_y: Option<i64>,
    flags: Option<String>,
    raw: Vec<String>,
}

pub struct Xi2Parser {
    session_id: Option<String>,
    include_raw: bool,
    sampler: MotionSampler,
    seq: u64,
    current: Option<Block>,
}

impl Xi2Parser {
    pub fn new(session_id: Option<String>, include_raw: bool, motion_sample_ms: u64) -> Self {
        Self {
            session_id,
            include_raw,
            sampler: MotionSampler::new(motion_sample_ms),
            seq: 0,
            current: None,
        }
    }

    /// Feed one line; returns an event when the previous block completes.
    pub fn push_line(&mut self, line: &str) -> Option<TraceEvent> {
        self.push_line_at(line, now_ms())
    }

    pub fn push_line_at(&mut self, line: &str, now_ms: u64) -> Option<TraceEvent> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }
        if let Some(caps) = patterns().event.captures(line) {
            let finished = self.flush(now_ms);
            let mut block = Block {
                xi2_name: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                ..Block::default()
            };
            if self.include_raw {
                block.raw.push(line.to_string());
            }
            self.current = Some(block);
            return finished;
        }

        let Some(block) = self.current.as_mut() else {
            return None;
        };
        if self.include_raw {
            block.raw.push(line.to_string());
        }
        if let Some(caps) = patterns().device.captures(line) {
            block.device_id = caps.get(1).and_then(|m| m.as_str().parse().ok());
            block.device_name = caps.get(2).map(|m| m.as_str().to_string());
        } else if let Some(caps) = patterns().detail.captures(line) {
            block.detail = caps.get(1).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = patterns().root.captures(line) {
            block.root_x = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()).map(|v| v.round() as i64);
            block.root_y = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()).map(|v| v.round() as i64);
        } else if let Some(caps) = patterns().flags.captures(line) {
            let flags = caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
            if !flags.is_empty() {
                block.flags = Some(flags);
            }
        }
        None
    }

    /// Flush the trailing block at end of stream.
    pub fn finish(&mut self) -> Option<TraceEvent> {
        self.flush(now_ms())
    }

    pub fn finish_at(&mut self, now_ms: u64) -> Option<TraceEvent> {
        self.flush(now_ms)
    }

    fn flush(&mut self, now_ms: u64) -> Option<TraceEvent> {
        let block = self.current.take()?;
        let (event_kind, raw_event) = classify(&block.xi2_name)?;

        self.seq += 1;
        let seq = self.seq;

        if event_kind == "motion" && !self.sampler.admit(now_ms) {
            return None;
        }

        let mut event = TraceEvent::at(SOURCE, LAYER, event_kind, "unknown", now_ms)
            .with_tool(TOOL);
        event.session_id = self.session_id.clone();
        event.seq = Some(seq);
        event.device = Some(DeviceInfo {
            id: block.device_id,
            name: block.device_name.clone(),
            spec: None,
        });
        event.extra.insert("xi2_type".to_string(), Value::from(block.xi2_name.clone()));
        if raw_event {
            event.extra.insert("xi2_raw".to_string(), Value::from(true));
        }
        if let Some(detail) = block.detail {
            event.extra.insert("detail".to_string(), Value::from(detail));
        }
        if let (Some(x), Some(y)) = (block.root_x, block.root_y) {
            event.x = Some(x);
            event.y = Some(y);
        }
        match event_kind {
            "button_press" | "button_release" => event.button = block.detail,
            "key_press" | "key_release" => event.keycode = block.detail,
            _ => {}
        }
        if let Some(flags) = block.flags {
            event.extra.insert("flags".to_string(), Value::from(flags));
        }
        if self.include_raw && !block.raw.is_empty() {
            event
                .extra
                .insert("raw".to_string(), Value::from(block.raw));
        }
        Some(event)
    }
}

/// Map an XI2 event name to the trace event kind; `Raw` prefixed events
/// keep their base kind and are flagged.
fn classify(xi2_name: &str) -> Option<(&'static str, bool)> {
    let (base, raw) = match xi2_name.strip_prefix("Raw") {
        Some(base) => (base, true),
        None => (xi2_name, false),
    };
    let kind = match base {
        "Motion" => "motion",
        "ButtonPress" => "button_press",
        "ButtonRelease" => "button_release",
        "KeyPress" => "key_press",
        "KeyRelease" => "key_release",
        _ => return None,
    };
    Some((kind, raw))
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "xi2_tests.rs"]
mod tests;
