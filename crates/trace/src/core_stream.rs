// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for classic `xinput test <device>` output (the x11_core layer)
//! and master-device resolution from `xinput list --short`.
//!
//! One child runs per device; every parsed line is tagged with the device
//! it came from before landing in the shared x11_core log.

use crate::sampler::MotionSampler;
use regex::Regex;
use std::sync::OnceLock;
use wb_core::{DeviceInfo, TraceEvent};

const SOURCE: &str = "x11_core";
const LAYER: &str = "x11";
const TOOL: &str = "xinput-core";

struct Patterns {
    motion: Regex,
    button: Regex,
    key: Regex,
    id: Regex,
}

// Patterns are literals; compilation cannot fail.
#[allow(clippy::unwrap_used)]
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        motion: Regex::new(r"^motion a\[0\]=([-0-9.]+) a\[1\]=([-0-9.]+)").unwrap(),
        button: Regex::new(r"^button (press|release) (\d+)").unwrap(),
        key: Regex::new(r"^key (press|release) (\d+)").unwrap(),
        id: Regex::new(r"id=(\d+)").unwrap(),
    })
}

/// Line parser for one device's test stream.
pub struct CoreStreamParser {
    session_id: Option<String>,
    device: DeviceInfo,
    sampler: MotionSampler,
    seq: u64,
}

impl CoreStreamParser {
    pub fn new(session_id: Option<String>, device: DeviceInfo, motion_sample_ms: u64) -> Self {
        Self {
            session_id,
            device,
            sampler: MotionSampler::new(motion_sample_ms),
            seq: 0,
        }
    }

    pub fn push_line(&mut self, line: &str) -> Option<TraceEvent> {
        self.push_line_at(line, now_ms())
    }

    pub fn push_line_at(&mut self, line: &str, now_ms: u64) -> Option<TraceEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut event_kind = None;
        let mut x = None;
        let mut y = None;
        let mut button = None;
        let mut keycode = None;

        if let Some(caps) = patterns().motion.captures(line) {
            event_kind = Some("motion");
            x = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()).map(|v| v.round() as i64);
            y = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()).map(|v| v.round() as i64);
        } else if let Some(caps) = patterns().button.captures(line) {
            event_kind = Some(if caps.get(1).map(|m| m.as_str()) == Some("press") {
                "button_press"
            } else {
                "button_release"
            });
            button = caps.get(2).and_then(|m| m.as_str().parse().ok());
        } else if let Some(caps) = patterns().key.captures(line) {
            event_kind = Some(if caps.get(1).map(|m| m.as_str()) == Some("press") {
                "key_press"
            } else {
                "key_release"
            });
            keycode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        }

        let event_kind = event_kind?;
        self.seq += 1;
        let seq = self.seq;
        if event_kind == "motion" && !self.sampler.admit(now_ms) {
            return None;
        }

        let mut event = TraceEvent::at(SOURCE, LAYER, event_kind, "unknown", now_ms).with_tool(TOOL);
        event.session_id = self.session_id.clone();
        event.seq = Some(seq);
        event.device = Some(self.device.clone());
        event.x = x;
        event.y = y;
        event.button = button;
        event.keycode = keycode;
        Some(event)
    }
}

/// One master device (or its Xvfb fallback) as resolved from the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDevice {
    pub id: Option<i64>,
    pub name: String,
    pub fallback_id: Option<i64>,
    pub fallback_name: String,
}

impl ResolvedDevice {
    /// Candidate specs for `xinput test`, most specific first.
    ///
    /// When the master resolved to the synthetic `Virtual core *` device
    /// and an Xvfb device exists, the Xvfb device is preferred: the core
    /// masters often produce no test output under Xvfb.
    pub fn candidates(&self) -> Vec<String> {
        let prefer_fallback = self.name.contains("Virtual core") && self.fallback_id.is_some();
        let mut specs = Vec::new();
        if prefer_fallback {
            if let Some(id) = self.fallback_id {
                specs.push(id.to_string());
            }
        }
        if let Some(id) = self.id {
            specs.push(id.to_string());
        }
        if !self.name.is_empty() {
            specs.push(self.name.clone());
        }
        if !prefer_fallback {
            if let Some(id) = self.fallback_id {
                specs.push(id.to_string());
            }
        }
        if !self.fallback_name.is_empty() {
            specs.push(self.fallback_name.clone());
        }
        specs
    }
}

/// Output of `xinput list --id-only <name>`.
pub fn parse_device_id(stdout: &str) -> Option<i64> {
    let value = stdout.trim();
    if value.chars().all(|c| c.is_ascii_digit()) && !value.is_empty() {
        value.parse().ok()
    } else {
        None
    }
}

/// Resolve master pointer/keyboard (and Xvfb fallbacks) from an
/// `xinput list --short` listing.
pub fn find_master_devices(listing: &str) -> (ResolvedDevice, ResolvedDevice) {
    let mut pointer = ResolvedDevice {
        name: "Virtual core pointer".to_string(),
        fallback_name: "Xvfb mouse".to_string(),
        ..Default::default()
    };
    let mut keyboard = ResolvedDevice {
        name: "Virtual core keyboard".to_string(),
        fallback_name: "Xvfb keyboard".to_string(),
        ..Default::default()
    };

    for line in listing.lines() {
        let id = patterns()
            .id
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok());
        let Some(id) = id else { continue };
        let name = line.split("id=").next().map(clean_device_name).unwrap_or_default();

        if pointer.id.is_none() && line.contains("master pointer") {
            pointer.id = Some(id);
            if !name.is_empty() {
                pointer.name = name.clone();
            }
        }
        if keyboard.id.is_none() && line.contains("master keyboard") {
            keyboard.id = Some(id);
            if !name.is_empty() {
                keyboard.name = name.clone();
            }
        }
        if pointer.fallback_id.is_none() && line.contains(&pointer.fallback_name) {
            pointer.fallback_id = Some(id);
        }
        if keyboard.fallback_id.is_none() && line.contains(&keyboard.fallback_name) {
            keyboard.fallback_id = Some(id);
        }
    }
    (pointer, keyboard)
}

/// Strip the tree-drawing glyphs and padding xinput puts around names.
fn clean_device_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || !c.is_ascii())
        .trim()
        .to_string()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "core_stream_tests.rs"]
mod tests;
