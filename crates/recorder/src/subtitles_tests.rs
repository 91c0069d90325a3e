// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::Pos;
use yare::parameterized;

fn event(kind: &str, t_rel_ms: i64, message: &str) -> RecorderEvent {
    RecorderEvent::new("session-test", t_rel_ms, 1000 + t_rel_ms as u64, kind, message)
}

#[parameterized(
    zero = { 0, "00:00:00.000" },
    millis = { 1234, "00:00:01.234" },
    minutes = { 61_005, "00:01:01.005" },
    hours = { 3_600_000 + 62_000 + 7, "01:01:02.007" },
)]
fn vtt_timestamps(ms: i64, expected: &str) {
    assert_eq!(ms_to_vtt(ms), expected);
}

#[parameterized(
    zero = { 0, "0:00:00.00" },
    centis = { 1230, "0:00:01.23" },
    truncated = { 1239, "0:00:01.23" },
    hours = { 3_661_000, "1:01:01.00" },
)]
fn ass_timestamps(ms: i64, expected: &str) {
    assert_eq!(ms_to_ass(ms), expected);
}

#[test]
fn vtt_has_header_and_kind_prefix() {
    let gen = SubtitleGenerator::new(vec![event("recorder_start", 0, "Recorder started")]);
    let vtt = gen.generate_vtt();
    assert!(vtt.starts_with("WEBVTT\n\n"));
    assert!(vtt.contains("00:00:00.000 --> 00:00:03.000"));
    assert!(vtt.contains("[RECORDER_START] Recorder started"));
}

#[test]
fn cue_ends_at_next_event_when_sooner_than_cap() {
    let gen = SubtitleGenerator::new(vec![event("a", 0, "first"), event("b", 1000, "second")]);
    let vtt = gen.generate_vtt();
    assert!(vtt.contains("00:00:00.000 --> 00:00:01.000"));
    // Last event gets the full cap.
    assert!(vtt.contains("00:00:01.000 --> 00:00:04.000"));
}

#[test]
fn cue_cap_applies_when_next_event_is_far() {
    let gen = SubtitleGenerator::new(vec![event("a", 0, "first"), event("b", 10_000, "second")]);
    let vtt = gen.generate_vtt();
    assert!(vtt.contains("00:00:00.000 --> 00:00:03.000"));
}

#[test]
fn events_are_sorted_before_projection() {
    let gen = SubtitleGenerator::new(vec![event("later", 5000, "later"), event("first", 0, "first")]);
    let vtt = gen.generate_vtt();
    let first_idx = vtt.find("[FIRST]").unwrap();
    let later_idx = vtt.find("[LATER]").unwrap();
    assert!(first_idx < later_idx);
}

#[test]
fn ass_carries_resolution_and_styles() {
    let gen = SubtitleGenerator::new(vec![event("lifecycle", 0, "Session started")]);
    let ass = gen.generate_ass(1920, 1080);
    assert!(ass.contains("PlayResX: 1920"));
    assert!(ass.contains("PlayResY: 1080"));
    assert!(ass.contains("Style: Default,"));
    assert!(ass.contains("Style: Overlay,"));
    assert!(ass.contains("Dialogue: 0,0:00:00.00,0:00:03.00,Default,,0,0,0,,[LIFECYCLE] Session started"));
}

#[test]
fn positioned_annotation_adds_an_overlay_row() {
    let mut annotated = event("annotation", 1000, "click here");
    annotated.pos = Some(Pos { x: 320, y: 240, w: 0, h: 0 });
    let gen = SubtitleGenerator::new(vec![annotated]);
    let ass = gen.generate_ass(1280, 720);
    assert!(ass.contains("Dialogue: 1,"));
    assert!(ass.contains("{\\pos(320,240)}click here"));
}

#[test]
fn positioned_non_annotation_gets_no_overlay() {
    let mut input = event("input", 1000, "button_press");
    input.pos = Some(Pos { x: 1, y: 2, w: 0, h: 0 });
    let gen = SubtitleGenerator::new(vec![input]);
    assert!(!gen.generate_ass(1280, 720).contains("Dialogue: 1,"));
}

#[test]
fn empty_event_list_produces_bare_documents() {
    let gen = SubtitleGenerator::new(Vec::new());
    assert_eq!(gen.generate_vtt(), "WEBVTT\n\n");
    assert!(gen.generate_ass(1280, 720).ends_with("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"));
}
