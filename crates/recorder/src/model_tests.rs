// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn event(kind: &str, t_rel_ms: i64, t_epoch_ms: u64) -> RecorderEvent {
    RecorderEvent::new("session-test", t_rel_ms, t_epoch_ms, kind, kind)
}

#[test]
fn append_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events_001.jsonl");
    append_event(&path, &event("recorder_start", 0, 1000)).unwrap();
    append_event(&path, &event("recorder_stop", 500, 1500)).unwrap();

    let events = load_events(&path);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, "recorder_start");
    assert_eq!(events[1].t_rel_ms, 500);
}

#[test]
fn load_skips_garbage_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    append_event(&path, &event("recorder_start", 0, 1000)).unwrap();
    wb_storage::fsio::append_line(&path, "garbage {").unwrap();
    append_event(&path, &event("recorder_stop", 10, 1010)).unwrap();
    assert_eq!(load_events(&path).len(), 2);
}

#[test]
fn no_pauses_leaves_times_unchanged() {
    let events = vec![event("a", 100, 1100), event("b", 200, 1200)];
    let adjusted = adjust_events_for_pauses(events);
    assert_eq!(adjusted[0].t_rel_ms, 100);
    assert_eq!(adjusted[1].t_rel_ms, 200);
}

#[test]
fn pause_interval_is_subtracted_from_later_events() {
    // Recording starts at epoch 1000. Pause 1200..1700 (500ms).
    let events = vec![
        event("recorder_start", 0, 1000),
        event("recorder_pause", 200, 1200),
        event("recorder_resume", 700, 1700),
        event("annotation", 900, 1900),
    ];
    let adjusted = adjust_events_for_pauses(events);
    // The annotation at raw t=900 had 500ms of pause before it.
    assert_eq!(adjusted[3].t_rel_ms, 400);
    // The resume itself lands exactly at the pause point.
    assert_eq!(adjusted[2].t_rel_ms, 200);
    // Events before the pause are untouched.
    assert_eq!(adjusted[1].t_rel_ms, 200);
}

#[test]
fn event_inside_a_pause_is_clamped_to_the_pause_point() {
    let events = vec![
        event("recorder_pause", 200, 1200),
        event("annotation", 400, 1400),
        event("recorder_resume", 700, 1700),
    ];
    let adjusted = adjust_events_for_pauses(events);
    assert_eq!(adjusted[1].t_rel_ms, 200);
}

#[test]
fn multiple_pauses_accumulate() {
    let events = vec![
        event("recorder_pause", 100, 1100),
        event("recorder_resume", 200, 1200),
        event("recorder_pause", 300, 1300),
        event("recorder_resume", 500, 1500),
        event("done", 600, 1600),
    ];
    let adjusted = adjust_events_for_pauses(events);
    assert_eq!(adjusted[4].t_rel_ms, 300);
}

#[test]
fn rebased_time_never_goes_negative() {
    let events = vec![
        event("recorder_pause", 0, 1000),
        event("recorder_resume", 900, 1900),
        event("late", 10, 1010),
    ];
    let adjusted = adjust_events_for_pauses(events);
    assert!(adjusted.iter().all(|e| e.t_rel_ms >= 0));
}

#[parameterized(
    button = { json!({"event": "button_press"}), true },
    key = { json!({"event": "key_press"}), true },
    agent = { json!({"event": "agent_click"}), true },
    vnc_key = { json!({"event": "vnc_key"}), true },
    vnc_pointer_pressed = { json!({"event": "vnc_pointer", "button_mask": 1}), true },
    vnc_pointer_motion = { json!({"event": "vnc_pointer", "button_mask": 0}), false },
    motion = { json!({"event": "motion"}), false },
    release = { json!({"event": "button_release"}), false },
    unknown = { json!({}), false },
)]
fn interesting_input_events(event: serde_json::Value, expected: bool) {
    assert_eq!(should_record_input_event(&event), expected);
}

#[test]
fn input_message_is_compact() {
    let event = json!({
        "event": "vnc_pointer",
        "button_mask": 1,
        "origin": "user",
        "tool": "vnc-proxy",
    });
    assert_eq!(
        input_event_message(&event),
        "vnc_pointer mask=1 origin=user tool=vnc-proxy"
    );
}

#[test]
fn fold_respects_the_event_bound() {
    let dir = tempfile::tempdir().unwrap();
    let log = wb_storage::TraceSource::Canonical.log_path(dir.path());
    for i in 0..20u64 {
        let line = json!({
            "event": "button_press",
            "timestamp_epoch_ms": 1000 + i,
            "origin": "user",
        });
        wb_storage::fsio::append_line(&log, &line.to_string()).unwrap();
    }
    let folded = load_input_trace_events(dir.path(), 1000, 5);
    assert_eq!(folded.len(), 5);
    // Oldest events were dropped first.
    assert_eq!(folded[0].t_rel_ms, 15);
    assert_eq!(folded[4].t_rel_ms, 19);
}

#[test]
fn fold_spans_multiple_layers_and_sets_positions() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = wb_storage::TraceSource::Canonical.log_path(dir.path());
    let network = wb_storage::TraceSource::Network.log_path(dir.path());
    wb_storage::fsio::append_line(
        &canonical,
        &json!({"event": "button_press", "timestamp_epoch_ms": 2000, "x": 10, "y": 20}).to_string(),
    )
    .unwrap();
    wb_storage::fsio::append_line(
        &network,
        &json!({"event": "vnc_key", "timestamp_epoch_ms": 3000, "key": 65}).to_string(),
    )
    .unwrap();

    let folded = load_input_trace_events(dir.path(), 1000, 0);
    assert_eq!(folded.len(), 2);
    let x11 = folded.iter().find(|e| e.source.as_deref() == Some("x11")).unwrap();
    assert_eq!(x11.pos, Some(Pos { x: 10, y: 20, w: 0, h: 0 }));
    assert!(folded.iter().any(|e| e.source.as_deref() == Some("network")));
}
