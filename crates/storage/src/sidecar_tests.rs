// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    canonical = { TraceSource::Canonical, "input_events.jsonl" },
    x11_core = { TraceSource::X11Core, "input_events_x11_core.jsonl" },
    client = { TraceSource::Client, "input_events_client.jsonl" },
    windows = { TraceSource::Windows, "input_events_windows.jsonl" },
    network = { TraceSource::Network, "input_events_network.jsonl" },
)]
fn log_paths_live_under_logs(source: TraceSource, expected: &str) {
    let path = source.log_path(Path::new("/artifacts/sessions/s1"));
    assert_eq!(path, Path::new("/artifacts/sessions/s1/logs").join(expected));
}

#[test]
fn client_source_has_no_pid_file() {
    assert!(TraceSource::Client.pid_path(Path::new("/s")).is_none());
    assert!(TraceSource::Canonical.pid_path(Path::new("/s")).is_some());
}

#[test]
fn only_windows_records_a_backend() {
    assert!(TraceSource::Windows.backend_path(Path::new("/s")).is_some());
    assert!(TraceSource::Network.backend_path(Path::new("/s")).is_none());
}

#[test]
fn missing_pid_file_reads_as_not_running() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(TraceSource::Windows.pid(dir.path()), None);
    assert!(!TraceSource::Windows.running(dir.path()));
}

#[test]
fn garbage_pid_file_reads_as_not_running() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("input_trace_windows.pid"), "not-a-pid").unwrap();
    assert_eq!(TraceSource::Windows.pid(dir.path()), None);
}

#[test]
fn own_pid_counts_as_running() {
    let dir = tempfile::tempdir().unwrap();
    let me = std::process::id() as i32;
    TraceSource::Canonical.write_pid(dir.path(), me).unwrap();
    assert!(TraceSource::Canonical.running(dir.path()));
}

#[test]
fn dead_pid_counts_as_not_running() {
    assert!(!pid_running(i32::MAX - 1));
    assert!(!pid_running(0));
}

#[test]
fn client_enabled_toggles_on_state_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!TraceSource::client_enabled(dir.path()));
    TraceSource::Client.write_state(dir.path(), "enabled").unwrap();
    assert!(TraceSource::client_enabled(dir.path()));
    TraceSource::Client.write_state(dir.path(), "disabled").unwrap();
    assert!(!TraceSource::client_enabled(dir.path()));
}

#[test]
fn recorder_state_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(recorder_state(dir.path()), None);
    write_recorder_state(dir.path(), RecorderState::Recording).unwrap();
    assert_eq!(recorder_state(dir.path()), Some(RecorderState::Recording));
}

#[test]
fn from_query_maps_filter_values() {
    assert_eq!(TraceSource::from_query("x11_core"), Some(TraceSource::X11Core));
    assert_eq!(TraceSource::from_query("canonical"), None);
    assert_eq!(TraceSource::from_query(""), None);
}
