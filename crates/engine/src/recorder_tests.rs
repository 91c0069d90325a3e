// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use wb_storage::PathPolicy;

/// A stand-in recorder: writes its pid and state like the real one, holds
/// the signal contract (USR1/USR2 ignored here), exits on TERM.
const FAKE_RECORDER: &str = r#"#!/bin/sh
dir=""
while [ $# -gt 0 ]; do
  case "$1" in
    --session-dir) dir="$2"; shift 2 ;;
    *) shift ;;
  esac
done
trap : USR1 USR2
trap 'rm -f "$dir/recorder.pid" "$dir/recorder.state"; exit 0' TERM
echo $$ > "$dir/recorder.pid"
echo recording > "$dir/recorder.state"
while : ; do sleep 1; done
"#;

struct Fixture {
    _tmp: tempfile::TempDir,
    supervisor: RecorderSupervisor,
    store: SessionStore,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let bin = tmp.path().join("fake-recorder");
    std::fs::write(&bin, FAKE_RECORDER).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

    let store = SessionStore::new(
        tmp.path().join("sessions"),
        tmp.path().join("current_session"),
        PathPolicy::new([tmp.path().to_path_buf()]),
    );
    let supervisor = RecorderSupervisor::new(
        store.clone(),
        ManifestDefaults::default(),
        bin,
        Arc::new(ProcessRegistry::new()),
    );
    Fixture { _tmp: tmp, supervisor, store }
}

#[tokio::test]
async fn start_bootstraps_a_session_and_segment() {
    let fx = fixture();
    let action = fx.supervisor.start(RecordingStart::default()).await.unwrap();

    assert_eq!(action.status, "started");
    assert_eq!(action.segment, Some(1));
    let dir = action.session_dir.clone().unwrap();
    assert!(dir.join("session.json").is_file());
    assert!(action.output_file.unwrap().ends_with("video_001.mkv"));
    assert!(action.events_file.unwrap().ends_with("events_001.jsonl"));
    assert!(action.recorder_pid.is_some());
    assert_eq!(sidecar::recorder_state(&dir), Some(RecorderState::Recording));

    let stopped = fx.supervisor.stop().await.unwrap();
    assert_eq!(stopped.status, "stopped");
}

#[tokio::test]
async fn second_start_reports_already_recording() {
    let fx = fixture();
    let first = fx.supervisor.start(RecordingStart::default()).await.unwrap();
    assert_eq!(first.status, "started");

    let second = fx.supervisor.start(RecordingStart::default()).await.unwrap();
    assert_eq!(second.status, "already_recording");
    assert_eq!(second.session_dir, first.session_dir);

    fx.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn stop_without_a_session_is_already_stopped() {
    let fx = fixture();
    let action = fx.supervisor.stop().await.unwrap();
    assert_eq!(action.status, "already_stopped");
    assert!(action.session_dir.is_none());
}

#[tokio::test]
async fn stop_with_a_dead_recorder_resets_state() {
    let fx = fixture();
    let dir = fx.store.ensure_session(&ManifestDefaults::default()).unwrap();
    sidecar::write_recorder_state(&dir, RecorderState::Recording).unwrap();
    std::fs::write(dir.join("recorder.pid"), format!("{}", i32::MAX - 2)).unwrap();

    let action = fx.supervisor.stop().await.unwrap();
    assert_eq!(action.status, "already_stopped");
    assert_eq!(sidecar::recorder_state(&dir), Some(RecorderState::Idle));
}

#[tokio::test]
async fn stop_terminates_a_live_recorder() {
    let fx = fixture();
    fx.supervisor.start(RecordingStart::default()).await.unwrap();
    let action = fx.supervisor.stop().await.unwrap();
    assert_eq!(action.status, "stopped");
    let dir = action.session_dir.unwrap();
    assert!(!sidecar::recorder_running(&dir));
    assert!(!sidecar::recorder_pid_path(&dir).exists());
}

#[tokio::test]
async fn pause_without_session_is_idle() {
    let fx = fixture();
    let action = fx.supervisor.pause().await.unwrap();
    assert_eq!(action.status, "idle");
}

#[tokio::test]
async fn pause_when_not_running_is_already_paused() {
    let fx = fixture();
    fx.store.ensure_session(&ManifestDefaults::default()).unwrap();
    let action = fx.supervisor.pause().await.unwrap();
    assert_eq!(action.status, "already_paused");
}

#[tokio::test]
async fn resume_when_live_is_already_recording() {
    let fx = fixture();
    fx.supervisor.start(RecordingStart::default()).await.unwrap();
    let action = fx.supervisor.resume().await.unwrap();
    assert_eq!(action.status, "already_recording");
    fx.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn explicit_new_session_leaves_the_old_one_alone() {
    let fx = fixture();
    let first = fx.supervisor.start(RecordingStart::default()).await.unwrap();
    fx.supervisor.stop().await.unwrap();

    let second = fx
        .supervisor
        .start(RecordingStart {
            new_session: true,
            session_label: Some("retry".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_ne!(second.session_dir, first.session_dir);
    assert!(second
        .session_id
        .as_deref()
        .unwrap()
        .ends_with("-retry"));
    fx.supervisor.stop().await.unwrap();
}

#[test]
fn status_reflects_missing_session() {
    let fx = fixture();
    let status = fx.supervisor.status();
    assert!(!status.running);
    assert!(status.session_dir.is_none());
}
