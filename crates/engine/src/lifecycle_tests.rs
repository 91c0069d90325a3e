// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::recorder::RecorderSupervisor;
use wb_core::{ControlMode, FakeClock};
use wb_storage::PathPolicy;

struct Fixture {
    _tmp: tempfile::TempDir,
    store: SessionStore,
    lifecycle: LifecycleSupervisor,
    recorder: RecorderSupervisor,
}

fn fixture(interactive: bool) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProcessRegistry::new());
    let store = SessionStore::new(
        tmp.path().join("sessions"),
        tmp.path().join("current_session"),
        PathPolicy::new([tmp.path().to_path_buf()]),
    );
    let lifecycle = LifecycleSupervisor::new(
        store.clone(),
        ManifestDefaults::default(),
        tmp.path().join("wineprefix"),
        interactive,
        Arc::clone(&registry),
    );
    let recorder = RecorderSupervisor::new(
        store.clone(),
        ManifestDefaults::default(),
        tmp.path().join("no-such-recorder"),
        registry,
    );
    Fixture { _tmp: tmp, store, lifecycle, recorder }
}

#[tokio::test]
async fn suspend_marks_the_session_and_logs() {
    let fx = fixture(false);
    let dir = fx.store.ensure_session(&ManifestDefaults::default()).unwrap();

    let opts = SuspendOptions { shutdown_wine: false, stop_recording: true };
    let result = fx.lifecycle.suspend(&dir, &opts, &fx.recorder).await.unwrap();

    assert_eq!(result["status"], "suspended");
    assert_eq!(SessionStore::read_state(&dir).as_deref(), Some("suspended"));
    let events = wb_storage::logs::read_events_tail(
        &wb_storage::logs::lifecycle_log_path(&dir),
        10,
        &Default::default(),
    )
    .unwrap();
    assert!(events.iter().any(|e| e["kind"] == "session_suspended"));
}

#[tokio::test]
async fn resume_activates_target_and_rebinds_broker() {
    let fx = fixture(true);
    let broker = Broker::with_clock(FakeClock::new());
    let dir = fx.store.ensure_session(&ManifestDefaults::default()).unwrap();
    SessionStore::write_state(&dir, "suspended").unwrap();

    let opts = ResumeOptions { restart_wine: false, stop_recording: false };
    let result = fx
        .lifecycle
        .resume(&dir, &opts, &fx.recorder, &broker)
        .await
        .unwrap();

    assert_eq!(result["status"], "already_active");
    assert_eq!(SessionStore::read_state(&dir).as_deref(), Some("active"));
    assert!(dir.join("user/Desktop").is_dir());

    let state = broker.state();
    assert_eq!(
        Some(state.session_id.as_str()),
        SessionStore::session_id_from_dir(&dir).as_deref()
    );
    assert!(state.interactive);
    assert_eq!(state.control_mode, ControlMode::User);
}

#[tokio::test]
async fn resume_switches_sessions_and_suspends_the_previous() {
    let fx = fixture(false);
    let broker = Broker::with_clock(FakeClock::new());
    let old = fx.store.ensure_session(&ManifestDefaults::default()).unwrap();

    let target = fx.store.root().join("session-other");
    std::fs::create_dir_all(&target).unwrap();

    let opts = ResumeOptions { restart_wine: false, stop_recording: false };
    let result = fx
        .lifecycle
        .resume(&target, &opts, &fx.recorder, &broker)
        .await
        .unwrap();

    assert_eq!(result["status"], "resumed");
    assert_eq!(result["previous_session"], serde_json::json!(old));
    assert_eq!(SessionStore::read_state(&old).as_deref(), Some("suspended"));
    assert_eq!(SessionStore::read_state(&target).as_deref(), Some("active"));
    assert_eq!(fx.store.current().as_deref(), Some(target.as_path()));
    // Manifest was synthesised for the bare directory
    assert!(target.join("session.json").is_file());
    // Wine user dir now points at the new session
    let link = fx._tmp.path().join("wineprefix/drive_c/users/winebot");
    assert_eq!(std::fs::read_link(link).unwrap(), target.join("user"));
}

#[test]
fn component_order_ends_with_the_x_server() {
    let names: Vec<&str> = COMPONENT_SHUTDOWN_ORDER.iter().map(|(n, _, _)| *n).collect();
    assert_eq!(names.first(), Some(&"novnc_proxy"));
    assert_eq!(names.last(), Some(&"xvfb"));
    // The window manager goes down before the X server it runs on.
    let openbox = names.iter().position(|n| *n == "openbox").unwrap();
    let xvfb = names.iter().position(|n| *n == "xvfb").unwrap();
    assert!(openbox < xvfb);
}

#[tokio::test]
async fn component_shutdown_reports_absent_components() {
    let fx = fixture(false);
    let dir = fx.store.ensure_session(&ManifestDefaults::default()).unwrap();
    let results = fx.lifecycle.component_shutdown(Some(&dir));
    // None of the desktop components run in the test environment.
    assert_eq!(results["novnc_proxy"]["ok"], false);
    assert!(results["xvfb"]["pids"].as_array().unwrap().is_empty());

    let events = wb_storage::logs::read_events_tail(
        &wb_storage::logs::lifecycle_log_path(&dir),
        50,
        &Default::default(),
    )
    .unwrap();
    assert!(events.iter().any(|e| e["kind"] == "component_shutdown_requested"));
    assert!(events.iter().any(|e| e["kind"] == "xvfb_stop_failed"));
}
