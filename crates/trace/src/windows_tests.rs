// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use yare::parameterized;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn launcher(dir: &Path, hook_body: &str) -> WindowsLauncher {
    WindowsLauncher {
        hook_runtime: script(dir, "winpy", hook_body),
        hook_script: script(dir, "hook.py", "# hook"),
        ahk_runtime: script(dir, "ahk", "#!/bin/sh\nsleep 30\n"),
        ahk_script: dir.join("input_trace_windows.ahk"),
    }
}

#[parameterized(
    auto = { "auto", Some(WindowsBackend::Auto) },
    ahk = { "AHK", Some(WindowsBackend::Ahk) },
    hook = { "hook", Some(WindowsBackend::Hook) },
    junk = { "python", None },
)]
fn backend_names_parse(input: &str, expected: Option<WindowsBackend>) {
    assert_eq!(input.parse::<WindowsBackend>().ok(), expected);
}

#[test]
fn windows_paths_map_to_drive_z() {
    assert_eq!(
        to_windows_path(Path::new("/artifacts/sessions/s1/logs/input_events_windows.jsonl")),
        "Z:\\artifacts\\sessions\\s1\\logs\\input_events_windows.jsonl"
    );
}

#[test]
fn hook_args_run_unbounded_with_session_id() {
    let launcher = WindowsLauncher::default();
    let args = launcher.hook_args(Path::new("/s/logs/out.jsonl"), "session-1");
    let joined = args.join(" ");
    assert!(joined.contains("--duration 0"));
    assert!(joined.contains("--tool win_hook"));
    assert!(joined.contains("--session-id session-1"));
}

#[test]
fn ahk_args_append_debug_keys_and_sample() {
    let launcher = WindowsLauncher::default();
    let opts = WindowsStartOptions {
        debug_keys: vec!["F1".to_string(), "F2".to_string()],
        debug_sample_ms: Some(250),
        ..Default::default()
    };
    let args = launcher.ahk_args(Path::new("/s/logs/out.jsonl"), &opts, "session-1");
    assert_eq!(args[1], "Z:\\s\\logs\\out.jsonl");
    assert_eq!(args[2], "10");
    assert_eq!(args[3], "session-1");
    assert_eq!(args[4], "F1,F2");
    assert_eq!(args[5], "250");
}

#[tokio::test]
async fn auto_prefers_a_surviving_hook() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = launcher(tmp.path(), "#!/bin/sh\nsleep 30\n");
    let mut start = launcher
        .start(tmp.path(), "session-1", &WindowsStartOptions::default())
        .await
        .unwrap();
    assert_eq!(start.backend, "hook");
    assert!(start.warnings.is_empty());
    let _ = start.child.kill().await;
}

#[tokio::test]
async fn auto_falls_back_to_ahk_when_the_hook_dies() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = launcher(tmp.path(), "#!/bin/sh\nexit 1\n");
    let mut start = launcher
        .start(tmp.path(), "session-1", &WindowsStartOptions::default())
        .await
        .unwrap();
    assert_eq!(start.backend, "ahk");
    let _ = start.child.kill().await;
}

#[tokio::test]
async fn explicit_hook_failure_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = launcher(tmp.path(), "#!/bin/sh\nexit 1\n");
    let opts = WindowsStartOptions { backend: WindowsBackend::Hook, ..Default::default() };
    let err = launcher.start(tmp.path(), "session-1", &opts).await.unwrap_err();
    assert!(matches!(err, TraceError::BackendFailed));
}

#[tokio::test]
async fn hook_backend_warns_about_debug_keys() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = launcher(tmp.path(), "#!/bin/sh\nsleep 30\n");
    let opts = WindowsStartOptions {
        debug_keys: vec!["F1".to_string()],
        ..Default::default()
    };
    let mut start = launcher.start(tmp.path(), "session-1", &opts).await.unwrap();
    assert_eq!(start.backend, "hook");
    assert_eq!(start.warnings.len(), 1);
    let _ = start.child.kill().await;
}

#[tokio::test]
async fn missing_hook_runtime_falls_back_without_probe() {
    let tmp = tempfile::tempdir().unwrap();
    let mut launcher = launcher(tmp.path(), "#!/bin/sh\nsleep 30\n");
    launcher.hook_runtime = tmp.path().join("absent-winpy");
    let mut start = launcher
        .start(tmp.path(), "session-1", &WindowsStartOptions::default())
        .await
        .unwrap();
    assert_eq!(start.backend, "ahk");
    let _ = start.child.kill().await;
}
