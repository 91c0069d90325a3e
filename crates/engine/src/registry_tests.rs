// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tokio::process::Command;

#[tokio::test]
async fn reap_removes_exited_children() {
    let registry = ProcessRegistry::new();
    let child = Command::new("true").spawn().unwrap();
    registry.track(child);
    assert_eq!(registry.len(), 1);

    // Give the process a moment to exit.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(registry.reap(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn reap_keeps_running_children() {
    let registry = ProcessRegistry::new();
    let child = Command::new("sleep").arg("5").spawn().unwrap();
    let pid = child.id().map(|p| p as i32);
    registry.track(child);

    assert_eq!(registry.reap(), 0);
    assert_eq!(registry.len(), 1);

    if let Some(pid) = pid {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid),
            nix::sys::signal::Signal::SIGKILL,
        );
    }
}

#[test]
fn find_processes_matches_own_cmdline() {
    let me = std::process::id() as i32;
    let cmdline = fs::read(format!("/proc/{me}/cmdline")).unwrap();
    let cmdline = String::from_utf8_lossy(&cmdline).replace('\0', " ");
    let needle = cmdline.split_whitespace().next().unwrap().to_string();

    let pids = find_processes(&needle, false);
    assert!(pids.contains(&me), "expected {me} in {pids:?}");
}

#[test]
fn find_processes_exact_matches_comm() {
    let me = std::process::id() as i32;
    let comm = fs::read_to_string(format!("/proc/{me}/comm")).unwrap();
    let pids = find_processes(comm.trim(), true);
    assert!(pids.contains(&me));
}

#[test]
fn find_processes_with_nonsense_pattern_is_empty() {
    let pids = find_processes("no-such-process-name-zzz-409", false);
    assert!(pids.is_empty());
}

#[test]
fn missing_proc_root_yields_empty() {
    let pids = find_processes_in(Path::new("/nonexistent-proc"), "x", false);
    assert!(pids.is_empty());
}
