// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process registry and `/proc` pattern matching.
//!
//! Children spawned by the service are held here so the monitor tick can
//! reap them; otherwise a finished encoder or tracer stays a zombie for
//! the life of the daemon.

use parking_lot::Mutex;
use std::path::Path;
use tokio::process::Child;

#[derive(Default)]
pub struct ProcessRegistry {
    children: Mutex<Vec<Child>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a strong handle to a detached child so it can be reaped.
    pub fn track(&self, child: Child) {
        self.children.lock().push(child);
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }

    /// Non-blocking sweep: drop every child that has exited.
    ///
    /// Returns the number reaped this pass.
    pub fn reap(&self) -> usize {
        let mut children = self.children.lock();
        let before = children.len();
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(?status, "reaped child");
                false
            }
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(error = %err, "child wait failed; dropping handle");
                false
            }
        });
        before - children.len()
    }
}

/// Find PIDs whose comm (exact) or cmdline (substring) matches `pattern`.
///
/// Pure `/proc` scan; this must never shell out to an external matcher.
pub fn find_processes(pattern: &str, exact: bool) -> Vec<i32> {
    find_processes_in(Path::new("/proc"), pattern, exact)
}

fn find_processes_in(proc_root: &Path, pattern: &str, exact: bool) -> Vec<i32> {
    let mut pids = Vec::new();
    let Ok(entries) = std::fs::read_dir(proc_root) else {
        return pids;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        if exact {
            if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
                if comm.trim() == pattern {
                    pids.push(pid);
                    continue;
                }
            }
        }
        if let Ok(raw) = std::fs::read(entry.path().join("cmdline")) {
            let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ");
            if !cmdline.trim().is_empty() && cmdline.contains(pattern) {
                pids.push(pid);
            }
        }
    }
    pids
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
