// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

fn policy_for(root: &Path) -> PathPolicy {
    PathPolicy::new([root.to_path_buf()])
}

#[test]
fn accepts_paths_under_a_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy_for(dir.path());
    let target = dir.path().join("apps/notepad.exe");
    let resolved = policy.validate(&target).unwrap();
    assert!(resolved.ends_with("apps/notepad.exe"));
}

#[test]
fn rejects_paths_outside_all_prefixes() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy_for(dir.path());
    let err = policy.validate(Path::new("/etc/passwd")).unwrap_err();
    match err {
        StorageError::InvalidPath { allowed, .. } => {
            assert!(allowed.contains(&dir.path().display().to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_dotdot_traversal_through_existing_dirs() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("inner")).unwrap();
    let policy = policy_for(&dir.path().join("inner"));
    let sneaky = dir.path().join("inner/../outside.txt");
    assert!(policy.validate(&sneaky).is_err());
}

#[test]
fn rejects_symlink_escape() {
    let dir = tempfile::tempdir().unwrap();
    let allowed = dir.path().join("allowed");
    let outside = dir.path().join("outside");
    fs::create_dir_all(&allowed).unwrap();
    fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, allowed.join("escape")).unwrap();

    let policy = policy_for(&allowed);
    assert!(policy.validate(&allowed.join("escape/secret.txt")).is_err());
}

#[test]
fn nonexistent_leaf_under_prefix_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let policy = policy_for(dir.path());
    let target = dir.path().join("sessions/session-x/new-file.txt");
    let resolved = policy.validate(&target).unwrap();
    assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
}

#[test]
fn default_allowed_covers_the_artifact_area() {
    let policy = PathPolicy::default_allowed();
    assert!(policy.validate(Path::new("/tmp")).is_ok());
}
