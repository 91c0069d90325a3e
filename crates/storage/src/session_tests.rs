// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;

fn store(dir: &Path) -> SessionStore {
    SessionStore::new(
        dir.join("sessions"),
        dir.join("current_session"),
        PathPolicy::new([dir.to_path_buf()]),
    )
}

#[test]
fn ensure_session_bootstraps_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let dir = store.ensure_session(&ManifestDefaults::default()).unwrap();

    assert!(dir.join("session.json").is_file());
    for sub in ["logs", "screenshots", "scripts", "user"] {
        assert!(dir.join(sub).is_dir(), "missing {sub}");
    }
    assert_eq!(store.read_pointer().as_deref(), Some(dir.as_path()));

    let manifest = SessionStore::read_manifest(&dir).unwrap();
    assert!(manifest.session_id.starts_with("session-"));
    assert_eq!(manifest.fps, 30);
}

#[test]
fn ensure_session_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let first = store.ensure_session(&ManifestDefaults::default()).unwrap();
    fs::remove_dir_all(first.join("logs")).unwrap();
    let second = store.ensure_session(&ManifestDefaults::default()).unwrap();
    assert_eq!(first, second);
    assert!(first.join("logs").is_dir());
}

#[test]
fn stale_pointer_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    store
        .write_pointer(&tmp.path().join("sessions/gone"))
        .unwrap();
    let dir = store.ensure_session(&ManifestDefaults::default()).unwrap();
    assert!(dir.is_dir());
    assert_ne!(dir, tmp.path().join("sessions/gone"));
}

#[test]
fn resolve_by_id_joins_the_root() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let dir = store.ensure_session(&ManifestDefaults::default()).unwrap();
    let id = SessionStore::session_id_from_dir(&dir).unwrap();
    let resolved = store.resolve(Some(&id), None, None).unwrap();
    assert_eq!(resolved, dir);
}

#[test]
fn resolve_rejects_traversal_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let err = store.resolve(Some("../escape"), None, None).unwrap_err();
    assert!(matches!(err, StorageError::BadRequest(_)));
}

#[test]
fn resolve_requires_some_target() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let err = store.resolve(None, None, None).unwrap_err();
    assert!(matches!(err, StorageError::BadRequest(_)));
}

#[test]
fn resolve_missing_session_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("sessions")).unwrap();
    let store = store(tmp.path());
    let err = store.resolve(Some("session-nope"), None, None).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn resolve_validates_explicit_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let err = store
        .resolve(None, Some(Path::new("/etc")), None)
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath { .. }));
}

#[test]
fn user_profile_replaces_symlinks_with_dirs() {
    let tmp = tempfile::tempdir().unwrap();
    let user_dir = tmp.path().join("user");
    fs::create_dir_all(&user_dir).unwrap();
    let desktop = user_dir.join("Desktop");
    std::os::unix::fs::symlink(tmp.path(), &desktop).unwrap();

    SessionStore::ensure_user_profile(&user_dir).unwrap();

    assert!(desktop.is_dir());
    assert!(!desktop.symlink_metadata().unwrap().is_symlink());
    assert!(user_dir
        .join("AppData/Roaming/Microsoft/Windows/Start Menu/Programs")
        .is_dir());
    assert!(user_dir.join("Saved Games").is_dir());
}

#[test]
fn link_user_dir_backs_up_real_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let prefix = tmp.path().join("wineprefix");
    let existing = prefix.join("drive_c/users/winebot");
    fs::create_dir_all(&existing).unwrap();
    fs::write(existing.join("keep.txt"), "data").unwrap();

    let user_dir = tmp.path().join("session/user");
    fs::create_dir_all(&user_dir).unwrap();
    SessionStore::link_user_dir(&user_dir, &prefix).unwrap();

    let link = prefix.join("drive_c/users/winebot");
    assert!(link.symlink_metadata().unwrap().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), user_dir);

    let backups: Vec<_> = fs::read_dir(prefix.join("drive_c/users"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("winebot.bak."))
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].path().join("keep.txt").is_file());
}

#[test]
fn link_user_dir_replaces_previous_link_without_backup() {
    let tmp = tempfile::tempdir().unwrap();
    let prefix = tmp.path().join("wineprefix");
    let user_a = tmp.path().join("a");
    let user_b = tmp.path().join("b");
    fs::create_dir_all(&user_a).unwrap();
    fs::create_dir_all(&user_b).unwrap();

    SessionStore::link_user_dir(&user_a, &prefix).unwrap();
    SessionStore::link_user_dir(&user_b, &prefix).unwrap();

    let link = prefix.join("drive_c/users/winebot");
    assert_eq!(fs::read_link(&link).unwrap(), user_b);
    let backups = fs::read_dir(prefix.join("drive_c/users"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.file_name().to_string_lossy().starts_with("winebot.bak."))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(backups, 0);
}

#[test]
fn list_orders_newest_first_and_caps() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let root = tmp.path().join("sessions");
    fs::create_dir_all(&root).unwrap();
    for name in ["session-a", "session-b", "session-c"] {
        fs::create_dir_all(root.join(name)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    let (_, entries) = store.list(None, 2).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].last_modified_epoch >= entries[1].last_modified_epoch);
}

#[test]
fn list_marks_the_current_session_active() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let dir = store.ensure_session(&ManifestDefaults::default()).unwrap();
    SessionStore::write_state(&dir, "active").unwrap();
    let (_, entries) = store.list(None, 10).unwrap();
    let entry = entries
        .iter()
        .find(|e| e.session_dir == dir)
        .expect("current session listed");
    assert!(entry.active);
    assert!(entry.has_session_json);
    assert_eq!(entry.state.as_deref(), Some("active"));
}

#[test]
fn manifest_resolution_parses() {
    let manifest = SessionManifest {
        schema_version: "1.0".into(),
        session_id: "s".into(),
        start_time_epoch: 1.5,
        start_time_iso: String::new(),
        hostname: String::new(),
        display: ":99".into(),
        resolution: "1920x1080".into(),
        fps: 30,
        git_sha: None,
    };
    assert_eq!(manifest.resolution_wh(), (1920, 1080));
    assert_eq!(manifest.start_time_epoch_ms(), 1500);
}
