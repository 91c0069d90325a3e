// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session directory management.
//!
//! A session is a directory under the sessions root plus a pointer file
//! naming the current one. The store owns every write to that layout; other
//! processes only ever append to logs or read sidecars.

use crate::error::StorageError;
use crate::fsio::{atomic_write_small, read_trimmed};
use crate::paths::PathPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use wb_core::session::{generate_session_id, SessionId};
use wb_core::time_fmt::utc_iso_now;
use wb_core::versioning::ARTIFACT_SCHEMA_VERSION;

pub const DEFAULT_SESSION_ROOT: &str = "/artifacts/sessions";
pub const DEFAULT_POINTER_PATH: &str = "/tmp/winebot_current_session";

const SESSION_SUBDIRS: [&str; 4] = ["logs", "screenshots", "scripts", "user"];

const USER_PROFILE_SUBDIRS: [&str; 16] = [
    "AppData/Roaming",
    "AppData/Local",
    "AppData/LocalLow",
    "AppData/Roaming/Microsoft/Windows/Start Menu/Programs",
    "Desktop",
    "Documents",
    "Downloads",
    "Music",
    "Pictures",
    "Videos",
    "Contacts",
    "Favorites",
    "Links",
    "Saved Games",
    "Searches",
    "Temp",
];

/// Capture parameters baked into manifests at session creation.
#[derive(Debug, Clone)]
pub struct ManifestDefaults {
    pub display: String,
    pub resolution: String,
    pub fps: u32,
    pub git_sha: Option<String>,
}

impl Default for ManifestDefaults {
    fn default() -> Self {
        Self {
            display: ":99".to_string(),
            resolution: "1280x720".to_string(),
            fps: 30,
            git_sha: None,
        }
    }
}

/// The immutable `session.json` manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub schema_version: String,
    pub session_id: String,
    pub start_time_epoch: f64,
    pub start_time_iso: String,
    pub hostname: String,
    pub display: String,
    pub resolution: String,
    pub fps: u32,
    pub git_sha: Option<String>,
}

impl SessionManifest {
    pub fn start_time_epoch_ms(&self) -> u64 {
        (self.start_time_epoch * 1000.0) as u64
    }

    /// `WxH` split into integer components; falls back to 1280x720.
    pub fn resolution_wh(&self) -> (u32, u32) {
        let mut it = self.resolution.split('x');
        match (
            it.next().and_then(|w| w.parse().ok()),
            it.next().and_then(|h| h.parse().ok()),
        ) {
            (Some(w), Some(h)) => (w, h),
            _ => (1280, 720),
        }
    }
}

/// One row of `GET /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub active: bool,
    pub state: Option<String>,
    pub has_session_json: bool,
    pub last_modified_epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<SessionManifest>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    pointer_path: PathBuf,
    policy: PathPolicy,
}

impl SessionStore {
    pub fn new(root: PathBuf, pointer_path: PathBuf, policy: PathPolicy) -> Self {
        Self { root, pointer_path, policy }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// The current-session pointer; readers tolerate a missing file.
    pub fn read_pointer(&self) -> Option<PathBuf> {
        read_trimmed(&self.pointer_path).map(PathBuf::from)
    }

    pub fn write_pointer(&self, session_dir: &Path) -> Result<(), StorageError> {
        atomic_write_small(&self.pointer_path, session_dir.as_os_str().as_encoded_bytes())
    }

    /// The current session directory, only if it still exists on disk.
    pub fn current(&self) -> Option<PathBuf> {
        self.read_pointer().filter(|dir| dir.is_dir())
    }

    pub fn session_id_from_dir(session_dir: &Path) -> Option<String> {
        session_dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
    }

    /// Return the current session, creating one when none exists.
    ///
    /// Idempotent: a live pointer to an existing directory only has its
    /// subdirs re-ensured.
    pub fn ensure_session(&self, defaults: &ManifestDefaults) -> Result<PathBuf, StorageError> {
        if let Some(dir) = self.current() {
            Self::ensure_subdirs(&dir)?;
            return Ok(dir);
        }
        let root = self.policy.validate(&self.root)?;
        std::fs::create_dir_all(&root)?;
        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let id = generate_session_id(None, epoch_secs);
        self.create_session(&root, &id, defaults)
    }

    /// Create a fresh session directory with the given id under `root`.
    pub fn create_session(
        &self,
        root: &Path,
        id: &SessionId,
        defaults: &ManifestDefaults,
    ) -> Result<PathBuf, StorageError> {
        let dir = root.join(id.as_str());
        std::fs::create_dir_all(&dir)?;
        self.write_pointer(&dir)?;
        Self::write_manifest(&dir, id.as_str(), defaults)?;
        Self::ensure_subdirs(&dir)?;
        Ok(dir)
    }

    /// Resolve a target session from the usual id/dir/root triple.
    pub fn resolve(
        &self,
        session_id: Option<&str>,
        session_dir: Option<&Path>,
        session_root: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        if let Some(dir) = session_dir {
            let dir = self.policy.validate(dir)?;
            if !dir.is_dir() {
                return Err(StorageError::NotFound(dir));
            }
            return Ok(dir);
        }
        let Some(id) = session_id else {
            return Err(StorageError::BadRequest(
                "provide session_id or session_dir".to_string(),
            ));
        };
        let id = SessionId::parse(id).map_err(|e| StorageError::BadRequest(e.to_string()))?;
        let root = session_root.unwrap_or(&self.root);
        let root = self.policy.validate(root)?;
        let dir = root.join(id.as_str());
        if !dir.is_dir() {
            return Err(StorageError::NotFound(dir));
        }
        Ok(dir)
    }

    pub fn ensure_subdirs(session_dir: &Path) -> Result<(), StorageError> {
        for sub in SESSION_SUBDIRS {
            std::fs::create_dir_all(session_dir.join(sub))?;
        }
        Ok(())
    }

    pub fn write_manifest(
        session_dir: &Path,
        session_id: &str,
        defaults: &ManifestDefaults,
    ) -> Result<(), StorageError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let manifest = SessionManifest {
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            session_id: session_id.to_string(),
            start_time_epoch: now.as_secs_f64(),
            start_time_iso: utc_iso_now(),
            hostname: hostname(),
            display: defaults.display.clone(),
            resolution: defaults.resolution.clone(),
            fps: defaults.fps,
            git_sha: defaults.git_sha.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StorageError::BadRequest(e.to_string()))?;
        atomic_write_small(&session_dir.join("session.json"), &bytes)
    }

    pub fn read_manifest(session_dir: &Path) -> Option<SessionManifest> {
        let content = std::fs::read_to_string(session_dir.join("session.json")).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn write_state(session_dir: &Path, state: &str) -> Result<(), StorageError> {
        atomic_write_small(&session_dir.join("session.state"), state.as_bytes())
    }

    pub fn read_state(session_dir: &Path) -> Option<String> {
        read_trimmed(&session_dir.join("session.state"))
    }

    /// Create the Windows-style profile skeleton under `user_dir`.
    ///
    /// A leftover symlink at any of the profile paths is unlinked and
    /// replaced with a real directory.
    pub fn ensure_user_profile(user_dir: &Path) -> Result<(), StorageError> {
        for sub in USER_PROFILE_SUBDIRS {
            let path = user_dir.join(sub);
            if path.symlink_metadata().map(|m| m.is_symlink()).unwrap_or(false) {
                std::fs::remove_file(&path)?;
            }
            std::fs::create_dir_all(&path)?;
        }
        Ok(())
    }

    /// Point `<wineprefix>/drive_c/users/winebot` at the session's user dir.
    ///
    /// An existing real directory there is preserved as `.bak.<epoch>`.
    pub fn link_user_dir(user_dir: &Path, wineprefix: &Path) -> Result<(), StorageError> {
        let base = wineprefix.join("drive_c").join("users");
        std::fs::create_dir_all(&base)?;
        let target = base.join("winebot");
        match target.symlink_metadata() {
            Ok(meta) if meta.is_symlink() => std::fs::remove_file(&target)?,
            Ok(_) => {
                let epoch = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                let backup = base.join(format!("winebot.bak.{epoch}"));
                std::fs::rename(&target, backup)?;
            }
            Err(_) => {}
        }
        std::os::unix::fs::symlink(user_dir, &target)?;
        Ok(())
    }

    /// Sessions on disk, newest first, capped at `limit`.
    pub fn list(
        &self,
        root: Option<&Path>,
        limit: usize,
    ) -> Result<(PathBuf, Vec<SessionEntry>), StorageError> {
        let root = self.policy.validate(root.unwrap_or(&self.root))?;
        if !root.exists() {
            return Ok((root, Vec::new()));
        }
        let current = self.read_pointer();
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&root)?.flatten() {
            let session_dir = entry.path();
            if !session_dir.is_dir() {
                continue;
            }
            let Some(session_id) = Self::session_id_from_dir(&session_dir) else {
                continue;
            };
            let manifest = Self::read_manifest(&session_dir);
            let last_modified_epoch = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            entries.push(SessionEntry {
                active: current.as_deref() == Some(session_dir.as_path()),
                state: Self::read_state(&session_dir),
                has_session_json: manifest.is_some()
                    || session_dir.join("session.json").exists(),
                session_id,
                session_dir,
                last_modified_epoch,
                manifest,
            });
        }
        entries.sort_by(|a, b| b.last_modified_epoch.cmp(&a.last_modified_epoch));
        entries.truncate(limit);
        Ok((root, entries))
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
