// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifiers.
//!
//! A session id doubles as its directory name under the sessions root, so
//! anything that could escape the root (separators, `..`) is rejected at
//! parse time rather than at the filesystem boundary.

use crate::time_fmt::utc_date_from_epoch_secs;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session id must not be empty")]
    Empty,
    #[error("session id must not contain path separators or '..'")]
    Unsafe,
}

/// Unique identifier for one end-to-end session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Validate a caller-supplied id.
    pub fn parse(id: impl Into<String>) -> Result<Self, SessionIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if id.contains('/') || id.contains(std::path::MAIN_SEPARATOR) || id.contains("..") {
            return Err(SessionIdError::Unsafe);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Generate a fresh session id: `session-YYYY-MM-DD-<epoch>-<6hex>[-<label>]`.
///
/// The label is sanitised to `[A-Za-z0-9._-]`; runs of anything else
/// collapse to a single dash. An empty label after sanitising is dropped.
pub fn generate_session_id(label: Option<&str>, epoch_secs: u64) -> SessionId {
    let date = utc_date_from_epoch_secs(epoch_secs);
    let hex = uuid::Uuid::new_v4().simple().to_string();
    let rand = &hex[..6];
    let mut id = format!("session-{date}-{epoch_secs}-{rand}");
    if let Some(label) = label {
        let safe = sanitize_label(label);
        if !safe.is_empty() {
            id.push('-');
            id.push_str(&safe);
        }
    }
    SessionId(id)
}

fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_dash = false;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
            last_dash = ch == '-';
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
