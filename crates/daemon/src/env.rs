// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Bearer token required on non-`/ui` requests when set.
pub fn api_token() -> Option<String> {
    std::env::var("API_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Sessions root: `WINEBOT_SESSION_ROOT` > /artifacts/sessions
pub fn session_root() -> PathBuf {
    std::env::var("WINEBOT_SESSION_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(wb_storage::session::DEFAULT_SESSION_ROOT))
}

/// Recording endpoints are gated on `WINEBOT_RECORD=1`.
pub fn record_enabled() -> bool {
    std::env::var("WINEBOT_RECORD").as_deref() == Ok("1")
}

/// Default backend for the windows tracer (`auto|ahk|hook`).
pub fn windows_backend() -> String {
    std::env::var("WINEBOT_INPUT_TRACE_WINDOWS_BACKEND").unwrap_or_else(|_| "auto".to_string())
}

/// Whether the network (VNC proxy) trace is expected to be running.
pub fn network_trace_enabled() -> bool {
    std::env::var("WINEBOT_INPUT_TRACE_NETWORK").as_deref() == Ok("1")
}

pub fn display() -> String {
    std::env::var("DISPLAY").unwrap_or_else(|_| ":99".to_string())
}

/// Raw `SCREEN` value, e.g. `1920x1080x24`.
pub fn screen() -> String {
    std::env::var("SCREEN").unwrap_or_else(|_| "1920x1080".to_string())
}

/// `WxH` from a `SCREEN`-style value (depth suffix dropped).
pub fn parse_resolution(screen: &str) -> String {
    let parts: Vec<&str> = screen.split('x').collect();
    if parts.len() >= 2 {
        format!("{}x{}", parts[0], parts[1])
    } else if screen.is_empty() {
        "1920x1080".to_string()
    } else {
        screen.to_string()
    }
}

pub fn wineprefix() -> PathBuf {
    std::env::var("WINEPREFIX")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/wineprefix"))
}

/// Interactive containers give the human viewer control by default.
pub fn interactive() -> bool {
    std::env::var("MODE").as_deref() == Ok("interactive")
}

/// Path of a sibling helper binary, preferring the daemon's own directory
/// so a plain `cargo install`/container layout both work.
pub fn sibling_binary(name: &str) -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn resolution_parses_screen_values() {
        assert_eq!(parse_resolution("1920x1080x24"), "1920x1080");
        assert_eq!(parse_resolution("1280x720"), "1280x720");
        assert_eq!(parse_resolution("1024"), "1024");
        assert_eq!(parse_resolution(""), "1920x1080");
    }

    #[test]
    #[serial]
    fn api_token_ignores_empty_values() {
        std::env::set_var("API_TOKEN", "");
        assert_eq!(api_token(), None);
        std::env::set_var("API_TOKEN", "secret");
        assert_eq!(api_token(), Some("secret".to_string()));
        std::env::remove_var("API_TOKEN");
        assert_eq!(api_token(), None);
    }

    #[test]
    #[serial]
    fn record_gate_requires_exactly_one() {
        std::env::set_var("WINEBOT_RECORD", "0");
        assert!(!record_enabled());
        std::env::set_var("WINEBOT_RECORD", "1");
        assert!(record_enabled());
        std::env::remove_var("WINEBOT_RECORD");
        assert!(!record_enabled());
    }
}
