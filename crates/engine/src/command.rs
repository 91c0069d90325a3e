// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External command execution with a bounded wait.
//!
//! A timeout is not an error class here: it comes back as data
//! (`ok: false, error: "timeout"`) because most callers fold the outcome
//! straight into a health or lifecycle payload.

use serde::Serialize;
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: None,
            stderr: None,
            exit_code: None,
            error: Some(message.into()),
        }
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.as_deref().unwrap_or("").trim_end()
    }

    pub fn failure_detail(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.stderr.clone().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "command failed".to_string())
    }
}

/// Run `argv` with captured output and a hard timeout.
pub async fn safe_command<S: AsRef<OsStr>>(argv: &[S], timeout: Duration) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::error("empty command");
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return CommandOutcome::error("command not found");
        }
        Err(err) => return CommandOutcome::error(err.to_string()),
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let gather = async {
        let (status, out, err) = tokio::join!(
            child.wait(),
            read_all(stdout_pipe.as_mut()),
            read_all(stderr_pipe.as_mut()),
        );
        (status, out, err)
    };

    match tokio::time::timeout(timeout, gather).await {
        Ok((Ok(status), out, err)) => CommandOutcome {
            ok: status.success(),
            stdout: Some(String::from_utf8_lossy(&out).trim().to_string()),
            stderr: Some(String::from_utf8_lossy(&err).trim().to_string()),
            exit_code: status.code(),
            error: None,
        },
        Ok((Err(err), _, _)) => CommandOutcome::error(err.to_string()),
        Err(_) => {
            let _ = child.kill().await;
            CommandOutcome::error("timeout")
        }
    }
}

/// `safe_command` with the default 5 s timeout.
pub async fn safe_command_default<S: AsRef<OsStr>>(argv: &[S]) -> CommandOutcome {
    safe_command(argv, DEFAULT_COMMAND_TIMEOUT).await
}

async fn read_all<R: AsyncReadExt + Unpin>(pipe: Option<&mut R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
