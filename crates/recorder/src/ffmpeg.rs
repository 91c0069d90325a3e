// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ffmpeg process wrapper: x11grab capture, stream-copy concat, and
//! subtitle muxing.

use crate::error::RecorderError;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct FfmpegCapture {
    pub display: String,
    pub resolution: String,
    pub fps: u32,
    pub output_file: PathBuf,
    child: Option<Child>,
}

impl FfmpegCapture {
    pub fn new(display: &str, resolution: &str, fps: u32, output_file: PathBuf) -> Self {
        Self {
            display: display.to_string(),
            resolution: resolution.to_string(),
            fps,
            output_file,
            child: None,
        }
    }

    pub fn capture_args(&self, metadata: &[(String, String)]) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "x11grab".to_string(),
            "-draw_mouse".to_string(),
            "1".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
            "-s".to_string(),
            self.resolution.clone(),
            "-i".to_string(),
            self.display.clone(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "ultrafast".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ];
        push_metadata(&mut args, metadata);
        args.push(self.output_file.display().to_string());
        args
    }

    /// Spawn the capture process. Returns the encoder pid.
    pub fn start(&mut self, metadata: &[(String, String)]) -> Result<i32, RecorderError> {
        let args = self.capture_args(metadata);
        tracing::info!(output = %self.output_file.display(), "starting ffmpeg capture");
        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RecorderError::Ffmpeg(e.to_string()))?;
        let pid = child.id().map(|p| p as i32).unwrap_or(0);
        self.child = Some(child);
        Ok(pid)
    }

    /// Terminate the capture: TERM, a grace period, then KILL.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else { return };
        if let Some(pid) = child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        match tokio::time::timeout(STOP_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("ffmpeg did not stop in time; killing");
                let _ = child.kill().await;
            }
        }
    }
}

/// Stream-copy concat of a parts manifest into `output_file`.
pub async fn concat_parts(parts_file: &Path, output_file: &Path) -> Result<(), RecorderError> {
    if !parts_file.exists() {
        return Err(RecorderError::Ffmpeg(format!(
            "parts manifest missing: {}",
            parts_file.display()
        )));
    }
    let args = concat_args(parts_file, output_file);
    run_ffmpeg(&args).await
}

pub fn concat_args(parts_file: &Path, output_file: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        parts_file.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        output_file.display().to_string(),
    ]
}

/// Mux ASS and VTT subtitle tracks into the MKV, stamping container
/// metadata, replacing the file in place on success.
pub async fn mux_subtitles(
    video: &Path,
    ass_file: &Path,
    vtt_file: &Path,
    metadata: &[(String, String)],
) -> Result<(), RecorderError> {
    if !video.exists() {
        return Err(RecorderError::Ffmpeg(format!("cannot mux: {} not found", video.display())));
    }
    let temp_output = video.with_extension("mkv.muxed.mkv");
    let args = mux_args(video, ass_file, vtt_file, metadata, &temp_output);
    match run_ffmpeg(&args).await {
        Ok(()) => {
            std::fs::rename(&temp_output, video)?;
            Ok(())
        }
        Err(err) => {
            let _ = std::fs::remove_file(&temp_output);
            Err(err)
        }
    }
}

pub fn mux_args(
    video: &Path,
    ass_file: &Path,
    vtt_file: &Path,
    metadata: &[(String, String)],
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        ass_file.display().to_string(),
        "-i".to_string(),
        vtt_file.display().to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:s".to_string(),
        "-map".to_string(),
        "2:s".to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-metadata:s:s:0".to_string(),
        "title=Overlays (ASS)".to_string(),
        "-metadata:s:s:1".to_string(),
        "title=Events (VTT)".to_string(),
        "-disposition:s:0".to_string(),
        "default".to_string(),
    ];
    push_metadata(&mut args, metadata);
    args.push(output.display().to_string());
    args
}

fn push_metadata(args: &mut Vec<String>, metadata: &[(String, String)]) {
    for (key, value) in metadata {
        if !value.is_empty() {
            args.push("-metadata".to_string());
            args.push(format!("{key}={value}"));
        }
    }
}

async fn run_ffmpeg(args: &[String]) -> Result<(), RecorderError> {
    tracing::info!(?args, "running ffmpeg");
    let output = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RecorderError::Ffmpeg(e.to_string()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(RecorderError::Ffmpeg(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(test)]
#[path = "ffmpeg_tests.rs"]
mod tests;
