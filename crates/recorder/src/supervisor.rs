// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recorder process itself: part lifecycle, signal handling, and the
//! stop-time finaliser.

use crate::error::RecorderError;
use crate::ffmpeg::{self, FfmpegCapture};
use crate::model::{self, append_event, Pos, RecorderEvent};
use crate::subtitles::SubtitleGenerator;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::signal::unix::{signal, SignalKind};
use wb_core::time_fmt::utc_iso_now;
use wb_core::versioning::ARTIFACT_SCHEMA_VERSION;
use wb_core::RecorderState;
use wb_storage::fsio::{atomic_write_small, read_trimmed};
use wb_storage::logs::append_lifecycle_event;
use wb_storage::segments;
use wb_storage::sidecar;
use wb_storage::{ManifestDefaults, SessionManifest, SessionStore};

const SEGMENT_POINTER: &str = "segment.current";
const EVENTS_POINTER: &str = "events.current";

#[derive(Debug, Clone)]
pub struct StartArgs {
    pub session_dir: PathBuf,
    pub display: String,
    pub resolution: String,
    pub fps: u32,
    pub segment: Option<u32>,
}

/// Whether input-trace events are folded into subtitles.
fn input_recording_enabled() -> bool {
    std::env::var("WINEBOT_INPUT_TRACE_RECORD").as_deref() == Ok("1")
}

fn input_fold_limit() -> usize {
    std::env::var("WINEBOT_RECORD_INPUT_MAX_EVENTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(50_000)
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn read_current_segment(session_dir: &Path) -> Option<u32> {
    read_trimmed(&session_dir.join(SEGMENT_POINTER))?.parse().ok()
}

pub fn read_current_events_path(session_dir: &Path) -> Option<PathBuf> {
    read_trimmed(&session_dir.join(EVENTS_POINTER)).map(PathBuf::from)
}

/// Resolve the active manifest: the current segment's if one is recording,
/// else the session manifest. Returns `(session_id, start_epoch_ms)`.
pub fn load_active_manifest(session_dir: &Path) -> Option<(String, u64)> {
    if let Some(segment) = read_current_segment(session_dir) {
        let path = segments::segment_manifest_path(session_dir, segment);
        if let Some(found) = manifest_fields(&path) {
            return Some(found);
        }
    }
    manifest_fields(&session_dir.join("session.json"))
}

fn manifest_fields(path: &Path) -> Option<(String, u64)> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&content).ok()?;
    let session_id = value.get("session_id")?.as_str()?.to_string();
    let epoch_secs = value.get("start_time_epoch")?.as_f64()?;
    Some((session_id, (epoch_secs * 1000.0) as u64))
}

/// Parse an `x,y` or `x,y,w,h` position argument.
pub fn parse_pos(spec: &str) -> Option<Pos> {
    let parts: Vec<i64> = spec.split(',').map(|p| p.trim().parse().ok()).collect::<Option<_>>()?;
    match parts.as_slice() {
        [x, y] => Some(Pos { x: *x, y: *y, w: 0, h: 0 }),
        [x, y, w, h] => Some(Pos { x: *x, y: *y, w: *w, h: *h }),
        _ => None,
    }
}

fn container_metadata(manifest: &SessionManifest) -> Vec<(String, String)> {
    vec![
        ("title".to_string(), manifest.session_id.clone()),
        ("encoder".to_string(), "WineBot Recorder".to_string()),
        ("creation_time".to_string(), utc_iso_now()),
        ("WINEBOT_SESSION_ID".to_string(), manifest.session_id.clone()),
        (
            "WINEBOT_GIT_SHA".to_string(),
            manifest.git_sha.clone().unwrap_or_default(),
        ),
        ("WINEBOT_HOSTNAME".to_string(), manifest.hostname.clone()),
        ("WINEBOT_DISPLAY".to_string(), manifest.display.clone()),
    ]
}

struct SegmentPaths {
    output_file: PathBuf,
    events_path: PathBuf,
    vtt_path: PathBuf,
    ass_path: PathBuf,
}

fn segment_paths(session_dir: &Path, segment: Option<u32>) -> SegmentPaths {
    match segment {
        Some(segment) => SegmentPaths {
            output_file: segments::video_path(session_dir, segment),
            events_path: segments::events_path(session_dir, segment),
            vtt_path: segments::vtt_path(session_dir, segment),
            ass_path: segments::ass_path(session_dir, segment),
        },
        None => SegmentPaths {
            output_file: session_dir.join("video.mkv"),
            events_path: session_dir.join("events.jsonl"),
            vtt_path: session_dir.join("events.vtt"),
            ass_path: session_dir.join("events.ass"),
        },
    }
}

struct Recorder {
    args: StartArgs,
    manifest: SessionManifest,
    paths: SegmentPaths,
    parts_file: Option<PathBuf>,
    capture: Option<FfmpegCapture>,
    start_monotonic: Instant,
    paused: bool,
}

impl Recorder {
    fn t_rel(&self) -> i64 {
        self.start_monotonic.elapsed().as_millis() as i64
    }

    fn log_event(&self, kind: &str, message: &str) {
        let event = RecorderEvent::new(
            self.manifest.session_id.clone(),
            self.t_rel(),
            epoch_ms(),
            kind,
            message,
        );
        if let Err(err) = append_event(&self.paths.events_path, &event) {
            tracing::warn!(kind, error = %err, "event append failed");
        }
    }

    fn start_part(&mut self) -> Result<(), RecorderError> {
        let dir = &self.args.session_dir;
        let output = match self.args.segment {
            Some(segment) => {
                let part = segments::next_part_index(dir, segment)?;
                let output = segments::part_video_path(dir, segment, part);
                if let Some(parts_file) = &self.parts_file {
                    segments::append_part(parts_file, &output)?;
                }
                output
            }
            None => self.paths.output_file.clone(),
        };

        let mut capture = FfmpegCapture::new(
            &self.args.display,
            &self.args.resolution,
            self.args.fps,
            output,
        );
        let pid = capture.start(&container_metadata(&self.manifest))?;
        if pid > 0 {
            atomic_write_small(&sidecar::ffmpeg_pid_path(dir), pid.to_string().as_bytes())?;
        }
        sidecar::write_recorder_state(dir, RecorderState::Recording)?;
        self.capture = Some(capture);
        Ok(())
    }

    async fn stop_part(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop().await;
        }
        let _ = std::fs::remove_file(sidecar::ffmpeg_pid_path(&self.args.session_dir));
    }

    async fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.stop_part().await;
        self.log_event("recorder_pause", "Recorder pause");
        let _ = sidecar::write_recorder_state(&self.args.session_dir, RecorderState::Paused);
        self.paused = true;
    }

    async fn resume(&mut self) {
        if !self.paused {
            return;
        }
        if let Err(err) = self.start_part() {
            tracing::error!(error = %err, "part restart failed");
            return;
        }
        self.log_event("recorder_resume", "Recorder resume");
        self.paused = false;
    }

    async fn finalise(&mut self) {
        let dir = self.args.session_dir.clone();
        self.log_event("recorder_stop", "Recorder stopped");
        if !self.paused {
            self.stop_part().await;
        }

        tracing::info!("generating subtitles");
        let mut events = model::adjust_events_for_pauses(model::load_events(&self.paths.events_path));
        if input_recording_enabled() {
            let folded = model::load_input_trace_events(
                &dir,
                self.manifest.start_time_epoch_ms(),
                input_fold_limit(),
            );
            events.extend(folded);
            events.sort_by_key(|e| e.t_rel_ms);
        }
        let generator = SubtitleGenerator::new(events);
        let (width, height) = self.manifest.resolution_wh();
        if let Err(err) = std::fs::write(&self.paths.vtt_path, generator.generate_vtt()) {
            tracing::warn!(error = %err, "vtt write failed");
        }
        if let Err(err) = std::fs::write(&self.paths.ass_path, generator.generate_ass(width, height))
        {
            tracing::warn!(error = %err, "ass write failed");
        }

        let metadata = container_metadata(&self.manifest);
        let mut final_output = self.paths.output_file.clone();
        if let Some(segment) = self.args.segment {
            final_output = segments::video_path(&dir, segment);
            if let Some(parts_file) = self.parts_file.as_deref().filter(|p| p.exists()) {
                if let Err(err) = ffmpeg::concat_parts(parts_file, &final_output).await {
                    tracing::error!(error = %err, "part concatenation failed");
                    append_lifecycle_event(
                        Some(&dir),
                        "recorder_finalise_failed",
                        "Part concatenation failed",
                        "recorder",
                        Some(serde_json::json!({ "error": err.to_string() })),
                    );
                }
            }
        }
        if let Err(err) =
            ffmpeg::mux_subtitles(&final_output, &self.paths.ass_path, &self.paths.vtt_path, &metadata)
                .await
        {
            tracing::error!(error = %err, "subtitle mux failed");
            append_lifecycle_event(
                Some(&dir),
                "recorder_finalise_failed",
                "Subtitle mux failed",
                "recorder",
                Some(serde_json::json!({ "error": err.to_string() })),
            );
        }

        // Release the sidecars whatever happened above, so the next start
        // is never wedged on a stale pid.
        for name in ["recorder.pid", "ffmpeg.pid", "recorder.state", SEGMENT_POINTER, EVENTS_POINTER]
        {
            let _ = std::fs::remove_file(dir.join(name));
        }
    }
}

/// `winebot-recorder start`: record until told otherwise.
pub async fn run_start(args: StartArgs) -> Result<(), RecorderError> {
    let dir = args.session_dir.clone();
    std::fs::create_dir_all(&dir)?;
    atomic_write_small(
        &sidecar::recorder_pid_path(&dir),
        std::process::id().to_string().as_bytes(),
    )?;

    if !dir.join("session.json").exists() {
        let session_id = SessionStore::session_id_from_dir(&dir).unwrap_or_default();
        let defaults = ManifestDefaults {
            display: args.display.clone(),
            resolution: args.resolution.clone(),
            fps: args.fps,
            git_sha: std::env::var("GIT_SHA").ok(),
        };
        SessionStore::write_manifest(&dir, &session_id, &defaults)?;
    }
    let manifest = SessionStore::read_manifest(&dir).ok_or_else(|| RecorderError::NoManifest(dir.clone()))?;

    let paths = segment_paths(&dir, args.segment);
    let mut parts_file = None;
    if let Some(segment) = args.segment {
        write_segment_manifest(&dir, &manifest, &args, segment)?;
        atomic_write_small(&dir.join(SEGMENT_POINTER), segment.to_string().as_bytes())?;
        atomic_write_small(
            &dir.join(EVENTS_POINTER),
            paths.events_path.as_os_str().as_encoded_bytes(),
        )?;
        parts_file = Some(segments::parts_file_path(&dir, segment));
    }

    let mut recorder = Recorder {
        args,
        manifest,
        paths,
        parts_file,
        capture: None,
        start_monotonic: Instant::now(),
        paused: false,
    };
    recorder.start_part()?;
    recorder.log_event("lifecycle", "Session started");
    recorder.log_event("recorder_start", "Recorder started");

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    tracing::info!("recording active, waiting for signals");
    loop {
        tokio::select! {
            _ = term.recv() => break,
            _ = int.recv() => break,
            _ = usr1.recv() => recorder.pause().await,
            _ = usr2.recv() => recorder.resume().await,
        }
    }
    recorder.finalise().await;
    Ok(())
}

fn write_segment_manifest(
    session_dir: &Path,
    manifest: &SessionManifest,
    args: &StartArgs,
    segment: u32,
) -> Result<(), RecorderError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let value = serde_json::json!({
        "schema_version": ARTIFACT_SCHEMA_VERSION,
        "session_id": manifest.session_id,
        "segment": segment,
        "start_time_epoch": now.as_secs_f64(),
        "start_time_iso": utc_iso_now(),
        "hostname": manifest.hostname,
        "display": args.display,
        "resolution": args.resolution,
        "fps": args.fps,
        "git_sha": manifest.git_sha,
    });
    atomic_write_small(
        &segments::segment_manifest_path(session_dir, segment),
        &serde_json::to_vec(&value)?,
    )?;
    Ok(())
}

/// `winebot-recorder stop`: SIGTERM the recorder and wait for it to clean
/// up after itself.
pub async fn run_stop(session_dir: &Path) -> Result<(), RecorderError> {
    let pid_path = sidecar::recorder_pid_path(session_dir);
    let Some(pid) = sidecar::read_pid(&pid_path) else {
        return Err(RecorderError::NotRunning(session_dir.to_path_buf()));
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        tracing::warn!(pid, error = %err, "recorder process not found");
        return Err(RecorderError::NotRunning(session_dir.to_path_buf()));
    }
    tracing::info!(pid, "sent SIGTERM to recorder");
    for _ in 0..10 {
        if !pid_path.exists() {
            tracing::info!("recorder stopped");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    tracing::warn!("recorder pid file still present after 5s");
    Ok(())
}

/// Signal the running recorder (pause/resume).
pub fn signal_recorder(session_dir: &Path, sig: Signal) -> Result<(), RecorderError> {
    let Some(pid) = sidecar::recorder_pid(session_dir) else {
        return Err(RecorderError::NotRunning(session_dir.to_path_buf()));
    };
    kill(Pid::from_raw(pid), sig)
        .map_err(|_| RecorderError::NotRunning(session_dir.to_path_buf()))
}

/// `winebot-recorder annotate`: stamp a positioned note into the active
/// segment's event log.
pub fn run_annotate(
    session_dir: &Path,
    text: &str,
    kind: &str,
    pos: Option<&str>,
    style: Option<&str>,
    source: Option<&str>,
) -> Result<(), RecorderError> {
    let (session_id, start_epoch_ms) = load_active_manifest(session_dir)
        .ok_or_else(|| RecorderError::NoManifest(session_dir.to_path_buf()))?;
    let now = epoch_ms();
    let mut event = RecorderEvent::new(
        session_id,
        now.saturating_sub(start_epoch_ms) as i64,
        now,
        kind,
        text,
    );
    event.pos = pos.and_then(parse_pos);
    event.style = style.map(|raw| {
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({ "raw": raw }))
    });
    event.source = source.map(str::to_string);

    let events_path = read_current_events_path(session_dir)
        .unwrap_or_else(|| session_dir.join("events.jsonl"));
    append_event(&events_path, &event)
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
