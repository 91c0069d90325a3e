// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Automation endpoints: app launch, script runners, window inspection,
//! focus and screenshots. All of them shell out to the container's helper
//! scripts via `safe_command`; the agent-facing mutations are policy-gated
//! and traced with request/complete event pairs.

use super::{epoch_ms_now, truncate_text, which};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AhkModel, AppRunModel, AutoItModel, FocusModel, InspectWindowModel, PythonScriptModel,
    ScreenshotQuery,
};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wb_engine::{safe_command, CommandOutcome};
use wb_storage::logs::append_input_event;
use wb_storage::TraceSource;

const X11_HELPER: &str = "/automation/x11.sh";
const RUN_AHK_HELPER: &str = "/scripts/run-ahk.sh";
const RUN_AUTOIT_HELPER: &str = "/scripts/run-autoit.sh";
const INSPECT_SCRIPT: &str = "/automation/inspect_window.au3";
const SCREENSHOT_HELPER: &str = "/automation/screenshot.sh";
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/apps/run", post(run_app))
        .route("/run/ahk", post(run_ahk))
        .route("/run/autoit", post(run_autoit))
        .route("/run/python", post(run_python))
        .route("/inspect/window", post(inspect_window))
        .route("/windows", get(list_windows))
        .route("/windows/active", get(active_window))
        .route("/windows/search", get(search_windows))
        .route("/windows/focus", post(focus_window))
        .route("/screenshot", get(screenshot))
}

fn check_access(state: &AppState) -> ApiResult<()> {
    if state.broker.check_access() {
        Ok(())
    } else {
        Err(ApiError::PolicyDenied)
    }
}

const WINDOWS_EXTENSIONS: [&str; 4] = [".exe", ".bat", ".msi", ".cmd"];

/// A bare program name with no separators; Wine or PATH resolves it, so
/// the path policy has nothing to say about it.
fn is_naked_filename(path: &str) -> bool {
    !path.contains('/') && !path.contains('\\')
}

fn has_windows_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    WINDOWS_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

async fn run_app(
    State(state): State<AppState>,
    Json(data): Json<AppRunModel>,
) -> ApiResult<Json<Value>> {
    check_access(&state)?;
    let app_path = data.path.clone();

    // Path-like targets must live under an allowed prefix; naked
    // filenames (notepad.exe, cmd.exe) skip validation on purpose.
    if !is_naked_filename(&app_path) {
        state
            .store
            .policy()
            .validate(Path::new(&app_path))
            .map_err(ApiError::from)?;
    }

    // Wine-vs-native dispatch: Windows extensions always go through
    // wine; a naked name prefers a native binary when one is on PATH;
    // an absolute non-Windows path runs natively.
    let is_windows = has_windows_extension(&app_path);
    let mut argv: Vec<String> = if is_windows {
        vec!["wine".to_string(), app_path.clone()]
    } else if !Path::new(&app_path).is_absolute() {
        if which(&app_path).is_some() {
            vec![app_path.clone()]
        } else {
            vec!["wine".to_string(), app_path.clone()]
        }
    } else {
        vec![app_path.clone()]
    };
    argv.extend(data.args.split_whitespace().map(str::to_string));

    if data.detach {
        let (program, args) = (argv[0].clone(), argv[1..].to_vec());
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        let child = cmd
            .spawn()
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let pid = child.id();
        state.registry.track(child);
        return Ok(Json(json!({ "status": "detached", "pid": pid, "path": app_path })));
    }

    let outcome = safe_command(&argv, SCRIPT_TIMEOUT).await;
    if !outcome.ok {
        return Ok(Json(json!({
            "status": "error",
            "path": app_path,
            "exit_code": outcome.exit_code,
            "stdout": outcome.stdout,
            "stderr": outcome.stderr,
            "error": outcome.error,
        })));
    }
    Ok(Json(json!({
        "status": "completed",
        "path": app_path,
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
    })))
}

/// Write the posted script into the session's `scripts/` directory, run
/// it through its helper, and record an `agent_script` trace pair.
async fn run_session_script(
    state: &AppState,
    script: &str,
    script_type: &str,
    extension: &str,
    tool: &str,
    build_argv: impl FnOnce(&Path, &Path) -> Vec<String>,
) -> ApiResult<Json<Value>> {
    check_access(state)?;
    let session_dir = state.store.ensure_session(&state.config.manifest_defaults())?;
    let script_dir = session_dir.join("scripts");
    let log_dir = session_dir.join("logs");
    std::fs::create_dir_all(&script_dir).map_err(|e| ApiError::Internal(e.to_string()))?;
    std::fs::create_dir_all(&log_dir).map_err(|e| ApiError::Internal(e.to_string()))?;

    let stamp = epoch_ms_now() / 1000;
    let script_path = script_dir.join(format!("api_script_{stamp}.{extension}"));
    let log_path = log_dir.join(format!(
        "{}.log",
        script_path.file_name().and_then(|n| n.to_str()).unwrap_or("api_script")
    ));
    std::fs::write(&script_path, script).map_err(|e| ApiError::Internal(e.to_string()))?;

    let trace_id = uuid::Uuid::new_v4().simple().to_string();
    log_script_event(&session_dir, json!({
        "event": "agent_script",
        "phase": "request",
        "origin": "agent",
        "source": "api",
        "tool": tool,
        "script_type": script_type,
        "script_path": script_path,
        "script_length": script.len(),
        "trace_id": trace_id,
    }));

    let argv = build_argv(&script_path, &log_path);
    let outcome = safe_command(&argv, SCRIPT_TIMEOUT).await;
    let status = if outcome.ok { "success" } else { "error" };
    let log_tail = wb_storage::fsio::read_file_tail(&log_path, 4096);

    log_script_event(&session_dir, json!({
        "event": "agent_script",
        "phase": "complete",
        "origin": "agent",
        "source": "api",
        "tool": tool,
        "script_type": script_type,
        "script_path": script_path,
        "script_length": script.len(),
        "trace_id": trace_id,
        "status": status,
        "exit_code": outcome.exit_code,
        "log_tail": truncate_text(&log_tail, 4000),
    }));

    Ok(Json(script_outcome(status, &trace_id, &outcome, &log_path)))
}

fn log_script_event(session_dir: &Path, event: Value) {
    if let Err(err) = append_input_event(session_dir, TraceSource::Canonical, event) {
        tracing::warn!(error = %err, "agent script event append failed");
    }
}

fn script_outcome(status: &str, trace_id: &str, outcome: &CommandOutcome, log_path: &Path) -> Value {
    json!({
        "status": status,
        "trace_id": trace_id,
        "exit_code": outcome.exit_code,
        "stdout": truncate_text(outcome.stdout.as_deref().unwrap_or(""), 4000),
        "stderr": truncate_text(outcome.stderr.as_deref().unwrap_or(""), 4000),
        "error": outcome.error,
        "log_path": log_path,
    })
}

async fn run_ahk(
    State(state): State<AppState>,
    Json(data): Json<AhkModel>,
) -> ApiResult<Json<Value>> {
    let focus_title = data.focus_title.clone();
    run_session_script(&state, &data.script, "ahk", "ahk", "api:/run/ahk", move |script, log| {
        let mut argv = vec![
            RUN_AHK_HELPER.to_string(),
            script.display().to_string(),
            "--log".to_string(),
            log.display().to_string(),
        ];
        if let Some(title) = focus_title {
            argv.push("--focus-title".to_string());
            argv.push(title);
        }
        argv
    })
    .await
}

async fn run_autoit(
    State(state): State<AppState>,
    Json(data): Json<AutoItModel>,
) -> ApiResult<Json<Value>> {
    let focus_title = data.focus_title.clone();
    run_session_script(&state, &data.script, "autoit", "au3", "api:/run/autoit", move |script, log| {
        let mut argv = vec![
            RUN_AUTOIT_HELPER.to_string(),
            script.display().to_string(),
            "--log".to_string(),
            log.display().to_string(),
        ];
        if let Some(title) = focus_title {
            argv.push("--focus-title".to_string());
            argv.push(title);
        }
        argv
    })
    .await
}

async fn run_python(
    State(state): State<AppState>,
    Json(data): Json<PythonScriptModel>,
) -> ApiResult<Json<Value>> {
    run_session_script(&state, &data.script, "python", "py", "api:/run/python", |script, _log| {
        vec!["winpy".to_string(), script.display().to_string()]
    })
    .await
}

async fn inspect_window(
    State(state): State<AppState>,
    Json(data): Json<InspectWindowModel>,
) -> ApiResult<Json<Value>> {
    check_access(&state)?;
    if !data.list_only && data.title.is_none() && data.handle.is_none() {
        return Err(ApiError::BadRequest(
            "Provide 'title' or 'handle', or set list_only=true.".to_string(),
        ));
    }
    let session_dir = state.store.ensure_session(&state.config.manifest_defaults())?;
    let log_path = session_dir
        .join("logs")
        .join(format!("api_inspect_{}.log", epoch_ms_now() / 1000));

    let mut argv: Vec<String> = vec![
        RUN_AUTOIT_HELPER.to_string(),
        INSPECT_SCRIPT.to_string(),
        "--log".to_string(),
        log_path.display().to_string(),
    ];
    if data.list_only {
        argv.push("--list".to_string());
    }
    if data.include_empty {
        argv.push("--include-empty".to_string());
    }
    if let Some(title) = &data.title {
        argv.push("--title".to_string());
        argv.push(title.clone());
    }
    if !data.text.is_empty() {
        argv.push("--text".to_string());
        argv.push(data.text.clone());
    }
    if let Some(handle) = &data.handle {
        argv.push("--handle".to_string());
        argv.push(handle.clone());
    }
    if !data.include_controls {
        argv.push("--no-controls".to_string());
    }
    argv.push("--max-controls".to_string());
    argv.push(data.max_controls.to_string());

    let outcome = safe_command(&argv, SCRIPT_TIMEOUT).await;
    if !outcome.ok {
        let log = std::fs::read_to_string(&log_path).unwrap_or_default();
        return Ok(Json(json!({
            "status": "error",
            "exit_code": outcome.exit_code,
            "stderr": outcome.stderr,
            "error": outcome.error,
            "log": log,
        })));
    }

    let log = std::fs::read_to_string(&log_path)
        .map_err(|_| ApiError::Internal("Inspect log not found.".to_string()))?;
    let trimmed = log.trim();
    if trimmed.is_empty() {
        return Ok(Json(json!({ "status": "error", "log": "" })));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(payload) => Ok(Json(json!({ "status": "success", "result": payload }))),
        Err(_) => Ok(Json(json!({ "status": "error", "log": trimmed }))),
    }
}

async fn list_windows() -> ApiResult<Json<Value>> {
    let listing = safe_command(&[X11_HELPER, "list-windows"], Duration::from_secs(5)).await;
    if !listing.ok {
        return Err(ApiError::Internal(listing.failure_detail()));
    }
    let windows = super::health::parse_window_listing(listing.stdout.as_deref().unwrap_or(""));
    Ok(Json(json!({ "windows": windows })))
}

async fn active_window() -> ApiResult<Json<Value>> {
    let outcome = safe_command(&[X11_HELPER, "active-window"], Duration::from_secs(5)).await;
    if !outcome.ok {
        return Err(ApiError::Internal(outcome.failure_detail()));
    }
    Ok(Json(json!({ "id": outcome.stdout_trimmed() })))
}

#[derive(Debug, serde::Deserialize)]
struct WindowSearchQuery {
    name: String,
}

async fn search_windows(Query(query): Query<WindowSearchQuery>) -> Json<Value> {
    let outcome = safe_command(
        &[X11_HELPER, "search", "--name", &query.name],
        Duration::from_secs(5),
    )
    .await;
    // An empty result is not an error; xdotool returns nothing on no match.
    let matches: Vec<&str> = outcome
        .stdout
        .as_deref()
        .map(|s| s.lines().filter(|l| !l.is_empty()).collect())
        .unwrap_or_default();
    Json(json!({ "matches": matches }))
}

async fn focus_window(
    State(state): State<AppState>,
    Json(data): Json<FocusModel>,
) -> ApiResult<Json<Value>> {
    check_access(&state)?;
    let outcome = safe_command(&[X11_HELPER, "focus", &data.window_id], Duration::from_secs(5)).await;
    if !outcome.ok {
        return Err(ApiError::Internal(outcome.failure_detail()));
    }
    Ok(Json(json!({ "status": "focused", "id": data.window_id })))
}

async fn screenshot(
    State(state): State<AppState>,
    Query(query): Query<ScreenshotQuery>,
) -> ApiResult<axum::response::Response> {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let filename = format!("screenshot_{}.png", epoch_ms_now() / 1000);

    let target_dir: PathBuf = match &query.output_dir {
        Some(dir) => dir.clone(),
        None => {
            let session_dir = state.store.ensure_session(&state.config.manifest_defaults())?;
            session_dir.join("screenshots")
        }
    };
    let safe_dir = state.store.policy().validate(&target_dir)?;
    std::fs::create_dir_all(&safe_dir).map_err(|e| ApiError::Internal(e.to_string()))?;
    let filepath = safe_dir.join(filename);

    let mut argv: Vec<String> = vec![
        SCREENSHOT_HELPER.to_string(),
        "--window".to_string(),
        query.window_id.clone(),
        "--delay".to_string(),
        query.delay.to_string(),
    ];
    if let Some(label) = &query.label {
        argv.push("--label".to_string());
        argv.push(label.clone());
    }
    argv.push("--request-id".to_string());
    argv.push(request_id.clone());
    if let Some(tag) = &query.tag {
        argv.push("--tag".to_string());
        argv.push(tag.clone());
    }
    argv.push(filepath.display().to_string());

    let outcome = safe_command(&argv, Duration::from_secs(15)).await;
    if !outcome.ok || !filepath.exists() {
        return Err(ApiError::Internal("Screenshot failed to generate".to_string()));
    }

    let bytes = tokio::fs::read(&filepath)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert("x-request-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(&filepath.display().to_string()) {
        headers.insert("x-screenshot-path", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}.json", filepath.display())) {
        headers.insert("x-screenshot-metadata-path", value);
    }
    Ok((StatusCode::OK, headers, bytes).into_response())
}
