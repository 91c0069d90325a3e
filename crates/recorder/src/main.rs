// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `winebot-recorder`: the segment recorder process.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wb_recorder::supervisor::{self, StartArgs};

#[derive(Parser)]
#[command(name = "winebot-recorder", about = "WineBot segment recorder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start recording into the session directory and wait for signals.
    Start {
        #[arg(long)]
        session_dir: PathBuf,
        #[arg(long, default_value = ":99")]
        display: String,
        #[arg(long, default_value = "1920x1080")]
        resolution: String,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        #[arg(long)]
        segment: Option<u32>,
    },
    /// Stop the running recorder and wait for it to finalise.
    Stop {
        #[arg(long)]
        session_dir: PathBuf,
    },
    /// Pause the running recorder (ends the current part).
    Pause {
        #[arg(long)]
        session_dir: PathBuf,
    },
    /// Resume a paused recorder (starts the next part).
    Resume {
        #[arg(long)]
        session_dir: PathBuf,
    },
    /// Append an annotation event to the active segment.
    Annotate {
        #[arg(long)]
        session_dir: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "annotation")]
        kind: String,
        /// `x,y` or `x,y,w,h`
        #[arg(long)]
        pos: Option<String>,
        /// JSON style object
        #[arg(long)]
        style: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WINEBOT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Start { session_dir, display, resolution, fps, segment } => {
            supervisor::run_start(StartArgs { session_dir, display, resolution, fps, segment }).await
        }
        Command::Stop { session_dir } => supervisor::run_stop(&session_dir).await,
        Command::Pause { session_dir } => {
            supervisor::signal_recorder(&session_dir, nix::sys::signal::Signal::SIGUSR1)
        }
        Command::Resume { session_dir } => {
            supervisor::signal_recorder(&session_dir, nix::sys::signal::Signal::SIGUSR2)
        }
        Command::Annotate { session_dir, text, kind, pos, style, source } => supervisor::run_annotate(
            &session_dir,
            &text,
            &kind,
            pos.as_deref(),
            style.as_deref(),
            source.as_deref(),
        ),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "recorder command failed");
            std::process::ExitCode::FAILURE
        }
    }
}
