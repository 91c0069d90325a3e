// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `winebot-input-trace`: X11 input tracer processes (canonical XI2 and
//! x11_core layers).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wb_storage::TraceSource;
use wb_trace::runner;

#[derive(Args)]
struct Target {
    #[arg(long)]
    session_dir: PathBuf,
}

#[derive(Parser)]
#[command(name = "winebot-input-trace", about = "WineBot X11 input tracers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// XI2 test stream tracer (canonical input_events.jsonl).
    #[command(subcommand)]
    Canonical(Action),
    /// Per-device core event tracer (input_events_x11_core.jsonl).
    #[command(subcommand)]
    X11core(Action),
}

#[derive(Subcommand)]
enum Action {
    /// Run the tracer in the foreground until signalled.
    Start {
        #[command(flatten)]
        target: Target,
        /// Keep raw xinput block lines on each event.
        #[arg(long)]
        include_raw: bool,
        /// Drop motion events closer together than this.
        #[arg(long, default_value_t = 0)]
        motion_sample_ms: u64,
    },
    /// Signal a running tracer to stop.
    Stop {
        #[command(flatten)]
        target: Target,
    },
    /// Print the tracer's status as JSON.
    Status {
        #[command(flatten)]
        target: Target,
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
    let (source, action) = match cli.command {
        Command::Canonical(action) => (TraceSource::Canonical, action),
        Command::X11core(action) => (TraceSource::X11Core, action),
    };

    let result = match action {
        Action::Start { target, include_raw, motion_sample_ms } => match source {
            TraceSource::Canonical => {
                runner::run_canonical(&target.session_dir, include_raw, motion_sample_ms).await
            }
            _ => runner::run_x11_core(&target.session_dir, motion_sample_ms).await,
        },
        Action::Stop { target } => {
            runner::stop_tracer(&target.session_dir, source);
            Ok(())
        }
        Action::Status { target } => {
            println!("{}", runner::status(&target.session_dir, source));
            Ok(())
        }
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "input trace failed");
            std::process::ExitCode::FAILURE
        }
    }
}
