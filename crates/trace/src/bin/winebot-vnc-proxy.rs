// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `winebot-vnc-proxy`: RFB tap between the viewer and the VNC server.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use wb_trace::proxy::{serve, ProxyConfig};

#[derive(Parser)]
#[command(name = "winebot-vnc-proxy", about = "WineBot VNC input proxy")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    listen_host: String,
    #[arg(long)]
    listen_port: u16,
    #[arg(long, default_value = "127.0.0.1")]
    target_host: String,
    #[arg(long)]
    target_port: u16,
    #[arg(long)]
    session_dir: PathBuf,
    #[arg(long, default_value_t = 0)]
    sample_motion_ms: u64,
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
    let listener = match TcpListener::bind((cli.listen_host.as_str(), cli.listen_port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, port = cli.listen_port, "bind failed");
            return std::process::ExitCode::FAILURE;
        }
    };
    let config = ProxyConfig {
        target_host: cli.target_host,
        target_port: cli.target_port,
        session_dir: cli.session_dir,
        motion_sample_ms: cli.sample_motion_ms,
    };
    match serve(listener, config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "proxy failed");
            std::process::ExitCode::FAILURE
        }
    }
}
