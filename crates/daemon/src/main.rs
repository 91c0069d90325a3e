// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `winebotd`: the WineBot control-plane HTTP daemon.

use clap::Parser;
use wb_daemon::{monitor, routes, AppState, DaemonConfig};
use wb_storage::logs::append_lifecycle_event;

#[derive(Parser)]
#[command(name = "winebotd", about = "WineBot control-plane daemon")]
struct Cli {
    #[arg(long, env = "WINEBOT_API_PORT", default_value_t = 8000)]
    port: u16,
    #[arg(long, default_value = "0.0.0.0")]
    bind_addr: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WINEBOT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DaemonConfig::from_env();
    tracing::info!(
        port = cli.port,
        interactive = config.interactive,
        record_enabled = config.record_enabled,
        "starting winebotd"
    );

    let state = AppState::new(config);
    append_lifecycle_event(
        state.store.current().as_deref(),
        "api_started",
        "API server started",
        "api",
        None,
    );

    let monitor_task = monitor::spawn(state.clone());
    let app = routes::router(state.clone());

    let addr = std::net::SocketAddr::new(cli.bind_addr, cli.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "bind failed");
            return std::process::ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    monitor_task.abort();
    append_lifecycle_event(
        state.store.current().as_deref(),
        "api_stopped",
        "API server stopping",
        "api",
        None,
    );

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server failed");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::warn!(error = %err, "signal handler install failed");
            return std::future::pending().await;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    tracing::info!("shutdown signal received");
}
