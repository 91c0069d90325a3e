// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP proxy between the viewer and the VNC server, tapping the
//! client-to-server byte stream for the network trace layer.
//!
//! Bytes are always forwarded verbatim; parsing failures only cost trace
//! events, never the viewer's connection. Logging honours the network
//! state sidecar on every event, so `stop` takes effect mid-connection.

use crate::rfb::{RfbClientEvent, RfbParser};
use crate::sampler::MotionSampler;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};
use wb_core::TraceEvent;
use wb_storage::logs::append_trace_event;
use wb_storage::{SessionStore, TraceSource};

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub target_host: String,
    pub target_port: u16,
    pub session_dir: PathBuf,
    pub motion_sample_ms: u64,
}

/// The network layer is enabled unless the state sidecar says otherwise.
pub fn network_enabled(session_dir: &Path) -> bool {
    TraceSource::Network.state(session_dir).as_deref() != Some("disabled")
}

fn emit(config: &ProxyConfig, seq: u64, peer: SocketAddr, event: &RfbClientEvent) {
    let session_id = SessionStore::session_id_from_dir(&config.session_dir);
    let mut trace = match event {
        RfbClientEvent::Key { down, key } => {
            let mut t = TraceEvent::new("network", "network", "vnc_key", "user");
            t.down = Some(*down);
            t.key = Some(*key);
            t
        }
        RfbClientEvent::Pointer { button_mask, x, y } => {
            let mut t = TraceEvent::new("network", "network", "vnc_pointer", "user");
            t.button_mask = Some(*button_mask);
            t.x = Some(*x as i64);
            t.y = Some(*y as i64);
            t
        }
    };
    trace = trace.with_tool("vnc_network_proxy");
    trace.session_id = session_id;
    trace.seq = Some(seq);
    trace
        .extra
        .insert("client_addr".to_string(), serde_json::Value::from(peer.to_string()));

    let log_path = TraceSource::Network.log_path(&config.session_dir);
    match serde_json::to_value(&trace) {
        Ok(value) => {
            if let Err(err) = append_trace_event(&log_path, value) {
                tracing::warn!(error = %err, "network trace append failed");
            }
        }
        Err(err) => tracing::warn!(error = %err, "network trace serialise failed"),
    }
}

async fn handle_connection(client: TcpStream, peer: SocketAddr, config: ProxyConfig) {
    let target = match TcpStream::connect((config.target_host.as_str(), config.target_port)).await {
        Ok(target) => target,
        Err(err) => {
            tracing::warn!(error = %err, "target VNC server unreachable");
            return;
        }
    };
    tracing::info!(%peer, "proxying viewer connection");

    let (mut client_rd, mut client_wr) = client.into_split();
    let (mut target_rd, mut target_wr) = target.into_split();

    let c2s_config = config.clone();
    let c2s = tokio::spawn(async move {
        let mut parser = RfbParser::new();
        let mut sampler = MotionSampler::new(c2s_config.motion_sample_ms);
        let mut seq: u64 = 0;
        let mut buf = vec![0u8; 4096];
        loop {
            let n = match client_rd.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for event in parser.push(&buf[..n]) {
                if !network_enabled(&c2s_config.session_dir) {
                    continue;
                }
                if let RfbClientEvent::Pointer { button_mask: 0, .. } = event {
                    let now = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64;
                    if !sampler.admit(now) {
                        continue;
                    }
                }
                seq += 1;
                emit(&c2s_config, seq, peer, &event);
            }
            if target_wr.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
        let _ = target_wr.shutdown().await;
    });

    let s2c = tokio::spawn(async move {
        let _ = tokio::io::copy(&mut target_rd, &mut client_wr).await;
        let _ = client_wr.shutdown().await;
    });

    let _ = c2s.await;
    let _ = s2c.await;
    tracing::info!(%peer, "viewer connection closed");
}

/// Accept viewer connections on `listener` until SIGTERM/SIGINT.
pub async fn serve(listener: TcpListener, config: ProxyConfig) -> std::io::Result<()> {
    std::fs::create_dir_all(config.session_dir.join("logs"))?;
    let source = TraceSource::Network;
    let _ = source.write_pid(&config.session_dir, std::process::id() as i32);
    let _ = source.write_state(&config.session_dir, "enabled");
    tracing::info!(addr = ?listener.local_addr(), "VNC proxy listening");

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((client, peer)) => {
                    tokio::spawn(handle_connection(client, peer, config.clone()));
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            },
            _ = term.recv() => break,
            _ = int.recv() => break,
        }
    }

    let _ = source.write_state(&config.session_dir, "stopped");
    if let Some(pid_path) = source.pid_path(&config.session_dir) {
        let _ = std::fs::remove_file(pid_path);
    }
    Ok(())
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
