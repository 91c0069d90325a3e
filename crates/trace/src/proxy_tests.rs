// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn read_events(session_dir: &Path) -> Vec<serde_json::Value> {
    wb_storage::logs::read_events_tail(
        &TraceSource::Network.log_path(session_dir),
        100,
        &Default::default(),
    )
    .unwrap()
}

/// Spins up a sink "VNC server" and a proxied client connection.
async fn proxied_pair(session_dir: &Path, motion_sample_ms: u64) -> (TcpStream, tokio::task::JoinHandle<Vec<u8>>) {
    let target = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target_addr = target.local_addr().unwrap();
    let sink = tokio::spawn(async move {
        let (mut conn, _) = target.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match conn.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
        received
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let config = ProxyConfig {
        target_host: "127.0.0.1".to_string(),
        target_port: target_addr.port(),
        session_dir: session_dir.to_path_buf(),
        motion_sample_ms,
    };
    tokio::spawn(async move {
        // The accept loop runs for the life of the test process.
        let _ = serve(listener, config).await;
    });

    let client = TcpStream::connect(proxy_addr).await.unwrap();
    (client, sink)
}

fn handshake_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RFB 003.008\n");
    bytes.push(1); // security: none
    bytes.push(1); // ClientInit
    bytes
}

fn pointer_event(mask: u8, x: u16, y: u16) -> Vec<u8> {
    let mut msg = vec![5u8, mask];
    msg.extend_from_slice(&x.to_be_bytes());
    msg.extend_from_slice(&y.to_be_bytes());
    msg
}

#[tokio::test]
async fn events_are_logged_and_bytes_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let (mut client, sink) = proxied_pair(dir.path(), 0).await;

    let mut payload = handshake_bytes();
    payload.extend_from_slice(&pointer_event(1, 10, 20));
    let mut key = vec![4u8, 1, 0, 0];
    key.extend_from_slice(&0x61u32.to_be_bytes());
    payload.extend_from_slice(&key);

    client.write_all(&payload).await.unwrap();
    client.shutdown().await.unwrap();

    let forwarded = sink.await.unwrap();
    assert_eq!(forwarded, payload);

    // Give the log append a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let events = read_events(dir.path()).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "vnc_pointer");
    assert_eq!(events[0]["button_mask"], 1);
    assert_eq!(events[0]["x"], 10);
    assert_eq!(events[1]["event"], "vnc_key");
    assert_eq!(events[1]["key"], 0x61);
    assert_eq!(events[1]["origin"], "user");
    assert_eq!(events[1]["layer"], "network");
}

#[tokio::test]
async fn disabled_state_suppresses_logging_but_not_forwarding() {
    let dir = tempfile::tempdir().unwrap();
    let (mut client, sink) = proxied_pair(dir.path(), 0).await;
    // Wait for serve() to write its initial "enabled" state, then flip it
    // off as the stop endpoint would.
    for _ in 0..50 {
        if TraceSource::Network.state(dir.path()).is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    TraceSource::Network.write_state(dir.path(), "disabled").unwrap();

    let mut payload = handshake_bytes();
    payload.extend_from_slice(&pointer_event(1, 10, 20));
    client.write_all(&payload).await.unwrap();
    client.shutdown().await.unwrap();

    let forwarded = sink.await.unwrap();
    assert_eq!(forwarded, payload);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(read_events(dir.path()).await.is_empty());
}

#[tokio::test]
async fn pointer_motion_is_sampled() {
    let dir = tempfile::tempdir().unwrap();
    let (mut client, sink) = proxied_pair(dir.path(), 10_000).await;

    let mut payload = handshake_bytes();
    for i in 0..5u16 {
        payload.extend_from_slice(&pointer_event(0, i, i));
    }
    // A press is never sampled away.
    payload.extend_from_slice(&pointer_event(1, 99, 99));
    client.write_all(&payload).await.unwrap();
    client.shutdown().await.unwrap();
    let _ = sink.await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let events = read_events(dir.path()).await;
    // One sampled motion plus the press.
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["button_mask"], 1);
}

#[test]
fn network_enabled_defaults_on() {
    let dir = tempfile::tempdir().unwrap();
    assert!(network_enabled(dir.path()));
    TraceSource::Network.write_state(dir.path(), "disabled").unwrap();
    assert!(!network_enabled(dir.path()));
    TraceSource::Network.write_state(dir.path(), "enabled").unwrap();
    assert!(network_enabled(dir.path()));
}
