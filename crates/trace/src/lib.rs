// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wb-trace: the multi-layer input trace fabric.
//!
//! Four independent capture layers feed per-session JSONL logs: the X
//! Input Extension test stream (canonical), per-device core X events
//! (x11_core), viewer-side events POSTed over HTTP (client), an in-guest
//! low-level hook or script (windows), and the RFB byte stream between the
//! viewer and the VNC server (network). The parsers here are pure; the
//! runner and proxy wire them to real processes and sockets.

pub mod core_stream;
pub mod error;
pub mod proxy;
pub mod rfb;
pub mod runner;
pub mod sampler;
pub mod windows;
pub mod xi2;

pub use error::TraceError;
pub use rfb::{RfbClientEvent, RfbParser};
pub use sampler::MotionSampler;
