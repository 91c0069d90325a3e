// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background resource monitor: reaps finished children and runs the
//! recorder's disk-space watchdog on a fixed tick.

use crate::state::AppState;
use std::time::Duration;

pub const TICK: Duration = Duration::from_secs(5);

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let reaped = state.registry.reap();
            if reaped > 0 {
                tracing::debug!(reaped, "monitor reaped children");
            }
            state.recorder.disk_watchdog();
        }
    })
}
