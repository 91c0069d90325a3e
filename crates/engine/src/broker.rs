// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The input control broker.
//!
//! A single mutex guards the control state; every transition happens
//! entirely inside it, so broker histories are totally ordered. The one
//! exception is the implicit-agent fast path: when the session is not
//! interactive the agent is always allowed, and `check_access` answers
//! from an atomic flag without touching the lock.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use wb_core::{AgentStatus, Clock, ControlMode, ControlState, SystemClock, UserIntent};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("agent does not hold control")]
    NoControl,
    #[error("user requested STOP_NOW")]
    StopRequested,
}

pub struct Broker<C: Clock = SystemClock> {
    state: Mutex<ControlState>,
    interactive: AtomicBool,
    last_user_activity_ms: AtomicU64,
    clock: C,
}

impl Broker<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Broker<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Broker<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(ControlState::initial()),
            interactive: AtomicBool::new(false),
            last_user_activity_ms: AtomicU64::new(0),
            clock,
        }
    }

    /// Bind the broker to a session and its interactivity mode.
    ///
    /// Entering interactive mode while the agent holds control revokes it
    /// first; leaving interactive mode puts the broker in implicit-agent
    /// mode where every access check passes.
    pub fn update_session(&self, session_id: &str, interactive: bool) {
        let mut state = self.state.lock();
        state.session_id = session_id.to_string();
        state.interactive = interactive;
        if interactive {
            if state.control_mode == ControlMode::Agent {
                Self::revoke_locked(&mut state, "session_became_interactive");
            }
            state.control_mode = ControlMode::User;
        } else {
            state.control_mode = ControlMode::Agent;
        }
        self.interactive.store(interactive, Ordering::Release);
    }

    /// User grants the agent a lease of `lease_seconds`.
    pub fn grant_agent(&self, lease_seconds: u64) {
        let mut state = self.state.lock();
        if !state.interactive {
            // Implicit-agent mode: leases are meaningless.
            return;
        }
        state.control_mode = ControlMode::Agent;
        state.lease_expiry = Some(self.clock.epoch_secs() + lease_seconds);
        state.user_intent = UserIntent::Wait;
        tracing::info!(lease_seconds, "agent granted control");
    }

    /// Agent extends its lease.
    pub fn renew_agent(&self, lease_seconds: u64) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.control_mode != ControlMode::Agent {
            return Err(BrokerError::NoControl);
        }
        if state.user_intent == UserIntent::StopNow {
            return Err(BrokerError::StopRequested);
        }
        state.lease_expiry = Some(self.clock.epoch_secs() + lease_seconds);
        Ok(())
    }

    /// Real user input observed; pre-empts any agent lease.
    pub fn report_user_activity(&self) {
        self.last_user_activity_ms
            .store(self.clock.epoch_ms(), Ordering::Release);
        let mut state = self.state.lock();
        if state.control_mode == ControlMode::Agent {
            Self::revoke_locked(&mut state, "user_input_override");
        }
    }

    pub fn set_user_intent(&self, intent: UserIntent) {
        let mut state = self.state.lock();
        state.user_intent = intent;
        if intent == UserIntent::StopNow {
            Self::revoke_locked(&mut state, "user_stop_now");
        }
    }

    /// May the agent act right now?
    ///
    /// Holds the lock for the whole check because a lease expiry observed
    /// here transitions the state back to USER.
    pub fn check_access(&self) -> bool {
        if !self.interactive.load(Ordering::Acquire) {
            return true;
        }
        let mut state = self.state.lock();
        if state.control_mode != ControlMode::Agent {
            return false;
        }
        if let Some(expiry) = state.lease_expiry {
            if self.clock.epoch_secs() >= expiry {
                Self::revoke_locked(&mut state, "lease_expired");
                return false;
            }
        }
        if state.user_intent == UserIntent::StopNow {
            Self::revoke_locked(&mut state, "user_stop_now");
            return false;
        }
        true
    }

    pub fn state(&self) -> ControlState {
        self.state.lock().clone()
    }

    /// Epoch ms of the most recent reported user activity, if any.
    pub fn last_user_activity_ms(&self) -> Option<u64> {
        match self.last_user_activity_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }

    fn revoke_locked(state: &mut ControlState, reason: &str) {
        state.control_mode = ControlMode::User;
        state.lease_expiry = None;
        state.agent_status = AgentStatus::Stopping;
        tracing::info!(reason, "agent control revoked");
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
