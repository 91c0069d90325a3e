// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive-control state machine types.
//!
//! The broker in wb-engine mediates who may drive input: the human viewer
//! or the automated agent. These types are the vocabulary of that decision;
//! the transition rules live with the broker itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who currently holds input control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "AGENT")]
    Agent,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::User => write!(f, "USER"),
            ControlMode::Agent => write!(f, "AGENT"),
        }
    }
}

/// The user's declared disposition toward a running agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserIntent {
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "SAFE_INTERRUPT")]
    SafeInterrupt,
    #[serde(rename = "STOP_NOW")]
    StopNow,
}

impl fmt::Display for UserIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserIntent::Wait => write!(f, "WAIT"),
            UserIntent::SafeInterrupt => write!(f, "SAFE_INTERRUPT"),
            UserIntent::StopNow => write!(f, "STOP_NOW"),
        }
    }
}

/// Coarse agent run status as tracked by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "PAUSED")]
    Paused,
    #[serde(rename = "STOPPING")]
    Stopping,
    #[serde(rename = "STOPPED")]
    Stopped,
}

/// The single in-memory control state instance.
///
/// Created at process start with `(USER, WAIT, IDLE)` and mutated only by
/// the broker under its lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlState {
    pub session_id: String,
    pub interactive: bool,
    pub control_mode: ControlMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expiry: Option<u64>,
    pub user_intent: UserIntent,
    pub agent_status: AgentStatus,
}

impl ControlState {
    /// Initial state for a fresh process: user holds control, no lease.
    pub fn initial() -> Self {
        Self {
            session_id: "unknown".to_string(),
            interactive: false,
            control_mode: ControlMode::User,
            lease_expiry: None,
            user_intent: UserIntent::Wait,
            agent_status: AgentStatus::Idle,
        }
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
