// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use wb_core::FakeClock;

fn interactive_broker() -> Broker<FakeClock> {
    let broker = Broker::with_clock(FakeClock::new());
    broker.update_session("session-test", true);
    broker
}

#[test]
fn non_interactive_sessions_are_implicit_agent() {
    let broker = Broker::with_clock(FakeClock::new());
    broker.update_session("session-test", false);
    assert!(broker.check_access());
    assert_eq!(broker.state().control_mode, ControlMode::Agent);
}

#[test]
fn interactive_sessions_start_with_user_in_control() {
    let broker = interactive_broker();
    assert!(!broker.check_access());
    assert_eq!(broker.state().control_mode, ControlMode::User);
}

#[test]
fn grant_gives_agent_access_until_lease_expires() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    assert!(broker.check_access());

    broker.clock.advance(Duration::from_secs(61));
    assert!(!broker.check_access());

    let state = broker.state();
    assert_eq!(state.control_mode, ControlMode::User);
    assert_eq!(state.agent_status, AgentStatus::Stopping);
    assert!(state.lease_expiry.is_none());
}

#[test]
fn lease_expiry_boundary_is_inclusive() {
    let broker = interactive_broker();
    broker.grant_agent(10);
    broker.clock.advance(Duration::from_secs(10));
    assert!(!broker.check_access());
}

#[test]
fn renew_extends_an_active_lease() {
    let broker = interactive_broker();
    broker.grant_agent(10);
    broker.clock.advance(Duration::from_secs(8));
    broker.renew_agent(10).unwrap();
    broker.clock.advance(Duration::from_secs(8));
    assert!(broker.check_access());
}

#[test]
fn renew_without_control_fails() {
    let broker = interactive_broker();
    assert_eq!(broker.renew_agent(10), Err(BrokerError::NoControl));
}

#[test]
fn renew_after_user_activity_fails_with_no_control() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    broker.report_user_activity();
    assert_eq!(broker.renew_agent(60), Err(BrokerError::NoControl));
}

#[test]
fn stop_now_blocks_renew_and_access_until_regrant() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    broker.set_user_intent(UserIntent::StopNow);

    assert!(!broker.check_access());
    // Revoked by STOP_NOW, so the renew failure reads as lost control.
    assert_eq!(broker.renew_agent(60), Err(BrokerError::NoControl));
    assert!(!broker.check_access());

    broker.grant_agent(60);
    assert_eq!(broker.state().user_intent, UserIntent::Wait);
    assert!(broker.check_access());
}

#[test]
fn stop_now_during_lease_is_rejected_at_renew_time() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    {
        // Set intent without triggering the revoke path to pin down the
        // renew guard itself.
        let mut state = broker.state.lock();
        state.user_intent = UserIntent::StopNow;
    }
    assert_eq!(broker.renew_agent(60), Err(BrokerError::StopRequested));
}

#[test]
fn user_activity_preempts_the_agent() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    assert!(broker.check_access());
    broker.report_user_activity();
    assert!(!broker.check_access());
    assert!(broker.last_user_activity_ms().is_some());
}

#[test]
fn safe_interrupt_does_not_revoke() {
    let broker = interactive_broker();
    broker.grant_agent(60);
    broker.set_user_intent(UserIntent::SafeInterrupt);
    assert!(broker.check_access());
    assert_eq!(broker.state().user_intent, UserIntent::SafeInterrupt);
}

#[test]
fn becoming_interactive_revokes_a_running_agent() {
    let broker = Broker::with_clock(FakeClock::new());
    broker.update_session("session-test", false);
    assert!(broker.check_access());

    broker.update_session("session-test", true);
    let state = broker.state();
    assert_eq!(state.control_mode, ControlMode::User);
    assert_eq!(state.agent_status, AgentStatus::Stopping);
    assert!(!broker.check_access());
}

#[test]
fn grant_is_a_noop_in_implicit_agent_mode() {
    let broker = Broker::with_clock(FakeClock::new());
    broker.update_session("session-test", false);
    broker.grant_agent(60);
    assert!(broker.state().lease_expiry.is_none());
}

#[test]
fn concurrent_preemption_has_a_single_winner() {
    use std::sync::Arc;
    let broker = Arc::new(interactive_broker());
    broker.grant_agent(60);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let broker = Arc::clone(&broker);
        handles.push(std::thread::spawn(move || broker.report_user_activity()));
    }
    for _ in 0..4 {
        let broker = Arc::clone(&broker);
        handles.push(std::thread::spawn(move || {
            let _ = broker.check_access();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(broker.state().control_mode, ControlMode::User);
    assert!(!broker.check_access());
}
