//! Tests for the session state machine.

use acore::{CancelReason, QuotaConfig, Request};
use aistudio_client::{Admission, ManualClock, QuotaTracker, RequestSession, SessionState};
use std::sync::Arc;

fn admitted() -> RequestSession {
    let quota = QuotaTracker::new(QuotaConfig::default(), Arc::new(ManualClock::new()));
    let session = RequestSession::new(Request::new("m", "hi"));
    let Admission::Allowed(reservation) = quota.reserve("m", 1) else {
        panic!("expected Allowed");
    };
    assert!(session.admit(reservation));
    session
}

#[test]
fn walks_the_happy_path() {
    let session = admitted();
    assert_eq!(session.state(), SessionState::Admitted);
    assert_eq!(session.begin_attempt(), Some(1));
    assert_eq!(session.state(), SessionState::InFlight);
    assert_eq!(session.commit("Hel").unwrap().index, 0);
    assert_eq!(session.commit("lo").unwrap().index, 1);
    assert!(session.complete());
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.output(), "Hello");
}

#[test]
fn cancel_is_idempotent() {
    let session = admitted();
    session.begin_attempt();
    assert!(session.cancel(CancelReason::User));
    assert!(!session.cancel(CancelReason::Timeout));
    assert_eq!(session.state(), SessionState::Cancelled(CancelReason::User));
    assert!(session.token().is_cancelled());
}

#[test]
fn cancel_after_completion_is_a_no_op() {
    let session = admitted();
    session.begin_attempt();
    session.commit("done");
    assert!(session.complete());
    assert!(!session.cancel(CancelReason::User));
    assert_eq!(session.state(), SessionState::Completed);
    assert!(!session.token().is_cancelled());
}

#[test]
fn nothing_is_committed_after_cancel() {
    let session = admitted();
    session.begin_attempt();
    session.commit("kept");
    session.cancel(CancelReason::User);
    assert!(session.commit("late").is_none());
    assert!(!session.complete());
    assert_eq!(session.output(), "kept");
    assert_eq!(session.begin_attempt(), None);
}

#[test]
fn pending_session_can_be_cancelled() {
    let session = RequestSession::new(Request::new("m", "hi"));
    assert!(session.cancel(CancelReason::Dropped));
    assert!(session.state().is_terminal());
    assert_eq!(session.cancel_reason(), Some(CancelReason::Dropped));
}

#[test]
fn attempts_are_counted() {
    let session = admitted();
    assert_eq!(session.begin_attempt(), Some(1));
    assert_eq!(session.begin_attempt(), Some(2));
    assert_eq!(session.attempts(), 2);
    assert!(session.fail());
    assert!(!session.fail());
}

#[test]
fn ids_are_unique_and_parse() {
    let a = RequestSession::new(Request::new("m", "a")).id();
    let b = RequestSession::new(Request::new("m", "b")).id();
    assert_ne!(a, b);
    assert_eq!(a.to_string().parse::<aistudio_client::SessionId>().unwrap(), a);
}
