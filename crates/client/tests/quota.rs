//! Tests for the quota tracker.

use acore::{QuotaConfig, QuotaLimits};
use aistudio_client::{Admission, ManualClock, QuotaTracker};
use std::{sync::Arc, thread, time::Duration};

fn limits(requests: u32, tokens: u64) -> QuotaLimits {
    QuotaLimits {
        requests,
        request_window_secs: 60,
        tokens,
        token_window_secs: 3_600,
    }
}

fn tracker(requests: u32, tokens: u64) -> (QuotaTracker, ManualClock) {
    let clock = ManualClock::new();
    let config = QuotaConfig {
        default_limits: limits(requests, tokens),
        ..Default::default()
    };
    (QuotaTracker::new(config, Arc::new(clock.clone())), clock)
}

#[test]
fn reservations_below_capacity_are_allowed() {
    let (quota, _) = tracker(3, 1_000);
    for _ in 0..3 {
        assert!(matches!(quota.reserve("m", 100), Admission::Allowed(_)));
    }
    match quota.reserve("m", 100) {
        Admission::MustWait(delay) => assert_eq!(delay, Duration::from_secs(60)),
        other => panic!("expected MustWait, got {other:?}"),
    }
}

#[test]
fn token_capacity_forces_wait() {
    let (quota, _) = tracker(10, 1_000);
    assert!(matches!(quota.reserve("m", 600), Admission::Allowed(_)));
    match quota.reserve("m", 600) {
        Admission::MustWait(delay) => assert_eq!(delay, Duration::from_secs(3_600)),
        other => panic!("expected MustWait, got {other:?}"),
    }
}

#[test]
fn oversized_estimate_is_rejected() {
    let (quota, _) = tracker(10, 1_000);
    assert!(matches!(quota.reserve("m", 1_001), Admission::Rejected(_)));
    assert_eq!(quota.snapshot("m").requests_used, 0);
}

#[test]
fn window_resets_after_its_length() {
    let (quota, clock) = tracker(1, 1_000);
    assert!(matches!(quota.reserve("m", 1), Admission::Allowed(_)));
    clock.advance(Duration::from_secs(59));
    assert!(matches!(quota.reserve("m", 1), Admission::MustWait(_)));
    clock.advance(Duration::from_secs(1));
    assert!(matches!(quota.reserve("m", 1), Admission::Allowed(_)));
}

#[test]
fn models_have_independent_windows() {
    let (quota, _) = tracker(1, 1_000);
    assert!(matches!(quota.reserve("a", 1), Admission::Allowed(_)));
    assert!(matches!(quota.reserve("b", 1), Admission::Allowed(_)));
    // The prefix does not make a different model.
    assert!(matches!(quota.reserve("models/a", 1), Admission::MustWait(_)));
}

#[test]
fn per_model_overrides_apply() {
    let clock = ManualClock::new();
    let mut config = QuotaConfig {
        default_limits: limits(1, 1_000),
        ..Default::default()
    };
    config
        .models
        .insert("models/big".into(), limits(5, 1_000));
    let quota = QuotaTracker::new(config, Arc::new(clock));
    for _ in 0..5 {
        assert!(matches!(quota.reserve("big", 1), Admission::Allowed(_)));
    }
    assert_eq!(quota.snapshot("big").requests_limit, 5);
    assert_eq!(quota.snapshot("small").requests_limit, 1);
}

#[test]
fn rollback_returns_tokens_but_not_the_request() {
    let (quota, _) = tracker(5, 1_000);
    let Admission::Allowed(reservation) = quota.reserve("m", 400) else {
        panic!("expected Allowed");
    };
    quota.rollback(&reservation);
    let snapshot = quota.snapshot("m");
    assert_eq!(snapshot.tokens_used, 0);
    assert_eq!(snapshot.requests_used, 1);
}

#[test]
fn rollback_after_rollover_is_ignored() {
    let (quota, clock) = tracker(5, 1_000);
    let Admission::Allowed(stale) = quota.reserve("m", 400) else {
        panic!("expected Allowed");
    };
    clock.advance(Duration::from_secs(3_600));
    assert!(matches!(quota.reserve("m", 300), Admission::Allowed(_)));
    quota.rollback(&stale);
    assert_eq!(quota.snapshot("m").tokens_used, 300);
}

#[test]
fn settle_adds_only_the_overage() {
    let (quota, _) = tracker(5, 1_000);
    let Admission::Allowed(reservation) = quota.reserve("m", 100) else {
        panic!("expected Allowed");
    };
    quota.settle(&reservation, 80);
    assert_eq!(quota.snapshot("m").tokens_used, 100);
    quota.settle(&reservation, 250);
    assert_eq!(quota.snapshot("m").tokens_used, 250);
}

#[test]
fn penalty_blocks_and_never_shortens() {
    let (quota, clock) = tracker(10, 1_000);
    quota.penalize("m", Duration::from_secs(30));
    quota.penalize("m", Duration::from_secs(5));
    match quota.reserve("m", 1) {
        Admission::MustWait(delay) => assert_eq!(delay, Duration::from_secs(30)),
        other => panic!("expected MustWait, got {other:?}"),
    }
    assert_eq!(
        quota.snapshot("m").blocked_for,
        Some(Duration::from_secs(30))
    );
    clock.advance(Duration::from_secs(30));
    assert!(matches!(quota.reserve("m", 1), Admission::Allowed(_)));
    assert_eq!(quota.snapshot("m").blocked_for, None);
}

#[test]
fn concurrent_reservations_respect_capacity() {
    let (quota, _) = tracker(50, 1_000_000);
    let quota = Arc::new(quota);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let quota = quota.clone();
            thread::spawn(move || {
                (0..20)
                    .filter(|_| matches!(quota.reserve("m", 10), Admission::Allowed(_)))
                    .count()
            })
        })
        .collect();
    let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(allowed, 50);
    assert_eq!(quota.snapshot("m").requests_used, 50);
}

#[test]
fn snapshots_list_seen_models() {
    let (quota, _) = tracker(5, 1_000);
    quota.reserve("models/b", 1);
    quota.reserve("a", 1);
    let models: Vec<_> = quota.snapshots().into_iter().map(|s| s.model).collect();
    assert_eq!(models, vec!["a", "b"]);
}
