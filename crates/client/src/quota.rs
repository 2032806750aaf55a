//! Per-model request and token windows.
//!
//! Each model gets two fixed windows: requests per `request_window` and
//! tokens per `token_window`. Windows roll over lazily whenever the model is
//! touched. Every read-modify-write happens under one mutex, so concurrent
//! reservations can never both pass a window's capacity.

use crate::clock::Clock;
use acore::{QuotaConfig, QuotaLimits};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time::Instant;

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Capacity was reserved.
    Allowed(Reservation),
    /// No capacity until the delay elapses.
    MustWait(Duration),
    /// The call can never fit.
    Rejected(String),
}

/// Capacity provisionally taken by one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    model: String,
    tokens: u64,
    window: Instant,
}

impl Reservation {
    /// Model the capacity was taken from.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Estimated tokens reserved.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }
}

/// Read-only view of a model's windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Model id, without the `models/` prefix.
    pub model: String,
    /// Requests admitted in the current window.
    pub requests_used: u64,
    /// Request capacity per window.
    pub requests_limit: u64,
    /// Tokens counted in the current window.
    pub tokens_used: u64,
    /// Token capacity per window.
    pub tokens_limit: u64,
    /// Remaining provider-imposed block, if any.
    pub blocked_for: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u64,
    // Rolled-back units; `count` itself only grows within a window.
    released: u64,
}

impl Window {
    fn new(start: Instant) -> Self {
        Self {
            start,
            count: 0,
            released: 0,
        }
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if now >= self.start + length {
            *self = Self::new(now);
        }
    }

    fn used(&self) -> u64 {
        self.count.saturating_sub(self.released)
    }

    fn resets_in(&self, now: Instant, length: Duration) -> Duration {
        (self.start + length).saturating_duration_since(now)
    }
}

#[derive(Debug)]
struct ModelQuota {
    limits: QuotaLimits,
    requests: Window,
    tokens: Window,
    blocked_until: Option<Instant>,
}

impl ModelQuota {
    fn new(limits: QuotaLimits, now: Instant) -> Self {
        Self {
            limits,
            requests: Window::new(now),
            tokens: Window::new(now),
            blocked_until: None,
        }
    }

    fn roll(&mut self, now: Instant) {
        self.requests.roll(now, self.limits.request_window());
        self.tokens.roll(now, self.limits.token_window());
        if self.blocked_until.is_some_and(|until| until <= now) {
            self.blocked_until = None;
        }
    }
}

/// Tracks quota windows for every model the client has talked to.
pub struct QuotaTracker {
    config: QuotaConfig,
    clock: Arc<dyn Clock>,
    models: Mutex<HashMap<String, ModelQuota>>,
}

impl QuotaTracker {
    /// Create a tracker over `config`.
    pub fn new(config: QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            models: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Try to take one request slot and `estimated_tokens` for `model`.
    pub fn reserve(&self, model: &str, estimated_tokens: u64) -> Admission {
        let now = self.clock.now();
        let key = short_id(model);
        let mut models = self.models.lock();
        let quota = models
            .entry(key.to_owned())
            .or_insert_with(|| ModelQuota::new(self.config.limits_for(model), now));
        quota.roll(now);

        let limits = quota.limits.clone();
        if limits.requests == 0 {
            return Admission::Rejected(format!("{key} has no request capacity"));
        }
        if estimated_tokens > limits.tokens {
            return Admission::Rejected(format!(
                "estimated {estimated_tokens} tokens exceed the window capacity of {}",
                limits.tokens
            ));
        }
        if let Some(until) = quota.blocked_until {
            return Admission::MustWait(until - now);
        }
        if quota.requests.count >= u64::from(limits.requests) {
            return Admission::MustWait(quota.requests.resets_in(now, limits.request_window()));
        }
        if quota.tokens.used() + estimated_tokens > limits.tokens {
            return Admission::MustWait(quota.tokens.resets_in(now, limits.token_window()));
        }

        quota.requests.count += 1;
        quota.tokens.count += estimated_tokens;
        Admission::Allowed(Reservation {
            model: key.to_owned(),
            tokens: estimated_tokens,
            window: quota.tokens.start,
        })
    }

    /// Return the reservation's tokens; the request slot stays consumed.
    ///
    /// A no-op once the token window the reservation came from has rolled
    /// over.
    pub fn rollback(&self, reservation: &Reservation) {
        let mut models = self.models.lock();
        let Some(quota) = models.get_mut(&reservation.model) else {
            return;
        };
        if quota.tokens.start == reservation.window {
            quota.tokens.released =
                (quota.tokens.released + reservation.tokens).min(quota.tokens.count);
            tracing::debug!(
                "released {} tokens for {}",
                reservation.tokens,
                reservation.model
            );
        }
    }

    /// Account for actual usage; only an overage changes the window.
    pub fn settle(&self, reservation: &Reservation, actual_tokens: u64) {
        let overage = actual_tokens.saturating_sub(reservation.tokens);
        if overage == 0 {
            return;
        }
        let now = self.clock.now();
        let mut models = self.models.lock();
        if let Some(quota) = models.get_mut(&reservation.model) {
            quota.roll(now);
            quota.tokens.count += overage;
        }
    }

    /// Block admission for `model` until `now + delay`.
    ///
    /// Provider rate-limit signals override the local window math; an
    /// existing longer block is kept.
    pub fn penalize(&self, model: &str, delay: Duration) {
        let now = self.clock.now();
        let mut models = self.models.lock();
        let quota = models
            .entry(short_id(model).to_owned())
            .or_insert_with(|| ModelQuota::new(self.config.limits_for(model), now));
        let until = now + delay;
        if quota.blocked_until.is_none_or(|current| current < until) {
            quota.blocked_until = Some(until);
        }
        tracing::warn!("{} rate limited by the provider for {delay:?}", short_id(model));
    }

    /// Current usage of `model`; unknown models report empty windows.
    pub fn snapshot(&self, model: &str) -> QuotaSnapshot {
        let now = self.clock.now();
        let key = short_id(model);
        let mut models = self.models.lock();
        match models.get_mut(key) {
            Some(quota) => {
                quota.roll(now);
                view(key, quota, now)
            }
            None => view(key, &ModelQuota::new(self.config.limits_for(model), now), now),
        }
    }

    /// Usage of every model seen so far, sorted by id.
    pub fn snapshots(&self) -> Vec<QuotaSnapshot> {
        let now = self.clock.now();
        let mut models = self.models.lock();
        let mut snapshots: Vec<_> = models
            .iter_mut()
            .map(|(key, quota)| {
                quota.roll(now);
                view(key, quota, now)
            })
            .collect();
        snapshots.sort_by(|a, b| a.model.cmp(&b.model));
        snapshots
    }
}

fn view(key: &str, quota: &ModelQuota, now: Instant) -> QuotaSnapshot {
    QuotaSnapshot {
        model: key.to_owned(),
        requests_used: quota.requests.used(),
        requests_limit: u64::from(quota.limits.requests),
        tokens_used: quota.tokens.used(),
        tokens_limit: quota.limits.tokens,
        blocked_for: quota.blocked_until.map(|until| until - now),
    }
}

fn short_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}
