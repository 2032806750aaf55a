//! Aggregate counters for usage displays.

use crate::quota::QuotaSnapshot;
use acore::Usage;
use std::sync::atomic::{AtomicU64, Ordering};

/// Totals since the client was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Calls admitted by the quota tracker.
    pub requests: u64,
    /// Network attempts, retries included.
    pub attempts: u64,
    /// Calls that ended in an error other than cancellation.
    pub errors: u64,
    /// Calls cancelled by the collaborator, a timeout or a dropped handle.
    pub cancelled: u64,
    /// Prompt tokens reported by the provider.
    pub prompt_tokens: u64,
    /// Output tokens reported by the provider.
    pub output_tokens: u64,
    /// Per-model window state.
    pub quotas: Vec<QuotaSnapshot>,
}

#[derive(Debug, Default)]
pub(crate) struct UsageCounters {
    requests: AtomicU64,
    attempts: AtomicU64,
    errors: AtomicU64,
    cancelled: AtomicU64,
    prompt_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl UsageCounters {
    pub(crate) fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tokens(&self, usage: Usage) {
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self, quotas: Vec<QuotaSnapshot>) -> UsageStats {
        UsageStats {
            requests: self.requests.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            quotas,
        }
    }
}
