//! Retry classification and backoff.

use acore::{ProviderError, ProviderErrorKind, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Whether a failed attempt may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient; try again after a delay.
    Retryable,
    /// Surface immediately.
    Fatal,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made.
    pub should_retry: bool,
    /// How long to wait before it.
    pub delay: Duration,
    /// Why, for logs.
    pub reason: String,
}

/// Classify a provider error.
pub fn classify(error: &ProviderError) -> Classification {
    match error.kind {
        ProviderErrorKind::Timeout
        | ProviderErrorKind::Network
        | ProviderErrorKind::Server
        | ProviderErrorKind::RateLimited => Classification::Retryable,
        ProviderErrorKind::Unauthorized
        | ProviderErrorKind::InvalidRequest
        | ProviderErrorKind::ContentPolicy
        | ProviderErrorKind::NotFound
        | ProviderErrorKind::Decode => Classification::Fatal,
    }
}

/// Exponential backoff with an attempt and an elapsed-time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Cap on time spent across attempts and backoff.
    pub max_elapsed: Duration,
    /// Scale delays by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
            jitter: config.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Classify a provider error.
    pub fn classify(&self, error: &ProviderError) -> Classification {
        classify(error)
    }

    /// Delay after `attempt` failed attempts: `base * 2^(attempt - 1)`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        if !self.jitter {
            return delay;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        delay.mul_f64(factor).min(self.max_delay)
    }

    /// Decide whether to retry after `attempt` attempts and `elapsed` time.
    ///
    /// A provider "retry after" hint replaces the computed delay.
    pub fn decide(&self, error: &ProviderError, attempt: u32, elapsed: Duration) -> RetryDecision {
        if self.classify(error) == Classification::Fatal {
            return RetryDecision {
                should_retry: false,
                delay: Duration::ZERO,
                reason: format!("{} errors are not retried", error.kind),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision {
                should_retry: false,
                delay: Duration::ZERO,
                reason: format!("gave up after {attempt} attempts"),
            };
        }

        let delay = error
            .retry_after
            .unwrap_or_else(|| self.next_delay(attempt));
        if elapsed + delay > self.max_elapsed {
            return RetryDecision {
                should_retry: false,
                delay,
                reason: format!(
                    "waiting {delay:?} would exceed the {:?} retry budget",
                    self.max_elapsed
                ),
            };
        }
        RetryDecision {
            should_retry: true,
            delay,
            reason: format!("{} error on attempt {attempt}", error.kind),
        }
    }
}
