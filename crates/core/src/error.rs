//! Error taxonomy.
//!
//! [`ProviderError`] describes one failed network attempt; the client
//! absorbs it or turns it into a caller-visible [`Error`].

use std::{fmt, time::Duration};

/// Replacement text for redacted secrets.
const REDACTED: &str = "[REDACTED]";

/// What went wrong with a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The exchange timed out.
    Timeout,
    /// Connection-level failure.
    Network,
    /// 5xx-class upstream error.
    Server,
    /// Explicit rate-limit signal (HTTP 429, `RESOURCE_EXHAUSTED`).
    RateLimited,
    /// Missing or invalid credential, or insufficient permission.
    Unauthorized,
    /// The provider refused the request as malformed.
    InvalidRequest,
    /// The prompt or the output was blocked by a content policy.
    ContentPolicy,
    /// Unknown model or endpoint.
    NotFound,
    /// The response could not be decoded.
    Decode,
}

impl ProviderErrorKind {
    /// Map an HTTP status code to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::InvalidRequest,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Server => "server",
            Self::RateLimited => "rate limited",
            Self::Unauthorized => "unauthorized",
            Self::InvalidRequest => "invalid request",
            Self::ContentPolicy => "content policy",
            Self::NotFound => "not found",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// A failed provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Failure class
    pub kind: ProviderErrorKind,
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
    /// Provider message, redacted of credentials
    pub message: String,
    /// Machine-readable "retry after" hint
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    /// Create a new provider error
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an error from an HTTP status and message
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(ProviderErrorKind::from_status(status), message)
        }
    }

    /// Attach a "retry after" hint
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Remove `secret` from the message.
    pub fn redacted(mut self, secret: &str) -> Self {
        self.message = redact(&self.message, secret);
        self
    }

    /// Whether this is an explicit rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ProviderErrorKind::RateLimited
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Why a session was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The collaborator called `cancel`.
    User,
    /// The session exceeded its total time budget.
    Timeout,
    /// The collaborator dropped the response handle.
    Dropped,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "cancelled by user",
            Self::Timeout => "timed out",
            Self::Dropped => "abandoned",
        })
    }
}

/// A caller-visible outcome of a failed or cancelled call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The quota tracker rejected the call, or the wait exceeds the ceiling.
    #[error("quota exhausted for {model}: {reason}")]
    QuotaExhausted {
        /// Model the quota belongs to
        model: String,
        /// Which limit was hit
        reason: String,
        /// How long until capacity is expected
        retry_after: Option<Duration>,
    },
    /// Retryable failures continued past the retry budget.
    #[error("provider unavailable after {attempts} attempts: {source}")]
    Transient {
        /// Network attempts made
        attempts: u32,
        /// The last failure
        #[source]
        source: ProviderError,
    },
    /// The provider refused the request; not retried.
    #[error("provider rejected the request: {0}")]
    Fatal(#[source] ProviderError),
    /// Local pre-flight validation failed; nothing was sent.
    #[error("attachment rejected: {reason}")]
    AttachmentRejected {
        /// What was wrong
        reason: String,
    },
    /// The session was cancelled before it completed.
    #[error("request {0}")]
    Cancelled(CancelReason),
}

impl Error {
    /// Whether this outcome is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The underlying provider error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Transient { source, .. } | Self::Fatal(source) => Some(source),
            _ => None,
        }
    }

    /// A short remediation hint suitable for display.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::QuotaExhausted { .. } => {
                "wait for the quota window to reset or switch to a higher-quota model"
            }
            Self::Transient { .. } => "the service is unavailable right now, try again later",
            Self::AttachmentRejected { .. } => {
                "remove the attachment or choose a model that accepts it"
            }
            Self::Cancelled(_) => "the request was cancelled",
            Self::Fatal(err) => match err.kind {
                ProviderErrorKind::Unauthorized => "check the configured API key",
                ProviderErrorKind::ContentPolicy => "rephrase the prompt",
                ProviderErrorKind::NotFound => "refresh the model list and pick another model",
                _ => "check the request and try again",
            },
        }
    }
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_owned();
    }
    text.replace(secret, REDACTED)
}
