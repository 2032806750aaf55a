//! Lifecycle of one logical call.
//!
//! A session moves `Pending -> Admitted -> InFlight` and ends in exactly
//! one terminal state. Output is committed under the session lock, so a
//! `cancel` that returns has a well-defined cut: every chunk committed
//! before it is part of the output, nothing after it is.

use crate::quota::Reservation;
use acore::{CancelReason, Request, TextChunk, Usage};
use parking_lot::Mutex;
use std::{fmt, str::FromStr};
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Ulid);

impl SessionId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, waiting for quota.
    Pending,
    /// Quota reserved.
    Admitted,
    /// A network attempt is running.
    InFlight,
    /// Finished with output.
    Completed,
    /// Finished with an error.
    Failed,
    /// Stopped before finishing.
    Cancelled(CancelReason),
}

impl SessionState {
    /// Whether the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled(_))
    }
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    attempts: u32,
    output: String,
    chunks: usize,
    reservation: Option<Reservation>,
    usage: Option<Usage>,
}

/// One logical call, shared between the client's session table and the
/// task driving it.
#[derive(Debug)]
pub struct RequestSession {
    id: SessionId,
    request: Request,
    token: CancellationToken,
    inner: Mutex<Inner>,
}

impl RequestSession {
    /// Create a pending session for `request`.
    pub fn new(request: Request) -> Self {
        Self {
            id: SessionId::new(),
            request,
            token: CancellationToken::new(),
            inner: Mutex::new(Inner {
                state: SessionState::Pending,
                attempts: 0,
                output: String::new(),
                chunks: 0,
                reservation: None,
                usage: None,
            }),
        }
    }

    /// Get the id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Get the current state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Network attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// Output committed so far.
    pub fn output(&self) -> String {
        self.inner.lock().output.clone()
    }

    /// Whether any output was committed.
    pub fn has_output(&self) -> bool {
        self.inner.lock().chunks > 0
    }

    /// Why the session was cancelled, if it was.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self.state() {
            SessionState::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }

    /// A token that fires when the session is cancelled.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Record the quota reservation and move to `Admitted`.
    pub fn admit(&self, reservation: Reservation) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Pending {
            return false;
        }
        inner.state = SessionState::Admitted;
        inner.reservation = Some(reservation);
        true
    }

    /// Start a network attempt, returning its 1-based number.
    pub fn begin_attempt(&self) -> Option<u32> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Admitted | SessionState::InFlight => {
                inner.state = SessionState::InFlight;
                inner.attempts += 1;
                Some(inner.attempts)
            }
            _ => None,
        }
    }

    /// Append output, unless the session has left `InFlight`.
    pub fn commit(&self, text: &str) -> Option<TextChunk> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::InFlight {
            return None;
        }
        inner.output.push_str(text);
        let index = inner.chunks;
        inner.chunks += 1;
        Some(TextChunk {
            index,
            text: text.to_owned(),
        })
    }

    /// Remember the usage the provider reported.
    pub fn record_usage(&self, usage: Usage) {
        self.inner.lock().usage = Some(usage);
    }

    /// Reported usage, if any.
    pub fn usage(&self) -> Option<Usage> {
        self.inner.lock().usage
    }

    /// Move to `Completed`; false if the session already ended.
    pub fn complete(&self) -> bool {
        self.finish(SessionState::Completed)
    }

    /// Move to `Failed`; false if the session already ended.
    pub fn fail(&self) -> bool {
        self.finish(SessionState::Failed)
    }

    /// Move to `Cancelled` and fire the token.
    ///
    /// Returns false, and changes nothing, on a terminal session.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let cancelled = self.finish(SessionState::Cancelled(reason));
        if cancelled {
            self.token.cancel();
            tracing::debug!("session {} {reason}", self.id);
        }
        cancelled
    }

    /// Take the reservation for settlement or rollback.
    pub fn take_reservation(&self) -> Option<Reservation> {
        self.inner.lock().reservation.take()
    }

    fn finish(&self, state: SessionState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.is_terminal() {
            return false;
        }
        inner.state = state;
        true
    }
}
