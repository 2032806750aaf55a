//! Quota-aware, retrying, cancellable client for generative model services.
//!
//! [`ServiceClient`] wraps any [`acore::Provider`] with per-model quota
//! windows, exponential backoff, session timeouts and cancellation, and
//! caches the provider's model listing.

pub use {
    automation::{Automation, AutomationKind, UnknownAutomation},
    client::{PendingReply, ResponseStream, ServiceClient},
    clock::{Clock, SystemClock},
    quota::{Admission, QuotaSnapshot, QuotaTracker, Reservation},
    registry::ModelRegistry,
    retry::{Classification, RetryDecision, RetryPolicy, classify},
    session::{RequestSession, SessionId, SessionState},
    usage::UsageStats,
};

#[cfg(feature = "testing")]
pub use clock::ManualClock;

mod automation;
mod client;
mod clock;
mod quota;
mod registry;
mod retry;
mod session;
mod usage;

#[cfg(feature = "testing")]
pub mod testing;
