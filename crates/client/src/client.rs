//! The service client.
//!
//! Every call becomes a [`RequestSession`] driven by its own tokio task:
//! pre-flight validation, quota admission, then an attempt loop with
//! backoff. The task races that work against the session's cancellation
//! token and its time budget, so a cancel drops the in-flight exchange.

use crate::{
    automation::AutomationKind,
    clock::{Clock, SystemClock},
    quota::{Admission, QuotaTracker},
    registry::ModelRegistry,
    retry::{Classification, RetryPolicy, classify},
    session::{RequestSession, SessionId, SessionState},
    usage::{UsageCounters, UsageStats},
};
use acore::{
    CancelReason, Completion, Config, Error, ModelDescriptor, Provider, ProviderError, Request,
    SessionConfig, TextChunk,
};
use futures_core::Stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    pin::{Pin, pin},
    sync::Arc,
    task::{Context, Poll, ready},
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

/// Quota-aware, retrying, cancellable client over a [`Provider`].
///
/// Cheap to clone; clones share quotas, sessions and the model cache.
/// Calls spawn tasks, so they must be made inside a tokio runtime.
pub struct ServiceClient<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for ServiceClient<P> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<P> {
    provider: P,
    quota: QuotaTracker,
    retry: RetryPolicy,
    registry: ModelRegistry<P>,
    session: SessionConfig,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<SessionId, Arc<RequestSession>>>,
    usage: UsageCounters,
}

impl<P: Provider> ServiceClient<P> {
    /// Create a client from configuration.
    pub fn new(provider: P, config: &Config) -> Self {
        Self::with_clock(provider, config, Arc::new(SystemClock))
    }

    /// Create a client with a custom clock.
    ///
    /// Admission waits sleep on tokio time, so the clock has to follow it
    /// (`SystemClock` does, also when tokio time is paused).
    pub fn with_clock(provider: P, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: ModelRegistry::new(provider.clone(), &config.registry, clock.clone()),
                quota: QuotaTracker::new(config.quota.clone(), clock.clone()),
                retry: RetryPolicy::from(&config.retry),
                session: config.session.clone(),
                provider,
                clock,
                sessions: Mutex::new(HashMap::new()),
                usage: UsageCounters::default(),
            }),
        }
    }

    /// Send a request and wait for the complete response.
    pub fn send(&self, request: Request) -> PendingReply {
        let session = Arc::new(RequestSession::new(request));
        let (tx, rx) = oneshot::channel();
        match self.shared.preflight(session.request()) {
            Err(err) => {
                self.shared.reject(&session, &err);
                let _ = tx.send(Err(err));
            }
            Ok(()) => {
                self.shared.register(&session);
                let shared = self.shared.clone();
                let task = session.clone();
                tokio::spawn(async move {
                    let result = shared.drive(&task, shared.execute_send(&task)).await;
                    let _ = tx.send(result);
                });
            }
        }
        PendingReply { session, rx }
    }

    /// Send a request and receive the response incrementally.
    pub fn send_stream(&self, request: Request) -> ResponseStream {
        let session = Arc::new(RequestSession::new(request));
        let (tx, rx) = mpsc::channel(self.shared.session.stream_buffer.max(1));
        match self.shared.preflight(session.request()) {
            Err(err) => {
                self.shared.reject(&session, &err);
                let _ = tx.try_send(Err(err));
            }
            Ok(()) => {
                self.shared.register(&session);
                let shared = self.shared.clone();
                let task = session.clone();
                tokio::spawn(async move {
                    let result = shared.drive(&task, shared.execute_stream(&task, &tx)).await;
                    match result {
                        Err(err) if !err.is_cancelled() => {
                            let _ = tx.send(Err(err)).await;
                        }
                        _ => {}
                    }
                });
            }
        }
        ResponseStream {
            session,
            rx,
            done: false,
        }
    }

    /// Run a built-in automation over `input`, streaming the result.
    pub fn run_automation(
        &self,
        kind: AutomationKind,
        input: &str,
        model: impl Into<String>,
    ) -> ResponseStream {
        let prompt = kind.automation().prompt(input);
        tracing::debug!("running automation {kind}");
        self.send_stream(Request::new(model, prompt))
    }

    /// Cancel a session. Unknown and finished sessions are ignored.
    pub fn cancel(&self, id: SessionId) {
        let session = self.shared.sessions.lock().get(&id).cloned();
        if let Some(session) = session {
            session.cancel(CancelReason::User);
        }
    }

    /// Models available to the credential, from the cache when fresh.
    pub async fn list_models(&self) -> Result<Arc<[ModelDescriptor]>, Error> {
        self.shared
            .registry
            .list()
            .await
            .map_err(|err| surface(err, 1))
    }

    /// Refetch the model list.
    pub async fn refresh_models(&self) -> Result<Arc<[ModelDescriptor]>, Error> {
        self.shared
            .registry
            .refresh()
            .await
            .map_err(|err| surface(err, 1))
    }

    /// Usage totals and per-model quota state.
    pub fn usage(&self) -> UsageStats {
        self.shared.usage.stats(self.shared.quota.snapshots())
    }

    /// Number of sessions that have not finished yet.
    pub fn live_sessions(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Get the quota tracker.
    pub fn quota(&self) -> &QuotaTracker {
        &self.shared.quota
    }

    /// Get the model registry.
    pub fn registry(&self) -> &ModelRegistry<P> {
        &self.shared.registry
    }

    /// Get the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.shared.retry
    }
}

impl<P: Provider> Shared<P> {
    /// Local checks that need no network and consume no quota.
    fn preflight(&self, request: &Request) -> Result<(), Error> {
        let attachments = &request.prompt.attachments;
        if attachments.is_empty() {
            return Ok(());
        }
        for attachment in attachments {
            if !self.session.accepts(&attachment.mime_type) {
                return Err(rejected(format!(
                    "{} has unsupported type {}",
                    attachment.label(),
                    attachment.mime_type
                )));
            }
            if attachment.is_empty() {
                return Err(rejected(format!("{} is empty", attachment.label())));
            }
        }

        let bytes = request.prompt.attachment_bytes();
        if bytes > self.session.max_inline_bytes {
            return Err(rejected(format!(
                "attachments total {bytes} bytes, above the {} byte inline limit",
                self.session.max_inline_bytes
            )));
        }

        // Unknown models are left to the provider.
        if let Some(model) = self.registry.cached(&request.model) {
            if !model.supports_multimodal {
                return Err(rejected(format!(
                    "{} does not accept attachments",
                    model.display_name
                )));
            }
            let estimate = request.estimate_tokens();
            if estimate > model.token_limit {
                return Err(rejected(format!(
                    "about {estimate} tokens exceed the {} token limit of {}",
                    model.token_limit, model.display_name
                )));
            }
        }
        Ok(())
    }

    fn reject(&self, session: &RequestSession, err: &Error) {
        session.fail();
        self.usage.error();
        tracing::debug!("session {} rejected: {err}", session.id());
    }

    fn register(&self, session: &Arc<RequestSession>) {
        self.sessions.lock().insert(session.id(), session.clone());
    }

    /// Run `work` until it finishes, the session is cancelled, or the
    /// session's time budget runs out; then settle the session.
    async fn drive<T>(
        &self,
        session: &RequestSession,
        work: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        let result = tokio::select! {
            result = work => result,
            _ = session.token().cancelled() => Err(cancelled(session)),
            _ = tokio::time::sleep(self.session.timeout()) => {
                session.cancel(CancelReason::Timeout);
                Err(cancelled(session))
            }
        };
        self.finish(session, &result);
        result
    }

    fn finish<T>(&self, session: &RequestSession, result: &Result<T, Error>) {
        match result {
            Ok(_) => {}
            Err(err) if err.is_cancelled() => self.usage.cancelled(),
            Err(err) => {
                session.fail();
                self.usage.error();
                tracing::debug!("session {} failed: {err}", session.id());
            }
        }

        let usage = session.usage();
        if let Some(usage) = usage {
            self.usage.tokens(usage);
        }
        if let Some(reservation) = session.take_reservation() {
            match usage {
                Some(usage) => self.quota.settle(&reservation, usage.total()),
                None if result.is_err() && !session.has_output() => {
                    self.quota.rollback(&reservation)
                }
                None => {}
            }
        }
        self.sessions.lock().remove(&session.id());
    }

    /// Wait for quota, up to the configured ceiling.
    async fn admit(&self, session: &RequestSession) -> Result<(), Error> {
        let model = &session.request().model;
        let estimate = session.request().estimate_tokens();
        let ceiling = self.quota.config().wait_ceiling();
        let started = self.clock.now();
        loop {
            match self.quota.reserve(model, estimate) {
                Admission::Allowed(reservation) => {
                    if !session.admit(reservation.clone()) {
                        self.quota.rollback(&reservation);
                        return Err(cancelled(session));
                    }
                    self.usage.request();
                    tracing::debug!(
                        "session {} admitted on {model} with ~{estimate} tokens",
                        session.id()
                    );
                    return Ok(());
                }
                Admission::Rejected(reason) => {
                    return Err(Error::QuotaExhausted {
                        model: model.clone(),
                        reason,
                        retry_after: None,
                    });
                }
                Admission::MustWait(delay) => {
                    let waited = self.clock.now().saturating_duration_since(started);
                    if waited + delay > ceiling {
                        return Err(Error::QuotaExhausted {
                            model: model.clone(),
                            reason: format!(
                                "capacity frees up in {delay:?}, past the {ceiling:?} wait ceiling"
                            ),
                            retry_after: Some(delay),
                        });
                    }
                    tracing::debug!(
                        "session {} waiting {delay:?} for quota on {model}",
                        session.id()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn execute_send(&self, session: &RequestSession) -> Result<Completion, Error> {
        self.admit(session).await?;
        let started = self.clock.now();
        loop {
            let attempt = session.begin_attempt().ok_or_else(|| cancelled(session))?;
            self.usage.attempt();
            tracing::debug!("session {} attempt {attempt}", session.id());

            let error = match self.provider.generate(session.request()).await {
                Ok(completion) => {
                    if let Some(usage) = completion.usage {
                        session.record_usage(usage);
                    }
                    // A cancel that won the race discards the result.
                    if session.commit(&completion.text).is_none() || !session.complete() {
                        return Err(cancelled(session));
                    }
                    return Ok(completion);
                }
                Err(error) => error,
            };
            let delay = self.backoff(session, error, attempt, started)?;
            tokio::time::sleep(delay).await;
        }
    }

    async fn execute_stream(
        &self,
        session: &RequestSession,
        tx: &mpsc::Sender<Result<TextChunk, Error>>,
    ) -> Result<(), Error> {
        self.admit(session).await?;
        let started = self.clock.now();
        loop {
            let attempt = session.begin_attempt().ok_or_else(|| cancelled(session))?;
            self.usage.attempt();
            tracing::debug!("session {} stream attempt {attempt}", session.id());

            let mut chunks = pin!(self.provider.stream(session.request()));
            let mut failure = None;
            while let Some(next) = chunks.next().await {
                let chunk = match next {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        failure = Some(error);
                        break;
                    }
                };
                if let Some(usage) = chunk.usage {
                    session.record_usage(usage);
                }
                let Some(text) = chunk.content() else {
                    continue;
                };
                let Some(delivered) = session.commit(text) else {
                    return Err(cancelled(session));
                };
                if tx.send(Ok(delivered)).await.is_err() {
                    session.cancel(CancelReason::Dropped);
                    return Err(cancelled(session));
                }
            }

            match failure {
                None if session.complete() => return Ok(()),
                None => return Err(cancelled(session)),
                // Output already went out; retrying would duplicate it.
                Some(error) if session.has_output() => {
                    tracing::warn!(
                        "session {} failed after partial output: {error}",
                        session.id()
                    );
                    if error.is_rate_limited() {
                        self.quota.penalize(
                            &session.request().model,
                            self.penalty(&error, attempt),
                        );
                    }
                    return Err(surface(error, attempt));
                }
                Some(error) => {
                    let delay = self.backoff(session, error, attempt, started)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Decide on a failed attempt: the delay before the next one, or the
    /// error to surface.
    fn backoff(
        &self,
        session: &RequestSession,
        mut error: ProviderError,
        attempt: u32,
        started: Instant,
    ) -> Result<Duration, Error> {
        if error.is_rate_limited() {
            // The retry sleeps exactly as long as the model stays blocked.
            let block = self.penalty(&error, attempt);
            self.quota.penalize(&session.request().model, block);
            error.retry_after = Some(block);
        }
        let elapsed = self.clock.now().saturating_duration_since(started);
        let decision = self.retry.decide(&error, attempt, elapsed);
        if decision.should_retry {
            tracing::warn!(
                "session {} attempt {attempt} failed, retrying in {:?}: {error}",
                session.id(),
                decision.delay
            );
            return Ok(decision.delay);
        }
        tracing::debug!("session {} giving up: {}", session.id(), decision.reason);
        Err(surface(error, attempt))
    }

    fn penalty(&self, error: &ProviderError, attempt: u32) -> Duration {
        error
            .retry_after
            .unwrap_or_else(|| self.retry.next_delay(attempt))
    }
}

fn rejected(reason: String) -> Error {
    Error::AttachmentRejected { reason }
}

fn cancelled(session: &RequestSession) -> Error {
    Error::Cancelled(session.cancel_reason().unwrap_or(CancelReason::User))
}

fn surface(error: ProviderError, attempts: u32) -> Error {
    match classify(&error) {
        Classification::Fatal => Error::Fatal(error),
        Classification::Retryable => Error::Transient {
            attempts,
            source: error,
        },
    }
}

/// The pending result of [`ServiceClient::send`].
///
/// Dropping it cancels the call.
pub struct PendingReply {
    session: Arc<RequestSession>,
    rx: oneshot::Receiver<Result<Completion, Error>>,
}

impl PendingReply {
    /// Id of the session, for [`ServiceClient::cancel`].
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }
}

impl Future for PendingReply {
    type Output = Result<Completion, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(Error::Cancelled(
                self.session
                    .cancel_reason()
                    .unwrap_or(CancelReason::Dropped),
            ))),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.session.cancel(CancelReason::Dropped);
    }
}

/// The chunks of [`ServiceClient::send_stream`].
///
/// Ends after the last chunk, after an `Err` item, or silently once the
/// session is cancelled. Hitting the session timeout also ends it without
/// an item, so check [`state`](Self::state) after `None` to tell
/// `Cancelled(Timeout)` apart from a user cancel or completion;
/// [`text`](Self::text) reports it as an error. Dropping it cancels the
/// call.
pub struct ResponseStream {
    session: Arc<RequestSession>,
    rx: mpsc::Receiver<Result<TextChunk, Error>>,
    done: bool,
}

impl ResponseStream {
    /// Id of the session, for [`ServiceClient::cancel`].
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Output committed so far.
    pub fn output(&self) -> String {
        self.session.output()
    }

    /// Collect the remaining chunks into one string.
    pub async fn text(mut self) -> Result<String, Error> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk?.text);
        }
        match self.state() {
            SessionState::Cancelled(reason) => Err(Error::Cancelled(reason)),
            _ => Ok(text),
        }
    }
}

impl Stream for ResponseStream {
    type Item = Result<TextChunk, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        // Anything still buffered after a cancel is never delivered.
        if this.is_cancelled() {
            return Poll::Ready(this.close());
        }
        let item = ready!(this.rx.poll_recv(cx));
        if item.is_none() || this.is_cancelled() {
            return Poll::Ready(this.close());
        }
        if matches!(item, Some(Err(_))) {
            this.done = true;
        }
        Poll::Ready(item)
    }
}

impl ResponseStream {
    fn is_cancelled(&self) -> bool {
        matches!(self.session.state(), SessionState::Cancelled(_))
    }

    fn close(&mut self) -> Option<Result<TextChunk, Error>> {
        self.done = true;
        self.rx.close();
        None
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        self.session.cancel(CancelReason::Dropped);
    }
}
