//! Test doubles for code built on the client.

use acore::{Completion, Provider, ProviderError, RemoteModel, Request, StreamChunk, Usage};
use futures_core::Stream;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

/// One scripted answer to a `generate` or `stream` call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A single text payload.
    Text(String),
    /// Stream chunks; `generate` joins them.
    Chunks(Vec<String>),
    /// Text with the token usage the provider reports for it.
    Metered {
        /// The reply text
        text: String,
        /// Reported usage
        usage: Usage,
    },
    /// An immediate failure.
    Fail(ProviderError),
    /// Some chunks, then a failure.
    FailAfter {
        /// Chunks sent before the failure
        chunks: Vec<String>,
        /// The failure
        error: ProviderError,
    },
    /// Chunks before and after a gate the test opens.
    Gated {
        /// Sent right away
        before: Vec<String>,
        /// Opened by the test
        gate: Arc<Notify>,
        /// Sent once the gate opens
        after: Vec<String>,
    },
    /// Never answers.
    Hang,
}

impl Reply {
    /// A text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A chunked reply.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }

    /// A failure with an HTTP status.
    pub fn status(status: u16) -> Self {
        Self::Fail(ProviderError::status(status, format!("HTTP {status}")))
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    models: Vec<RemoteModel>,
    listing_error: Option<ProviderError>,
    requests: Vec<Request>,
    list_calls: usize,
}

/// A provider that plays back scripted replies in order.
///
/// An exhausted script answers with an invalid-request error.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
    open_streams: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reply.
    pub fn then(self, reply: Reply) -> Self {
        self.push(reply);
        self
    }

    /// Append a reply through a shared handle.
    pub fn push(&self, reply: Reply) {
        self.script.lock().replies.push_back(reply);
    }

    /// Set the model listing.
    pub fn with_models(self, models: Vec<RemoteModel>) -> Self {
        self.script.lock().models = models;
        self
    }

    /// Make listing fail, or succeed again with `None`.
    pub fn fail_listing(&self, error: Option<ProviderError>) {
        self.script.lock().listing_error = error;
    }

    /// Number of `generate` and `stream` calls.
    pub fn calls(&self) -> usize {
        self.script.lock().requests.len()
    }

    /// Number of `list_models` calls.
    pub fn list_calls(&self) -> usize {
        self.script.lock().list_calls
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().requests.clone()
    }

    /// Streams created and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn next(&self, request: &Request) -> Reply {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script.replies.pop_front().unwrap_or_else(|| {
            Reply::Fail(ProviderError::status(400, "script exhausted"))
        })
    }
}

struct OpenStream(Arc<AtomicUsize>);

impl OpenStream {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Provider for ScriptedProvider {
    async fn generate(&self, request: &Request) -> Result<Completion, ProviderError> {
        match self.next(request) {
            Reply::Text(text) => Ok(Completion::text(text)),
            Reply::Chunks(chunks) => Ok(Completion::text(chunks.concat())),
            Reply::Metered { text, usage } => Ok(Completion {
                text,
                usage: Some(usage),
            }),
            Reply::Fail(error) | Reply::FailAfter { error, .. } => Err(error),
            Reply::Gated {
                before,
                gate,
                after,
            } => {
                gate.notified().await;
                Ok(Completion::text(format!(
                    "{}{}",
                    before.concat(),
                    after.concat()
                )))
            }
            Reply::Hang => std::future::pending().await,
        }
    }

    fn stream(
        &self,
        request: &Request,
    ) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
        let reply = self.next(request);
        let open = self.open_streams.clone();
        async_stream::stream! {
            let _open = OpenStream::new(open);
            match reply {
                Reply::Text(text) => yield Ok(StreamChunk::text(text)),
                Reply::Chunks(chunks) => {
                    for chunk in chunks {
                        yield Ok(StreamChunk::text(chunk));
                    }
                }
                Reply::Metered { text, usage } => {
                    yield Ok(StreamChunk::text(text));
                    yield Ok(StreamChunk { usage: Some(usage), ..StreamChunk::default() });
                }
                Reply::Fail(error) => yield Err(error),
                Reply::FailAfter { chunks, error } => {
                    for chunk in chunks {
                        yield Ok(StreamChunk::text(chunk));
                    }
                    yield Err(error);
                }
                Reply::Gated { before, gate, after } => {
                    for chunk in before {
                        yield Ok(StreamChunk::text(chunk));
                    }
                    gate.notified().await;
                    for chunk in after {
                        yield Ok(StreamChunk::text(chunk));
                    }
                }
                Reply::Hang => std::future::pending::<()>().await,
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>, ProviderError> {
        let mut script = self.script.lock();
        script.list_calls += 1;
        match &script.listing_error {
            Some(error) => Err(error.clone()),
            None => Ok(script.models.clone()),
        }
    }
}
