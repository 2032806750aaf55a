//! Provider abstraction for upstream model services

use crate::{Completion, ProviderError, RemoteModel, Request, StreamChunk};
use futures_core::Stream;

/// An upstream generative model service.
///
/// One call to `generate` or `stream` is one network attempt; retries,
/// quotas and cancellation live in the client, not here. Constructors are
/// inherent methods on each provider.
pub trait Provider: Clone + Send + Sync + 'static {
    /// Generate a complete response.
    fn generate(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;

    /// Generate a response as an ordered sequence of chunks.
    ///
    /// The stream owns everything it needs; dropping it aborts the
    /// underlying exchange.
    fn stream(
        &self,
        request: &Request,
    ) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static;

    /// List the models the credential can access.
    fn list_models(&self) -> impl Future<Output = Result<Vec<RemoteModel>, ProviderError>> + Send;
}
