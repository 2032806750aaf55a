//! Gemini provider for the AI Studio service client.
//!
//! Implements [`acore::Provider`] over the `generativelanguage` REST API:
//! one `generateContent` call per attempt, `streamGenerateContent` with SSE
//! for streaming, and paginated `models.list` for discovery.

use acore::{
    ApiKey, Completion, Provider, ProviderError, RemoteModel, Request, SafetySetting, StreamChunk,
};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
pub use http::HttpProvider;
pub use reqwest::{self, Client};
use request::GenerateContentRequest;
use response::{GenerateContentResponse, ModelPage, remote_model};

pub mod http;
pub mod request;
pub mod response;
pub mod sse;

/// The public Gemini endpoint.
pub const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Models requested per listing page.
const PAGE_SIZE: &str = "1000";

/// The Gemini provider.
#[derive(Clone)]
pub struct Gemini {
    http: HttpProvider,
    safety: Vec<SafetySetting>,
}

impl Gemini {
    /// Create a provider for the public endpoint.
    pub fn new(client: Client, key: &ApiKey) -> Result<Self> {
        Self::custom(client, key, ENDPOINT)
    }

    /// Create a provider for a custom base URL (proxies, tests).
    pub fn custom(client: Client, key: &ApiKey, base_url: &str) -> Result<Self> {
        Ok(Self {
            http: HttpProvider::api_key(client, key, base_url)?,
            safety: Vec::new(),
        })
    }

    /// Send these safety thresholds with every request.
    pub fn with_safety(mut self, safety: Vec<SafetySetting>) -> Self {
        self.safety = safety;
        self
    }
}

/// API path of a model resource; bare ids get the `models/` prefix.
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

impl Provider for Gemini {
    async fn generate(&self, request: &Request) -> Result<Completion, ProviderError> {
        let body = GenerateContentRequest::new(request, &self.safety);
        let path = format!("{}:generateContent", model_path(&request.model));
        tracing::debug!("generateContent on {}", request.model);
        let response: GenerateContentResponse = self.http.post_json(&path, &body).await?;
        response.into_completion()
    }

    fn stream(
        &self,
        request: &Request,
    ) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'static {
        let body = GenerateContentRequest::new(request, &self.safety);
        let path = format!("{}:streamGenerateContent", model_path(&request.model));
        tracing::debug!("streamGenerateContent on {}", request.model);
        let events = self.http.post_sse(&path, &[("alt", "sse")], &body);

        try_stream! {
            let mut events = std::pin::pin!(events);
            while let Some(data) = events.next().await {
                let data = data?;
                let response: GenerateContentResponse = serde_json::from_str(&data).map_err(|e| {
                    ProviderError::new(
                        acore::ProviderErrorKind::Decode,
                        format!("failed to decode stream event: {e}"),
                    )
                })?;
                let (chunk, err) = response.into_chunk();
                if chunk.content().is_some() || chunk.usage.is_some() {
                    yield chunk;
                }
                if let Some(err) = err {
                    Err::<(), _>(err)?;
                }
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>, ProviderError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("pageSize", PAGE_SIZE.to_owned())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let page: ModelPage = self.http.get_json("models", &query).await?;
            models.extend(page.models.iter().filter_map(remote_model));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        tracing::debug!("listed {} models", models.len());
        Ok(models)
    }
}
