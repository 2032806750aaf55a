//! Shared HTTP transport for the Gemini REST API.
//!
//! `HttpProvider` wraps a `reqwest::Client` with pre-configured headers and
//! the API base URL. Provides JSON requests and Server-Sent Events
//! streaming, and maps every failure into a redacted [`ProviderError`].

use crate::{
    response::{error_from_body, parse_retry_after},
    sse::SseDecoder,
};
use acore::{ApiKey, ProviderError, ProviderErrorKind, redact};
use anyhow::Result;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{
    Client, RequestBuilder, Response,
    header::{self, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

/// Header carrying the credential.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP transport with the credential baked into its headers.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    headers: HeaderMap,
    base_url: String,
    key: ApiKey,
}

impl HttpProvider {
    /// Create a transport authenticating with an API key header.
    ///
    /// The header is marked sensitive so it never shows up in debug output.
    pub fn api_key(client: Client, key: &ApiKey, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let mut value = HeaderValue::from_str(key.expose())?;
        value.set_sensitive(true);
        headers.insert(API_KEY_HEADER, value);
        Ok(Self {
            client,
            headers,
            base_url: base_url.trim_end_matches('/').to_owned(),
            key: key.clone(),
        })
    }

    /// Absolute URL of an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and deserialize the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ProviderError> {
        let request = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .json(body);
        self.json(request).await
    }

    /// GET a JSON resource.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let request = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .query(query);
        self.json(request).await
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let secret = self.key.expose();
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, secret))?;
        let response = check_status(response, secret).await?;
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, secret))?;
        tracing::trace!("response: {text}");
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::new(
                ProviderErrorKind::Decode,
                format!("failed to decode response: {e}"),
            )
        })
    }

    /// POST a JSON body and stream the `data` payloads of the SSE response.
    ///
    /// The returned stream owns the request; dropping it closes the
    /// connection.
    pub fn post_sse<B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> impl Stream<Item = Result<String, ProviderError>> + Send + 'static + use<B> {
        let request = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .header(header::ACCEPT, "text/event-stream")
            .query(query)
            .json(body);
        let key = self.key.clone();

        try_stream! {
            let secret = key.expose();
            let response = request.send().await.map_err(|e| transport_error(e, secret))?;
            let response = check_status(response, secret).await?;
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            while let Some(next) = bytes.next().await {
                let next = next.map_err(|e| transport_error(e, secret))?;
                for data in decoder.push(&next) {
                    tracing::trace!("event: {data}");
                    yield data;
                }
            }
            if let Some(data) = decoder.finish() {
                yield data;
            }
        }
    }
}

/// Turn a non-success response into a provider error.
async fn check_status(response: Response, secret: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), &body, retry_after).redacted(secret))
}

/// Map a `reqwest` failure; the URL is dropped from the message.
fn transport_error(err: reqwest::Error, secret: &str) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_decode() {
        ProviderErrorKind::Decode
    } else {
        ProviderErrorKind::Network
    };
    let status = err.status().map(|s| s.as_u16());
    let message = redact(&err.without_url().to_string(), secret);
    ProviderError {
        kind,
        status,
        message,
        retry_after: None,
    }
}
