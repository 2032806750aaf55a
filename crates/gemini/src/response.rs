//! Response bodies: completions, errors and model listings.

use acore::{Completion, ProviderError, ProviderErrorKind, RemoteModel, StreamChunk, Usage};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Finish reasons that mean the output was withheld.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "RECITATION",
];

/// A `generateContent` response, or one event of a stream.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentResponse {
    /// Generated candidates; the client reads the first.
    pub candidates: Vec<Candidate>,
    /// Set when the prompt itself was blocked.
    pub prompt_feedback: Option<PromptFeedback>,
    /// Token accounting.
    pub usage_metadata: Option<UsageMetadata>,
    /// An error reported inside a stream.
    pub error: Option<ErrorDetail>,
}

/// A generated candidate.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    /// Generated content.
    pub content: Option<CandidateContent>,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Content of a candidate.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CandidateContent {
    /// Output parts.
    pub parts: Vec<OutputPart>,
}

/// An output part; only text is read.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputPart {
    /// Text, if this is a text part.
    pub text: Option<String>,
}

/// Prompt-level feedback.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptFeedback {
    /// Why the prompt was blocked.
    pub block_reason: Option<String>,
}

/// Token accounting.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageMetadata {
    /// Prompt tokens.
    pub prompt_token_count: u64,
    /// Output tokens.
    pub candidates_token_count: u64,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Token usage, when reported.
    pub fn usage(&self) -> Option<Usage> {
        self.usage_metadata.as_ref().map(|meta| Usage {
            prompt_tokens: meta.prompt_token_count,
            output_tokens: meta.candidates_token_count,
        })
    }

    /// A content-policy error if the prompt or the output was blocked.
    pub fn blocked(&self) -> Option<ProviderError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Some(ProviderError::new(
                ProviderErrorKind::ContentPolicy,
                format!("prompt blocked: {reason}"),
            ));
        }
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| BLOCKING_FINISH_REASONS.contains(reason))
            .map(|reason| {
                ProviderError::new(
                    ProviderErrorKind::ContentPolicy,
                    format!("output blocked: {reason}"),
                )
            })
    }

    /// Convert a non-streamed response.
    pub fn into_completion(self) -> Result<Completion, ProviderError> {
        if let Some(err) = self.error {
            return Err(err.into_provider_error(None, None));
        }
        if let Some(err) = self.blocked() {
            return Err(err);
        }
        Ok(Completion {
            text: self.text(),
            usage: self.usage(),
        })
    }

    /// Convert one stream event into a chunk plus an optional terminal error.
    ///
    /// Text that arrived in the same event as a block is still returned so
    /// partial output is not lost.
    pub fn into_chunk(self) -> (StreamChunk, Option<ProviderError>) {
        let chunk = StreamChunk {
            text: self.text(),
            usage: self.usage(),
        };
        let err = match self.error {
            Some(err) => Some(err.into_provider_error(None, None)),
            None => self.blocked(),
        };
        (chunk, err)
    }
}

/// The `{"error": {...}}` envelope.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    /// The error.
    pub error: ErrorDetail,
}

/// A Google API error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    /// HTTP status code.
    pub code: u16,
    /// Human readable message.
    pub message: String,
    /// Canonical status, e.g. `RESOURCE_EXHAUSTED`.
    pub status: String,
    /// Typed details (`RetryInfo`, `ErrorInfo`, ...).
    pub details: Vec<Value>,
}

impl ErrorDetail {
    /// Classify this error.
    ///
    /// The canonical status wins over the HTTP code: Gemini reports an
    /// invalid API key as `400 INVALID_ARGUMENT` with an `API_KEY_INVALID`
    /// reason.
    pub fn kind(&self, http_status: Option<u16>) -> ProviderErrorKind {
        if self.reasons().any(|r| r.starts_with("API_KEY")) {
            return ProviderErrorKind::Unauthorized;
        }
        match self.status.as_str() {
            "RESOURCE_EXHAUSTED" => ProviderErrorKind::RateLimited,
            "UNAUTHENTICATED" | "PERMISSION_DENIED" => ProviderErrorKind::Unauthorized,
            "NOT_FOUND" => ProviderErrorKind::NotFound,
            "DEADLINE_EXCEEDED" => ProviderErrorKind::Timeout,
            "UNAVAILABLE" | "INTERNAL" | "UNKNOWN" => ProviderErrorKind::Server,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => {
                ProviderErrorKind::InvalidRequest
            }
            _ => match http_status.or(Some(self.code).filter(|c| *c != 0)) {
                Some(status) => ProviderErrorKind::from_status(status),
                None => ProviderErrorKind::Server,
            },
        }
    }

    /// The `RetryInfo.retryDelay` hint, if present.
    pub fn retry_delay(&self) -> Option<Duration> {
        self.details
            .iter()
            .filter(|d| {
                d.get("@type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| t.ends_with("RetryInfo"))
            })
            .find_map(|d| d.get("retryDelay").and_then(Value::as_str))
            .and_then(parse_delay)
    }

    fn reasons(&self) -> impl Iterator<Item = &str> {
        self.details
            .iter()
            .filter_map(|d| d.get("reason").and_then(Value::as_str))
    }

    /// Convert into a provider error.
    ///
    /// A header hint takes precedence over the body's `RetryInfo`.
    pub fn into_provider_error(
        self,
        http_status: Option<u16>,
        retry_after: Option<Duration>,
    ) -> ProviderError {
        let retry_after = retry_after.or_else(|| self.retry_delay());
        ProviderError {
            kind: self.kind(http_status),
            status: http_status.or(Some(self.code).filter(|c| *c != 0)),
            message: self.message,
            retry_after,
        }
    }
}

/// Build an error from a non-success HTTP response body.
pub fn error_from_body(status: u16, body: &str, retry_after: Option<Duration>) -> ProviderError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(envelope) => envelope.error.into_provider_error(Some(status), retry_after),
        Err(_) => {
            let message = if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_owned()
            };
            ProviderError::status(status, message).with_retry_after(retry_after)
        }
    }
}

/// Upper bound on a server-supplied retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Parse a protobuf duration string such as `"17s"` or `"0.5s"`.
pub fn parse_delay(value: &str) -> Option<Duration> {
    value.trim().strip_suffix('s').and_then(seconds)
}

/// Parse a `Retry-After` header given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    seconds(value.trim())
}

/// Non-negative seconds, clamped to [`MAX_RETRY_DELAY`].
fn seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(secs)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY)),
    )
}

/// One page of `models.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelPage {
    /// Raw entries; parsed one by one so a malformed entry is skipped.
    pub models: Vec<Value>,
    /// Token for the next page.
    pub next_page_token: Option<String>,
}

/// Convert one listing entry, tolerating missing fields.
///
/// Returns `None` only when the entry has no usable name.
pub fn remote_model(entry: &Value) -> Option<RemoteModel> {
    let Some(id) = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
    else {
        tracing::warn!("skipping model entry without a name: {entry}");
        return None;
    };

    let methods: Vec<String> = entry
        .get("supportedGenerationMethods")
        .and_then(Value::as_array)
        .map(|methods| {
            methods
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    let supports_streaming = (!methods.is_empty()).then(|| {
        methods
            .iter()
            .any(|m| m == "generateContent" || m == "streamGenerateContent")
    });

    Some(RemoteModel {
        id: id.to_owned(),
        display_name: entry
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::to_owned),
        token_limit: entry.get("inputTokenLimit").and_then(Value::as_u64),
        supports_streaming,
        supports_multimodal: multimodal_family(id),
        methods,
    })
}

/// Attachment support inferred from the model family.
fn multimodal_family(id: &str) -> Option<bool> {
    let short = id.strip_prefix("models/").unwrap_or(id);
    if !short.starts_with("gemini-") {
        return None;
    }
    let text_only = (short.starts_with("gemini-pro") || short.starts_with("gemini-1.0-pro"))
        && !short.contains("vision");
    Some(!text_only)
}
