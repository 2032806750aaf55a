//! Model metadata.
//!
//! [`RemoteModel`] is what a provider reports, possibly with holes;
//! [`ModelDescriptor`] is the complete, immutable record the registry hands
//! out after filling those holes with conservative defaults.

use serde::{Deserialize, Serialize};

/// Token limit assumed for models whose limit is unknown.
pub const DEFAULT_TOKEN_FLOOR: u64 = 8_192;

/// A fully-resolved model description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider model id (e.g. `models/gemini-1.5-flash-latest`).
    pub id: String,
    /// Human readable name.
    pub display_name: String,
    /// Input token limit.
    pub token_limit: u64,
    /// Whether incremental responses are supported.
    pub supports_streaming: bool,
    /// Whether binary attachments (images, documents) are accepted.
    pub supports_multimodal: bool,
}

impl ModelDescriptor {
    /// The id without the provider's `models/` prefix.
    pub fn short_id(&self) -> &str {
        self.id.strip_prefix("models/").unwrap_or(&self.id)
    }

    /// Whether `id` names this model, with or without the `models/` prefix.
    pub fn matches(&self, id: &str) -> bool {
        self.short_id() == id.strip_prefix("models/").unwrap_or(id)
    }
}

/// A raw model entry as listed by the provider.
///
/// Every field except `id` may be missing; providers are not trusted to
/// report complete metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteModel {
    /// Provider model id.
    pub id: String,
    /// Display name, if reported.
    pub display_name: Option<String>,
    /// Input token limit, if reported.
    pub token_limit: Option<u64>,
    /// Generation methods the model supports (e.g. `generateContent`).
    pub methods: Vec<String>,
    /// Streaming support, if the provider says so.
    pub supports_streaming: Option<bool>,
    /// Attachment support, if the provider says so.
    pub supports_multimodal: Option<bool>,
}

impl RemoteModel {
    /// Create an entry with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Resolve into a descriptor, filling unknown fields.
    ///
    /// A missing token limit falls back to the static family map, which in
    /// turn falls back to [`DEFAULT_TOKEN_FLOOR`].
    pub fn into_descriptor(self) -> ModelDescriptor {
        let token_limit = self
            .token_limit
            .filter(|limit| *limit > 0)
            .unwrap_or_else(|| default_token_limit(&self.id));
        let display_name = self
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.id.strip_prefix("models/").unwrap_or(&self.id).to_owned());
        ModelDescriptor {
            supports_streaming: self.supports_streaming.unwrap_or(false),
            supports_multimodal: self.supports_multimodal.unwrap_or(false),
            id: self.id,
            display_name,
            token_limit,
        }
    }
}

/// Returns the default input token limit for a known model id.
///
/// Uses prefix matching against known model families. Unknown models
/// return [`DEFAULT_TOKEN_FLOOR`].
pub fn default_token_limit(model_id: &str) -> u64 {
    let id = model_id.strip_prefix("models/").unwrap_or(model_id);
    // Gemini 1.5 Pro
    if id.starts_with("gemini-1.5-pro") {
        return 2_097_152;
    }
    // Gemini 1.5 Flash, 2.x and later
    if id.starts_with("gemini-1.5-flash")
        || id.starts_with("gemini-2")
        || id.starts_with("gemini-exp")
    {
        return 1_048_576;
    }
    // Gemini 1.0 vision
    if id.starts_with("gemini-pro-vision") || id.starts_with("gemini-1.0-pro-vision") {
        return 12_288;
    }
    // Gemini 1.0 Pro
    if id.starts_with("gemini-pro") || id.starts_with("gemini-1.0-pro") {
        return 30_720;
    }
    DEFAULT_TOKEN_FLOOR
}
