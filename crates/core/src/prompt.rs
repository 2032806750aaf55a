//! Outbound request payloads.

use serde::{Deserialize, Serialize};

/// Tokens charged for a single inline image, regardless of its size.
const IMAGE_TOKENS: usize = 258;

/// A binary attachment sent alongside the prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Raw bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Source file name, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    /// Create a new attachment
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
            name: None,
        }
    }

    /// Attach a file name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A label for logs and error messages.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.mime_type)
    }

    /// Estimate the number of tokens this attachment costs.
    pub fn estimate_tokens(&self) -> usize {
        if self.mime_type.starts_with("image/") {
            IMAGE_TOKENS
        } else {
            (self.data.len() / 4).max(1)
        }
    }
}

/// Prompt text plus optional attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// The prompt text
    pub text: String,
    /// Binary attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Prompt {
    /// Create a text-only prompt
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// Estimate the number of tokens in this prompt.
    ///
    /// Uses a simple heuristic: ~4 characters per token for text.
    pub fn estimate_tokens(&self) -> usize {
        let text = (self.text.len() / 4).max(1);
        text + self
            .attachments
            .iter()
            .map(Attachment::estimate_tokens)
            .sum::<usize>()
    }

    /// Total attachment payload in bytes.
    pub fn attachment_bytes(&self) -> usize {
        self.attachments.iter().map(Attachment::len).sum()
    }
}

/// One logical call: a model id and a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The model to use
    pub model: String,
    /// The prompt to send
    pub prompt: Prompt,
}

impl Request {
    /// Create a text-only request
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Prompt::text(text),
        }
    }

    /// Add an attachment
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.prompt.attachments.push(attachment);
        self
    }

    /// Estimate the number of tokens this request will consume.
    pub fn estimate_tokens(&self) -> u64 {
        self.prompt.estimate_tokens() as u64
    }
}
