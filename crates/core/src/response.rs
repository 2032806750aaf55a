//! Provider responses.

use serde::{Deserialize, Serialize};

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u64,
    /// Tokens generated
    pub output_tokens: u64,
}

impl Usage {
    /// Prompt plus output tokens.
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.output_tokens
    }
}

/// A complete, non-streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Token usage, when reported
    pub usage: Option<Usage>,
}

impl Completion {
    /// Create a completion without usage information
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// One incremental payload from a streaming provider call.
///
/// The final chunk of a Gemini stream usually carries the usage block, and
/// may carry no text at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text delta
    pub text: String,
    /// Token usage, when reported
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Get the text delta, if any
    pub fn content(&self) -> Option<&str> {
        Some(self.text.as_str()).filter(|s| !s.is_empty())
    }
}

/// A chunk as delivered to the collaborator of a streaming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Zero-based position within the session's output.
    pub index: usize,
    /// Text delta
    pub text: String,
}
