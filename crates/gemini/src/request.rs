//! Request body for `generateContent` and `streamGenerateContent`.

use acore::{Request, SafetySetting};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;

/// The `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; the client always sends a single user turn.
    pub contents: Vec<Content>,
    /// Safety thresholds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    /// Build the body for `request`.
    ///
    /// Text goes first, followed by each attachment as base64 inline data.
    pub fn new(request: &Request, safety: &[SafetySetting]) -> Self {
        let mut parts = Vec::with_capacity(request.prompt.attachments.len() + 1);
        if !request.prompt.text.is_empty() {
            parts.push(Part::Text(request.prompt.text.clone()));
        }
        parts.extend(request.prompt.attachments.iter().map(|attachment| {
            Part::InlineData(Blob {
                mime_type: attachment.mime_type.clone(),
                data: STANDARD.encode(&attachment.data),
            })
        }));

        Self {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            safety_settings: safety.to_vec(),
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    /// Author of the turn.
    pub role: &'static str,
    /// Ordered parts.
    pub parts: Vec<Part>,
}

/// One part of a turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Base64-encoded binary payload.
    InlineData(Blob),
}

/// Inline binary payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// MIME type.
    pub mime_type: String,
    /// Base64 data.
    pub data: String,
}
