//! Shared data types for client configuration, requests and wire envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "o4-mini";

/// Configuration for a [`crate::VisionClient`].
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Upper bound on one HTTP round-trip.
    pub timeout: Duration,
    /// Whether the provider enforces the response schema strictly.
    pub strict_schema: bool,
    /// Optional cap on completion tokens.
    pub max_completion_tokens: Option<u32>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            strict_schema: false,
            max_completion_tokens: None,
        }
    }
}

impl VisionConfig {
    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Standing instructions.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One text message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
}

/// Image bytes sent alongside the conversation.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    /// MIME type, e.g. `image/png`.
    pub media_type: &'a str,
    /// Raw bytes; encoded as a data URL on the wire.
    pub bytes: &'a [u8],
}

/// One schema-constrained completion request.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    /// Ordered conversation. The image is attached to the first user message.
    pub messages: &'a [ChatMessage],
    /// The document image.
    pub image: ImageInput<'a>,
    /// JSON schema the answer must conform to.
    pub schema: &'a Value,
    /// Name the schema is registered under.
    pub schema_name: &'a str,
    /// Request deterministic sampling.
    pub deterministic: bool,
}

/// Successful completion envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    /// Completion choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// One completion choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ResponseMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Text content, absent on refusal.
    #[serde(default)]
    pub content: Option<String>,
    /// Refusal explanation, if the model declined.
    #[serde(default)]
    pub refusal: Option<String>,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    /// Error details.
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Provider error type.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}
