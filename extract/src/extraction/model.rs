//! The seam between the orchestrator and an external vision model.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::conversation::{Conversation, ImageAttachment};

/// Everything one model attempt needs.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// Conversation so far; the image belongs with its first user message.
    pub conversation: &'a Conversation,
    /// Image attached to this attempt.
    pub image: &'a ImageAttachment,
    /// Output schema the response must conform to.
    pub schema: &'a Value,
    /// Name under which the schema is registered.
    pub schema_name: &'a str,
    /// Whether deterministic sampling is requested.
    pub deterministic: bool,
    /// Attempt number (1-indexed).
    pub attempt: usize,
}

/// Transport or provider failure of a model call. Always retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// The provider could not be reached.
    #[error("Model transport error: {0}")]
    Transport(String),

    /// The provider answered with an error status.
    #[error("Model provider returned {status}: {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Error body or message.
        message: String,
    },

    /// The call exceeded its transport timeout.
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    /// The provider's envelope could not be read.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// An external model that turns an image and a schema into a JSON candidate.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Performs one round-trip and returns the raw response content.
    async fn complete(&self, request: &ModelRequest<'_>) -> Result<String, ModelError>;
}
