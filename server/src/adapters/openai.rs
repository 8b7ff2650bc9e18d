use async_trait::async_trait;

use bargedoc_extract::extraction::{Message, ModelError, ModelRequest, Role, VisionModel};
use bargedoc_vision::{ChatMessage, ChatRole, ImageInput, VisionClient, VisionError, VisionRequest};

/// [`VisionModel`] backed by an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiVisionModel {
    client: VisionClient,
}

impl OpenAiVisionModel {
    /// Wraps a configured client.
    #[must_use]
    pub const fn new(client: VisionClient) -> Self {
        Self { client }
    }
}

const fn chat_role(role: Role) -> ChatRole {
    match role {
        Role::System => ChatRole::System,
        Role::User => ChatRole::User,
        Role::Assistant => ChatRole::Assistant,
    }
}

fn chat_message(message: &Message) -> ChatMessage {
    ChatMessage {
        role: chat_role(message.role),
        content: message.content.clone(),
    }
}

/// Every client failure is an attempt-level failure for the repair loop.
fn model_error(error: VisionError) -> ModelError {
    match error {
        VisionError::Timeout(after) => ModelError::Timeout(after),
        VisionError::Api { status, message } => ModelError::Provider { status, message },
        VisionError::MalformedResponse(message) => ModelError::MalformedResponse(message),
        VisionError::Refusal(reason) => ModelError::MalformedResponse(format!("model refused: {reason}")),
        other => ModelError::Transport(other.to_string()),
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionModel {
    fn name(&self) -> &str {
        &self.client.config().model
    }

    async fn complete(&self, request: &ModelRequest<'_>) -> Result<String, ModelError> {
        let messages: Vec<ChatMessage> = request
            .conversation
            .messages()
            .iter()
            .map(chat_message)
            .collect();

        let vision_request = VisionRequest {
            messages: &messages,
            image: ImageInput {
                media_type: &request.image.media_type,
                bytes: &request.image.bytes,
            },
            schema: request.schema,
            schema_name: request.schema_name,
            deterministic: request.deterministic,
        };

        self.client.complete(&vision_request).await.map_err(model_error)
    }
}
