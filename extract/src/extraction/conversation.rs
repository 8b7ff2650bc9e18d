//! Ordered message log exchanged with the vision model.
//!
//! Each submission owns one [`Conversation`]. The repair loop grows it by
//! value, so every model call sees an explicit snapshot of the exchange so far.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing instructions.
    System,
    /// Requests and corrections.
    User,
    /// The model's own earlier output.
    Assistant,
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The request/response history of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Starts a conversation with the extraction rules and the opening request.
    #[must_use]
    pub fn opening(rules: &str, request: &str) -> Self {
        Self {
            messages: vec![Message::new(Role::System, rules), Message::new(Role::User, request)],
        }
    }

    /// Appends the model's invalid response verbatim followed by a correction.
    #[must_use]
    pub fn with_repair(mut self, response: &str, correction: impl Into<String>) -> Self {
        self.messages.push(Message::new(Role::Assistant, response));
        self.messages.push(Message::new(Role::User, correction));
        self
    }

    /// Messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total characters across all messages.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }
}

/// The document image attached to every model attempt.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    /// Raw image bytes.
    pub bytes: Arc<[u8]>,
}

impl ImageAttachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}
