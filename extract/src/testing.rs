//! Test double for [`VisionModel`].
//!
//! [`ScriptedModel`] replays a fixed sequence of responses and records every
//! request it receives, so repair-loop behavior can be asserted without a
//! network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::extraction::conversation::Message;
use crate::extraction::model::{ModelError, ModelRequest, VisionModel};

/// Snapshot of one request seen by a [`ScriptedModel`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Attempt number reported by the orchestrator.
    pub attempt: usize,
    /// Conversation messages at the time of the call.
    pub messages: Vec<Message>,
    /// MIME type of the attached image.
    pub media_type: String,
    /// Whether deterministic sampling was requested.
    pub deterministic: bool,
}

/// A [`VisionModel`] that answers from a script.
///
/// Responses are consumed in order. Once the script is empty the repeating
/// response is returned, if set; otherwise the call fails with a transport
/// error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    repeat: Option<Result<String, ModelError>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    /// Creates a model that replays `responses` in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answers with `response` once the script is exhausted.
    #[must_use]
    pub fn then_repeat(mut self, response: Result<String, ModelError>) -> Self {
        self.repeat = Some(response);
        self
    }

    /// Sleeps before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_response(&self) -> Result<String, ModelError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.or_else(|| self.repeat.clone()).unwrap_or_else(|| {
            Err(ModelError::Transport("scripted model has no responses left".to_string()))
        })
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest<'_>) -> Result<String, ModelError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                attempt: request.attempt,
                messages: request.conversation.messages().to_vec(),
                media_type: request.image.media_type.clone(),
                deterministic: request.deterministic,
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_response()
    }
}
