//! HTTP round-trip against the chat completions endpoint.

use serde_json::Value;
use std::time::Instant;
use tokio::time::timeout;

use crate::error::VisionError;
use crate::types::{ApiErrorEnvelope, ChatCompletion, VisionConfig};

/// Posts `body` and returns the first choice's content.
pub async fn send_completion(
    client: &reqwest::Client,
    config: &VisionConfig,
    api_key: &str,
    body: &Value,
) -> Result<String, VisionError> {
    let start = Instant::now();
    let url = config.completions_url();

    let exchange = async {
        let response = client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok::<_, VisionError>((status, text))
    };

    let (status, text) = timeout(config.timeout, exchange)
        .await
        .map_err(|_| VisionError::Timeout(config.timeout))??;

    tracing::debug!(
        event = "completion_received",
        model = %config.model,
        status,
        bytes = text.len(),
        elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "completion_received"
    );

    read_completion(status, &text)
}

/// Interprets a completion response.
///
/// # Errors
///
/// `Api` for non-2xx statuses, `Refusal` when the model declined and
/// `MalformedResponse` when the envelope carries no content.
pub fn read_completion(status: u16, body: &str) -> Result<String, VisionError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ApiErrorEnvelope>(body)
            .map_or_else(|_| body.trim().to_string(), |envelope| envelope.error.message);
        return Err(VisionError::Api { status, message });
    }

    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::MalformedResponse("no choices in response".to_string()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(VisionError::Refusal(refusal));
    }

    match choice.message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(VisionError::MalformedResponse(format!(
            "empty content (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))),
    }
}
