//! Request body construction for chat completions.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::types::{ChatRole, VisionConfig, VisionRequest};

/// Reasoning models (`o1`, `o3-mini`, `o4-mini`, ...) reject a sampling temperature.
fn accepts_temperature(model: &str) -> bool {
    let mut chars = model.chars();
    !(chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit()))
}

/// Data URL for inline image content.
#[must_use]
pub fn data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

/// Builds the JSON body of a chat completion request.
#[must_use]
pub fn build_body(config: &VisionConfig, request: &VisionRequest<'_>) -> Value {
    let image_url = data_url(request.image.media_type, request.image.bytes);
    let mut image_attached = false;

    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            if message.role == ChatRole::User && !image_attached {
                image_attached = true;
                json!({
                    "role": message.role,
                    "content": [
                        { "type": "text", "text": message.content },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]
                })
            } else {
                json!({ "role": message.role, "content": message.content })
            }
        })
        .collect();

    let mut body = json!({
        "model": config.model,
        "messages": messages,
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": request.schema_name,
                "schema": request.schema,
                "strict": config.strict_schema
            }
        }
    });

    if request.deterministic {
        body["seed"] = json!(0);
        if accepts_temperature(&config.model) {
            body["temperature"] = json!(0);
        }
    }

    if let Some(max) = config.max_completion_tokens {
        body["max_completion_tokens"] = json!(max);
    }

    body
}
