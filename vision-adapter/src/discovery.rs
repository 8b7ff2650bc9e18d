//! Resolution of the API key used to authenticate against the vision API.

use crate::error::VisionError;

/// Environment variable holding the API key.
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// Locates the API key.
///
/// Resolution order:
/// 1. `explicit` if provided and non-empty.
/// 2. The value of the `OPENAI_API_KEY` environment variable.
///
/// # Errors
///
/// Returns `VisionError::MissingApiKey` when neither source yields a key.
pub fn discover_api_key(explicit: Option<String>) -> Result<String, VisionError> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(key);
    }

    std::env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or(VisionError::MissingApiKey(API_KEY_ENV_VAR))
}
