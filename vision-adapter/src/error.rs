use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("API key not found: set {0} or pass one explicitly")]
    MissingApiKey(&'static str),

    #[error("Failed to reach the vision API: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Vision API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("The model refused the request: {0}")]
    Refusal(String),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for VisionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
