//! Client for chat-completions vision models with JSON-schema constrained output.
//!
//! This crate provides API key discovery, request construction with an inline
//! image, and a timed HTTP round-trip that returns the model's raw answer.

/// Resolution of the API key.
pub mod discovery;
/// Error types returned by client operations.
pub mod error;
/// HTTP round-trip and response interpretation.
pub mod http;
/// Request body construction.
pub mod request;
/// Shared data types for configuration, requests and wire envelopes.
pub mod types;

pub use discovery::{discover_api_key, API_KEY_ENV_VAR};
pub use error::VisionError;
pub use types::*;

/// High-level client for a vision chat-completions endpoint.
#[derive(Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    api_key: String,
    config: VisionConfig,
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VisionClient {
    /// Creates a client with a resolved API key.
    ///
    /// # Errors
    ///
    /// Returns `VisionError::InvalidConfig` for a zero timeout or an empty
    /// model name, and `VisionError::Transport` if the HTTP client cannot be
    /// built.
    pub fn new(api_key: String, config: VisionConfig) -> Result<Self, VisionError> {
        if config.timeout.is_zero() {
            return Err(VisionError::InvalidConfig("timeout must be positive".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(VisionError::InvalidConfig("model must not be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    /// Creates a client, resolving the key via [`discover_api_key`].
    ///
    /// # Errors
    ///
    /// Returns `VisionError::MissingApiKey` when no key is available.
    pub fn from_env(explicit_key: Option<String>, config: VisionConfig) -> Result<Self, VisionError> {
        let key = discover_api_key(explicit_key)?;
        Self::new(key, config)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Sends one schema-constrained request and returns the raw answer.
    ///
    /// # Errors
    ///
    /// Returns `VisionError` on transport failure, timeout, error status,
    /// refusal or an unreadable envelope.
    pub async fn complete(&self, request: &VisionRequest<'_>) -> Result<String, VisionError> {
        let body = request::build_body(&self.config, request);
        http::send_completion(&self.http, &self.config, &self.api_key, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_timeout() {
        let config = VisionConfig {
            timeout: Duration::ZERO,
            ..VisionConfig::default()
        };
        assert!(matches!(
            VisionClient::new("sk-test".into(), config),
            Err(VisionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = VisionClient::new("sk-secret".into(), VisionConfig::default()).unwrap();
        assert!(!format!("{client:?}").contains("sk-secret"));
    }

    #[test]
    fn test_completions_url() {
        let config = VisionConfig {
            base_url: "http://127.0.0.1:9000/v1/".into(),
            ..VisionConfig::default()
        };
        assert_eq!(config.completions_url(), "http://127.0.0.1:9000/v1/chat/completions");
    }
}
