//! Runtime settings, read from flags with environment fallbacks.

use clap::{Args, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use bargedoc_extract::extraction::ExtractionConfig;
use bargedoc_extract::schema::SchemaRegistry;
use bargedoc_vision::{VisionConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::errors::ServerError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address the HTTP server listens on.
    #[arg(long, env = "BARGEDOC_BIND", default_value = "0.0.0.0:8000", global = true)]
    pub bind: SocketAddr,

    /// Directory holding uploaded images and result records.
    #[arg(long, env = "BARGEDOC_UPLOAD_DIR", default_value = "./uploads", global = true)]
    pub upload_dir: PathBuf,

    /// API key for the vision model.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Vision model identifier.
    #[arg(long, env = "BARGEDOC_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// API root of the chat completions provider.
    #[arg(long, env = "BARGEDOC_MODEL_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub model_base_url: String,

    /// Model attempts per submission.
    #[arg(long, env = "BARGEDOC_MAX_ATTEMPTS", default_value_t = 3, global = true)]
    pub max_attempts: usize,

    /// Timeout of one model call, in seconds.
    #[arg(long, env = "BARGEDOC_MODEL_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub model_timeout_secs: u64,

    /// Extractions allowed to run at once.
    #[arg(long, env = "BARGEDOC_MAX_CONCURRENT", default_value_t = 4, global = true)]
    pub max_concurrent: usize,

    /// Largest accepted upload, in megabytes.
    #[arg(long, env = "BARGEDOC_MAX_UPLOAD_MB", default_value_t = 25, global = true)]
    pub max_upload_mb: usize,

    /// JSON schema file replacing the built-in document schema.
    #[arg(long, env = "BARGEDOC_SCHEMA_PATH", global = true)]
    pub schema_path: Option<PathBuf>,

    /// Ask the provider to enforce the schema strictly.
    #[arg(long, env = "BARGEDOC_STRICT_SCHEMA", default_value_t = false, global = true)]
    pub strict_schema: bool,

    /// Log output format.
    #[arg(long, env = "BARGEDOC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

impl Settings {
    /// Checks values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_attempts == 0 {
            return Err(ServerError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(ServerError::Config("max_concurrent must be at least 1".to_string()));
        }
        if self.model_timeout_secs == 0 {
            return Err(ServerError::Config("model_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Loads the configured schema, or the built-in one.
    pub fn schema_registry(&self) -> Result<SchemaRegistry, ServerError> {
        let registry = match &self.schema_path {
            Some(path) => SchemaRegistry::from_path(path)?,
            None => SchemaRegistry::builtin()?,
        };
        Ok(registry)
    }

    /// Repair-loop configuration.
    #[must_use]
    pub fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig::default().with_max_attempts(self.max_attempts)
    }

    /// Vision client configuration.
    #[must_use]
    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            base_url: self.model_base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.model_timeout_secs),
            strict_schema: self.strict_schema,
            ..VisionConfig::default()
        }
    }

    /// Upload limit in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
