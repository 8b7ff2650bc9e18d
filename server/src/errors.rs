use thiserror::Error;

/// Errors raised while starting or running the service.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document schema could not be loaded.
    #[error("Schema error: {0}")]
    Schema(#[from] bargedoc_extract::schema::SchemaError),

    /// The result store could not be opened.
    #[error("Result store error: {0}")]
    Store(#[from] bargedoc_extract::store::StoreError),

    /// The vision client could not be created.
    #[error("Vision client error: {0}")]
    Vision(#[from] bargedoc_vision::VisionError),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
