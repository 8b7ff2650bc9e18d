#![deny(missing_docs)]
//! HTTP service that turns photographed barge cargo documents into validated,
//! persisted records.
//!
//! It wires the extraction pipeline to an OpenAI-compatible vision model and
//! exposes it over axum.

/// Vision model implementations.
pub mod adapters;
/// Runtime settings.
pub mod config;
/// Error types for the service.
pub mod errors;
/// Submission intake and result retrieval.
pub mod gateway;
/// HTTP routes.
pub mod http;
/// Raw upload storage.
pub mod storage;

use std::sync::Arc;

use bargedoc_extract::extraction::{ExtractionOrchestrator, VisionModel};
use bargedoc_extract::store::FsResultStore;
use bargedoc_vision::VisionClient;

use adapters::openai::OpenAiVisionModel;
use config::Settings;
use errors::ServerError;
use gateway::SubmissionGateway;
use storage::UploadStore;

/// Builds the orchestrator around the configured vision model.
pub fn build_orchestrator(settings: &Settings) -> Result<ExtractionOrchestrator, ServerError> {
    settings.validate()?;
    let registry = Arc::new(settings.schema_registry()?);
    let client = VisionClient::from_env(settings.api_key.clone(), settings.vision_config())?;
    let model: Arc<dyn VisionModel> = Arc::new(OpenAiVisionModel::new(client));
    Ok(ExtractionOrchestrator::with_config(
        registry,
        model,
        settings.extraction_config(),
    ))
}

/// Builds the gateway: orchestrator, result store and upload store share the
/// upload directory.
pub fn build_gateway(settings: &Settings) -> Result<SubmissionGateway, ServerError> {
    let orchestrator = Arc::new(build_orchestrator(settings)?);
    let results = Arc::new(FsResultStore::open(&settings.upload_dir)?);
    let uploads = UploadStore::open(&settings.upload_dir)?;
    Ok(SubmissionGateway::new(
        orchestrator,
        results,
        uploads,
        settings.max_concurrent,
    ))
}
