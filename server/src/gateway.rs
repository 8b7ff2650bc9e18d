//! Entry point for submissions: validates input, runs the extraction on a
//! bounded worker and records every outcome.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use bargedoc_extract::document::FieldDocument;
use bargedoc_extract::extraction::{ExtractionOrchestrator, ImageAttachment};
use bargedoc_extract::quality::QualityWarning;
use bargedoc_extract::store::{RecordStatus, ResultRecord, ResultStore, StoreError};

use crate::storage::{extension_for, sniff_media_type, UploadStore};

/// Errors surfaced to the submitting caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The payload was rejected before extraction.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No record exists for the id.
    #[error("Result not found: {0}")]
    NotFound(String),

    /// Raw bytes could not be stored.
    #[error("Failed to store upload: {0}")]
    Upload(#[from] std::io::Error),

    /// Result records could not be read.
    #[error("Result store error: {0}")]
    Store(StoreError),
}

/// One inbound image.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Client-side filename.
    pub filename: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// Response returned for a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResponse {
    /// Submission id.
    pub id: String,
    /// Final status.
    pub status: RecordStatus,
    /// Validated document, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FieldDocument>,
    /// Failure description, on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Data-quality findings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<QualityWarning>,
}

impl From<ResultRecord> for SubmissionResponse {
    fn from(record: ResultRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            data: record.data,
            error: record.error,
            warnings: record.warnings,
        }
    }
}

/// Accepts submissions and drives them to a persisted Result Record.
pub struct SubmissionGateway {
    orchestrator: Arc<ExtractionOrchestrator>,
    results: Arc<dyn ResultStore>,
    uploads: UploadStore,
    permits: Arc<Semaphore>,
}

impl SubmissionGateway {
    /// Creates a gateway running at most `max_concurrent` extractions at once.
    #[must_use]
    pub fn new(
        orchestrator: Arc<ExtractionOrchestrator>,
        results: Arc<dyn ResultStore>,
        uploads: UploadStore,
        max_concurrent: usize,
    ) -> Self {
        Self {
            orchestrator,
            results,
            uploads,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Resolves the media type the model will be told, rejecting non-images.
    fn media_type(submission: &Submission) -> Result<String, GatewayError> {
        if submission.bytes.is_empty() {
            return Err(GatewayError::InvalidInput("uploaded file is empty".to_string()));
        }

        let declared = submission
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

        match (declared, sniff_media_type(&submission.bytes)) {
            (Some(ct), _) if !ct.starts_with("image/") => {
                Err(GatewayError::InvalidInput("File must be an image".to_string()))
            }
            (_, Some(sniffed)) => Ok(sniffed.to_string()),
            (Some(ct), None) => Ok(ct),
            (None, None) => Err(GatewayError::InvalidInput("File must be an image".to_string())),
        }
    }

    /// Runs one submission to completion.
    ///
    /// Extraction failures are not errors here: they produce a record and a
    /// response with `status: "error"`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty or non-image payloads and `Upload` when the
    /// raw bytes cannot be stored.
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionResponse, GatewayError> {
        let media_type = Self::media_type(&submission)?;
        let id = Uuid::new_v4().to_string();
        let extension = extension_for(&submission.filename, &media_type);

        let path = self.uploads.save(&id, &extension, &submission.bytes).await?;
        tracing::info!(
            event = "submission_accepted",
            submission = %id,
            filename = %submission.filename,
            media_type = %media_type,
            bytes = submission.bytes.len(),
            path = %path.display(),
            "submission_accepted"
        );

        let image = ImageAttachment::new(media_type, submission.bytes);
        let filename = submission.filename;
        let span = tracing::info_span!("submission", id = %id);

        // Detached so a caller disconnect does not cancel the extraction.
        let worker = tokio::spawn(
            run_extraction(
                Arc::clone(&self.orchestrator),
                Arc::clone(&self.results),
                Arc::clone(&self.permits),
                id.clone(),
                filename.clone(),
                image,
            )
            .instrument(span),
        );

        let record = match worker.await {
            Ok(record) => record,
            Err(join_error) => {
                tracing::error!(
                    event = "extraction_task_failed",
                    submission = %id,
                    error = %join_error,
                    "extraction_task_failed"
                );
                let record = ResultRecord::failed(&id, &filename, "extraction task failed", 0);
                persist(self.results.as_ref(), record.clone()).await;
                record
            }
        };

        Ok(record.into())
    }

    /// Reads a persisted record.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `Store` for unreadable records.
    pub async fn result(&self, id: &str) -> Result<ResultRecord, GatewayError> {
        self.results.get(id).await.map_err(|e| match e {
            StoreError::NotFound(id) | StoreError::InvalidId(id) => GatewayError::NotFound(id),
            other => GatewayError::Store(other),
        })
    }

    /// Extractions that can start immediately.
    #[must_use]
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

async fn run_extraction(
    orchestrator: Arc<ExtractionOrchestrator>,
    results: Arc<dyn ResultStore>,
    permits: Arc<Semaphore>,
    id: String,
    filename: String,
    image: ImageAttachment,
) -> ResultRecord {
    let record = match permits.acquire_owned().await {
        Ok(_permit) => match orchestrator.extract(&id, &image).await {
            Ok(extraction) => ResultRecord::completed(&id, &filename, &extraction),
            Err(error) => ResultRecord::failed(&id, &filename, error.to_string(), error.attempts()),
        },
        Err(_) => ResultRecord::failed(&id, &filename, "extraction workers are shut down", 0),
    };

    persist(results.as_ref(), record.clone()).await;
    record
}

/// A record that cannot be written is logged; the caller still gets the outcome.
async fn persist(results: &dyn ResultStore, record: ResultRecord) {
    let id = record.id.clone();
    let status = record.status;
    match results.put(record).await {
        Ok(()) => tracing::info!(event = "result_recorded", submission = %id, status = ?status, "result_recorded"),
        Err(error) => tracing::error!(
            event = "result_record_failed",
            submission = %id,
            error = %error,
            "result_record_failed"
        ),
    }
}
