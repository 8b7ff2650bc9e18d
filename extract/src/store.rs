//! Write-once persistence of finished submissions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::document::FieldDocument;
use crate::extraction::Extraction;
use crate::quality::QualityWarning;

/// Terminal status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// A validated document was extracted.
    Completed,
    /// Extraction failed; the record carries the error text.
    Error,
}

/// The persisted outcome of one submission. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Submission identifier.
    pub id: String,
    /// Original filename of the uploaded image.
    pub filename: String,
    /// When the pipeline finished.
    pub processed_at: DateTime<Utc>,
    /// Terminal status.
    pub status: RecordStatus,
    /// The extracted document, for completed submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FieldDocument>,
    /// The failure description, for failed submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Data-quality findings on the extracted document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<QualityWarning>,
    /// Number of model attempts the submission took.
    #[serde(default)]
    pub attempts: usize,
}

impl ResultRecord {
    /// Record of a successful extraction.
    #[must_use]
    pub fn completed(id: impl Into<String>, filename: impl Into<String>, extraction: &Extraction) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            processed_at: Utc::now(),
            status: RecordStatus::Completed,
            data: Some(extraction.document.clone()),
            error: None,
            warnings: extraction.warnings.clone(),
            attempts: extraction.attempts,
        }
    }

    /// Record of a failed extraction.
    #[must_use]
    pub fn failed(
        id: impl Into<String>,
        filename: impl Into<String>,
        error: impl Into<String>,
        attempts: usize,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            processed_at: Utc::now(),
            status: RecordStatus::Error,
            data: None,
            error: Some(error.into()),
            warnings: Vec::new(),
            attempts,
        }
    }
}

/// Errors from a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record already exists for this id. Ids are never reused.
    #[error("Result already exists for submission {0}")]
    AlreadyExists(String),

    /// No record exists for this id.
    #[error("Result not found for submission {0}")]
    NotFound(String),

    /// The id cannot name a record.
    #[error("Invalid submission id: {0:?}")]
    InvalidId(String),

    /// The stored bytes are not a valid record.
    #[error("Corrupt result record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// I/O error on the backing medium.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The blocking writer task did not complete.
    #[error("Store task failed: {0}")]
    Task(String),
}

/// Write-once storage of result records keyed by submission id.
///
/// Readers observe either no record or a complete one.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persists a record. Fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError>;

    /// Fetches a record, or [`StoreError::NotFound`].
    async fn get(&self, id: &str) -> Result<ResultRecord, StoreError>;
}

/// Result store backed by one JSON file per submission.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    /// Uses `dir` for records, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        let well_formed = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}_result.json")))
    }
}

#[async_trait]
impl ResultStore for FsResultStore {
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.id)?;
        let dir = self.dir.clone();
        let bytes = serde_json::to_vec_pretty(&record)?;
        let id = record.id;

        // Stage in the same directory, then link into place without clobbering.
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(&bytes)?;
            staged.as_file().sync_all()?;
            staged.persist_noclobber(&path).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(id.clone())
                } else {
                    StoreError::Io(e.error)
                }
            })?;
            tracing::debug!(event = "result_persisted", id = %id, path = %path.display(), "result_persisted");
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn get(&self, id: &str) -> Result<ResultRecord, StoreError> {
        let path = self.record_path(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// In-process result store.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: RwLock<HashMap<String, ResultRecord>>,
}

impl MemoryResultStore {
    /// Returns an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id.clone(), record);
        drop(records);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<ResultRecord, StoreError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
