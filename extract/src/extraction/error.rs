//! Error types for extraction operations with attempt history tracking.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::metrics::ExtractionMetrics;
use super::model::ModelError;
use crate::validation::Violation;

/// Why a single attempt did not produce a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The response was received but did not validate.
    Invalid(Vec<Violation>),
    /// The model call itself failed.
    Transport(ModelError),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(violations) => {
                let joined: Vec<String> = violations.iter().map(ToString::to_string).collect();
                write!(f, "{}", joined.join("; "))
            }
            Self::Transport(error) => write!(f, "{error}"),
        }
    }
}

/// Record of a single extraction attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt_number: usize,
    /// Raw model output, when the call returned one.
    pub raw_response: Option<String>,
    /// What went wrong.
    pub failure: AttemptFailure,
    /// Elapsed time at this attempt.
    pub elapsed: Duration,
}

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Every attempt failed.
    #[error("Extraction failed after {attempts} attempts: {last_failure}")]
    AttemptsExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Failure of the final attempt.
        last_failure: AttemptFailure,
        /// History of all attempts.
        history: Vec<AttemptRecord>,
        /// Metrics tracked across all attempts.
        metrics: ExtractionMetrics,
    },

    /// The orchestrator was configured so that no attempt can run.
    #[error("Invalid extraction configuration: {0}")]
    InvalidConfig(String),
}

impl ExtractionError {
    /// Number of model attempts spent before failing.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::AttemptsExhausted { attempts, .. } => *attempts,
            Self::InvalidConfig(_) => 0,
        }
    }
}
