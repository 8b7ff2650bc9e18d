//! Bounded repair loop for structured document extraction.
//!
//! - [`ExtractionOrchestrator`] - Async retry loop with validation feedback
//! - [`VisionModel`] - Seam to the external vision model
//! - [`Conversation`] - Per-submission message log
//! - [`ExtractionError`] - Typed error enum with attempt history
//! - [`ExtractionMetrics`] - Token and timing metrics
//! - [`ExtractionConfig`] - Retry behavior configuration

pub mod config;
pub mod conversation;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod model;
pub mod orchestrator;

pub use config::ExtractionConfig;
pub use conversation::{Conversation, ImageAttachment, Message, Role};
pub use error::{AttemptFailure, AttemptRecord, ExtractionError};
pub use feedback::build_validation_feedback;
pub use metrics::{estimate_tokens, ExtractionMetrics};
pub use model::{ModelError, ModelRequest, VisionModel};
pub use orchestrator::{Extraction, ExtractionOrchestrator};
