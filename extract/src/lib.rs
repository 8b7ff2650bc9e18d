//! Schema-constrained extraction of barge field documents.
//!
//! This crate holds everything between a photographed cargo document and a
//! validated [`document::FieldDocument`]: the typed model, the schema registry,
//! the validator, the bounded repair loop that drives a [`extraction::VisionModel`],
//! data-quality checks and the write-once result store.

pub mod document;
pub mod extraction;
pub mod quality;
pub mod schema;
pub mod store;
pub mod testing;
pub mod validation;

/// Common traits and types for ergonomic usage of the extraction pipeline.
pub mod prelude {
    pub use crate::document::FieldDocument;
    pub use crate::extraction::{
        Extraction, ExtractionConfig, ExtractionError, ExtractionMetrics, ExtractionOrchestrator,
        ImageAttachment, ModelError, ModelRequest, VisionModel,
    };
    pub use crate::schema::SchemaRegistry;
    pub use crate::store::{FsResultStore, RecordStatus, ResultRecord, ResultStore};
    pub use crate::validation::{Violation, ViolationKind};
}
