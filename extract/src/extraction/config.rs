//! Configuration for extraction retry behavior.

/// Extraction rules given to the model as its system instruction.
///
/// They are re-asserted in every corrective message of the repair loop.
pub const EXTRACTION_RULES: &str = r#"You are a maritime cargo document parser. Read the photographed barge cargo document and answer with ONE JSON object that conforms exactly to the provided schema.

RULES:
1. Copy every tank identifier exactly as printed (for example "1P", "3S"). Do not renumber, pad or normalize them.
2. Write every timestamp in ISO-8601 (YYYY-MM-DDTHH:MM:SS), with the UTC offset when the document shows one.
3. Include every tank row of both the arrival and the departure condition, including rows with zero quantities.
4. Derive summary_by_product for each condition by totalling its tank rows per product, and products_loaded_discharged as arrival minus departure per product.
5. Preserve the decimal precision printed on the document. Do not round.
6. Leave out fields the document does not show. Never add fields the schema does not declare."#;

/// Opening user request that accompanies the image.
pub const EXTRACTION_REQUEST: &str =
    "Extract all data from this document, including the barge and vessel names, every tank row and all timestamps.";

/// Configuration for extraction retry behavior.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Maximum number of model attempts per submission (default: 3).
    pub max_attempts: usize,
    /// Whether corrective messages repeat the full schema (default: true).
    pub include_schema_in_feedback: bool,
    /// Whether to ask the model for deterministic output (default: true).
    pub deterministic: bool,
    /// System instruction describing the extraction rules.
    pub rules: String,
    /// Opening user request sent with the image.
    pub request: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            include_schema_in_feedback: true,
            deterministic: true,
            rules: EXTRACTION_RULES.to_string(),
            request: EXTRACTION_REQUEST.to_string(),
        }
    }
}

impl ExtractionConfig {
    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set whether to include the schema in corrective messages.
    #[must_use]
    pub const fn with_schema_in_feedback(mut self, include: bool) -> Self {
        self.include_schema_in_feedback = include;
        self
    }

    /// Set whether the model is asked for deterministic output.
    #[must_use]
    pub const fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Replace the extraction rules.
    #[must_use]
    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = rules.into();
        self
    }
}
