//! Bounded repair loop around an external vision model.

use std::sync::Arc;
use tokio::time::Instant;

use super::config::ExtractionConfig;
use super::conversation::{Conversation, ImageAttachment};
use super::error::{AttemptFailure, AttemptRecord, ExtractionError};
use super::feedback::build_repair_feedback;
use super::metrics::ExtractionMetrics;
use super::model::{ModelRequest, VisionModel};
use crate::document::FieldDocument;
use crate::quality::{inspect, QualityWarning};
use crate::schema::{SchemaRegistry, SCHEMA_NAME};
use crate::validation::validate_str;

/// A validated document and how it was obtained.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The decoded document.
    pub document: FieldDocument,
    /// Data-quality findings; they never block acceptance.
    pub warnings: Vec<QualityWarning>,
    /// Number of model attempts used, including the successful one.
    pub attempts: usize,
    /// Failed attempts that preceded the success.
    pub history: Vec<AttemptRecord>,
    /// Metrics tracked across all attempts.
    pub metrics: ExtractionMetrics,
}

/// Orchestrator for running bounded retry loops with validation feedback.
///
/// Each submission gets its own conversation. An invalid response is appended
/// verbatim together with a correction listing every violation; a transport
/// failure consumes an attempt and the unchanged conversation is re-sent.
pub struct ExtractionOrchestrator {
    registry: Arc<SchemaRegistry>,
    model: Arc<dyn VisionModel>,
    config: ExtractionConfig,
}

impl ExtractionOrchestrator {
    /// Creates a new orchestrator with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, model: Arc<dyn VisionModel>) -> Self {
        Self::with_config(registry, model, ExtractionConfig::default())
    }

    /// Creates a new orchestrator with the given configuration.
    #[must_use]
    pub fn with_config(
        registry: Arc<SchemaRegistry>,
        model: Arc<dyn VisionModel>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            registry,
            model,
            config,
        }
    }

    /// Sets the maximum number of attempts (fluent builder pattern).
    #[must_use]
    pub fn max_attempts(mut self, max: usize) -> Self {
        self.config.max_attempts = max;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// The schema registry responses are validated against.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Runs the repair loop for one image.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::InvalidConfig` if `max_attempts` is zero.
    /// Returns `ExtractionError::AttemptsExhausted` when every attempt failed,
    /// carrying the last attempt's failure and the full history.
    pub async fn extract(
        &self,
        submission_id: &str,
        image: &ImageAttachment,
    ) -> Result<Extraction, ExtractionError> {
        let max_attempts = self.config.max_attempts;
        if max_attempts == 0 {
            return Err(ExtractionError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let schema = self.registry.schema();
        let feedback_schema = self.config.include_schema_in_feedback.then_some(schema);
        let mut conversation = Conversation::opening(&self.config.rules, &self.config.request);
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut metrics = ExtractionMetrics::default();

        for attempt in 1..=max_attempts {
            metrics.begin_attempt(attempt, &conversation);

            tracing::debug!(
                event = "attempt_started",
                submission = %submission_id,
                attempt,
                max_attempts,
                model = %self.model.name(),
                messages = conversation.len(),
                "attempt_started"
            );

            let request = ModelRequest {
                conversation: &conversation,
                image,
                schema,
                schema_name: SCHEMA_NAME,
                deterministic: self.config.deterministic,
                attempt,
            };

            let raw = match self.model.complete(&request).await {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(
                        event = "attempt_transport_failed",
                        submission = %submission_id,
                        attempt,
                        error = %error,
                        "attempt_transport_failed"
                    );
                    metrics.record_transport_failure();
                    history.push(AttemptRecord {
                        attempt_number: attempt,
                        raw_response: None,
                        failure: AttemptFailure::Transport(error),
                        elapsed: start.elapsed(),
                    });
                    continue;
                }
            };

            metrics.record_answer(&raw);

            match validate_str(&self.registry, &raw) {
                Ok(document) => {
                    let warnings = inspect(&document);
                    metrics.finish(start);

                    tracing::info!(
                        event = "extraction_succeeded",
                        submission = %submission_id,
                        attempts = attempt,
                        warnings = warnings.len(),
                        wall_time_ms = metrics.wall_time_ms(),
                        input_tokens = metrics.estimated_input_tokens,
                        output_tokens = metrics.estimated_output_tokens,
                        "extraction_succeeded"
                    );

                    return Ok(Extraction {
                        document,
                        warnings,
                        attempts: attempt,
                        history,
                        metrics,
                    });
                }
                Err(violations) => {
                    tracing::warn!(
                        event = "attempt_invalid",
                        submission = %submission_id,
                        attempt,
                        violations = violations.len(),
                        "attempt_invalid"
                    );
                    metrics.record_invalid();

                    if attempt < max_attempts {
                        let correction = build_repair_feedback(
                            &violations,
                            attempt,
                            max_attempts,
                            &self.config.rules,
                            feedback_schema,
                        );
                        conversation = conversation.with_repair(&raw, correction);
                    }

                    history.push(AttemptRecord {
                        attempt_number: attempt,
                        raw_response: Some(raw),
                        failure: AttemptFailure::Invalid(violations),
                        elapsed: start.elapsed(),
                    });
                }
            }
        }

        metrics.finish(start);

        let last_failure = history.last().map_or_else(
            || AttemptFailure::Invalid(Vec::new()),
            |record| record.failure.clone(),
        );

        tracing::error!(
            event = "extraction_exhausted",
            submission = %submission_id,
            attempts = max_attempts,
            transport_failures = metrics.transport_failures,
            validation_failures = metrics.validation_failures,
            last_failure = %last_failure,
            "extraction_exhausted"
        );

        Err(ExtractionError::AttemptsExhausted {
            attempts: max_attempts,
            last_failure,
            history,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::conversation::Role;
    use crate::extraction::model::ModelError;
    use crate::testing::ScriptedModel;
    use crate::validation::ViolationKind;
    use serde_json::{json, Value};

    fn valid() -> Value {
        json!({
            "barge": {"name": "BARGE A", "voyage_number": "V-12"},
            "port": {"vessel_name": "MV ONE", "port_city": "Houston"},
            "arrival": {"tanks": [{
                "tank_id": "1P", "product": "ULSD", "api": 33.4, "ullage_ft": 3.0,
                "ullage_in": 6.0, "temperature_f": 68.0, "water_bbls": 0.0, "gross_bbls": 1000.0
            }]},
            "departure": {"tanks": []}
        })
    }

    fn missing_barge_name() -> Value {
        let mut value = valid();
        value["barge"] = json!({"voyage_number": "V-12"});
        value
    }

    fn image() -> ImageAttachment {
        ImageAttachment::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn orchestrator(model: &Arc<ScriptedModel>) -> ExtractionOrchestrator {
        let registry = Arc::new(SchemaRegistry::builtin().unwrap());
        ExtractionOrchestrator::new(registry, Arc::clone(model) as Arc<dyn VisionModel>)
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let model = Arc::new(ScriptedModel::new([Ok(valid().to_string())]));
        let extraction = orchestrator(&model).extract("s1", &image()).await.unwrap();

        assert_eq!(extraction.attempts, 1);
        assert_eq!(extraction.document.barge.name, "BARGE A");
        assert!(extraction.history.is_empty());
        assert_eq!(model.call_count(), 1);

        let requests = model.requests();
        assert_eq!(requests[0].media_type, "image/jpeg");
        assert!(requests[0].deterministic);
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_repair_converges_on_second_attempt() {
        let first = missing_barge_name().to_string();
        let model = Arc::new(ScriptedModel::new([Ok(first.clone()), Ok(valid().to_string())]));

        let extraction = orchestrator(&model).extract("s2", &image()).await.unwrap();

        assert_eq!(extraction.attempts, 2);
        assert_eq!(extraction.history.len(), 1);
        assert_eq!(extraction.metrics.validation_failures, 1);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[2].role, Role::Assistant);
        assert_eq!(second[2].content, first);
        assert_eq!(second[3].role, Role::User);

        let AttemptFailure::Invalid(violations) = &extraction.history[0].failure else {
            panic!("expected validation failure");
        };
        for violation in violations {
            assert!(second[3].content.contains(&violation.to_string()));
        }
        assert!(second[3].content.contains("/barge/name"));
    }

    #[tokio::test]
    async fn test_exhausts_after_exactly_max_attempts() {
        let model = Arc::new(
            ScriptedModel::default().then_repeat(Ok(missing_barge_name().to_string())),
        );

        let error = orchestrator(&model).extract("s3", &image()).await.unwrap_err();

        assert_eq!(model.call_count(), 3);
        match error {
            ExtractionError::AttemptsExhausted {
                attempts,
                last_failure,
                history,
                metrics,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(history.len(), 3);
                assert_eq!(metrics.validation_failures, 3);
                let AttemptFailure::Invalid(violations) = last_failure else {
                    panic!("expected validation failure");
                };
                assert!(violations
                    .iter()
                    .any(|v| v.path == "/barge/name" && v.kind == ViolationKind::MissingRequired));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Conversation grows by one repair exchange per failed attempt.
        let sizes: Vec<usize> = model.requests().iter().map(|r| r.messages.len()).collect();
        assert_eq!(sizes, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_transport_failure_resends_same_conversation() {
        let model = Arc::new(ScriptedModel::new([
            Err(ModelError::Transport("connection reset".into())),
            Ok(valid().to_string()),
        ]));

        let extraction = orchestrator(&model).extract("s4", &image()).await.unwrap();

        assert_eq!(extraction.attempts, 2);
        assert_eq!(extraction.metrics.transport_failures, 1);
        let requests = model.requests();
        assert_eq!(requests[0].messages, requests[1].messages);
        assert_eq!(requests[1].attempt, 2);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_repaired() {
        let model = Arc::new(ScriptedModel::new([
            Ok("I could not read the document.".to_string()),
            Ok(format!("```json\n{}\n```", valid())),
        ]));

        let extraction = orchestrator(&model).extract("s5", &image()).await.unwrap();

        assert_eq!(extraction.attempts, 2);
        let requests = model.requests();
        assert_eq!(requests[1].messages[2].content, "I could not read the document.");
        assert!(requests[1].messages[3].content.contains("Could not parse"));
    }

    #[tokio::test]
    async fn test_exhausted_by_transport_failures() {
        let model = Arc::new(
            ScriptedModel::default().then_repeat(Err(ModelError::Timeout(std::time::Duration::from_secs(1)))),
        );

        let error = orchestrator(&model)
            .max_attempts(2)
            .extract("s6", &image())
            .await
            .unwrap_err();

        assert_eq!(error.attempts(), 2);
        assert!(error.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_rejected() {
        let model = Arc::new(ScriptedModel::new([Ok(valid().to_string())]));

        let error = orchestrator(&model)
            .max_attempts(0)
            .extract("s7", &image())
            .await
            .unwrap_err();

        assert!(matches!(error, ExtractionError::InvalidConfig(_)));
        assert_eq!(model.call_count(), 0);
    }
}
