//! Per-submission bookkeeping for the repair loop.
//!
//! Token figures cover the text of the conversation only; the document image
//! is billed separately by the provider and is not estimated here.

use std::time::Duration;
use tokio::time::Instant;

use super::conversation::Conversation;

/// How one submission's attempts were spent.
#[derive(Debug, Clone, Default)]
pub struct ExtractionMetrics {
    /// Attempts started, including the last one.
    pub total_attempts: usize,
    /// Attempts lost to an unreachable or failing model.
    pub transport_failures: usize,
    /// Attempts whose answer was not a valid field document.
    pub validation_failures: usize,
    /// Time from the first request to the final outcome.
    pub wall_time: Duration,
    /// Conversation text sent across all attempts, in estimated tokens.
    pub estimated_input_tokens: usize,
    /// Model answers received, in estimated tokens.
    pub estimated_output_tokens: usize,
    input_chars: usize,
}

impl ExtractionMetrics {
    /// Counts a request carrying `conversation`.
    ///
    /// Every attempt re-sends the whole conversation, so a repaired submission
    /// pays for its earlier answers and corrections again.
    pub fn begin_attempt(&mut self, attempt: usize, conversation: &Conversation) {
        self.total_attempts = attempt;
        self.input_chars += conversation.char_count();
        self.estimated_input_tokens = estimate_tokens_from_chars(self.input_chars);
    }

    /// Counts an attempt that produced no answer.
    pub const fn record_transport_failure(&mut self) {
        self.transport_failures += 1;
    }

    /// Counts the raw answer text, valid or not.
    pub fn record_answer(&mut self, raw: &str) {
        self.estimated_output_tokens += estimate_tokens(raw);
    }

    /// Counts an answer that failed validation.
    pub const fn record_invalid(&mut self) {
        self.validation_failures += 1;
    }

    /// Stamps the wall time once the outcome is known.
    pub fn finish(&mut self, started: Instant) {
        self.wall_time = started.elapsed();
    }

    /// Wall time in whole milliseconds, for log fields.
    #[must_use]
    pub fn wall_time_ms(&self) -> u64 {
        u64::try_from(self.wall_time.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Token estimate for a character count, rounded up.
#[must_use]
pub const fn estimate_tokens_from_chars(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Rough token count of model-facing text at four characters per token.
///
/// Counts characters rather than bytes, so readings such as `70°F` are not
/// inflated by multi-byte symbols.
///
/// ```
/// use bargedoc_extract::extraction::estimate_tokens;
///
/// assert_eq!(estimate_tokens(r#"{"tank_id":"1P"}"#), 4);
/// ```
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    estimate_tokens_from_chars(text.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_sign_counts_as_one_char() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("70°F"), 1);
        assert_eq!(estimate_tokens("72.4 °F"), 2);
    }

    #[test]
    fn test_repair_resends_the_whole_conversation() {
        let opening = Conversation::opening("Report every tank row.", "Extract this ticket.");
        let repaired = opening.clone().with_repair("{}", "Field 'barge' is missing.".to_string());

        let mut metrics = ExtractionMetrics::default();
        metrics.begin_attempt(1, &opening);
        metrics.record_answer("{}");
        metrics.record_invalid();
        metrics.begin_attempt(2, &repaired);

        let sent = opening.char_count() + repaired.char_count();
        assert_eq!(metrics.total_attempts, 2);
        assert_eq!(metrics.validation_failures, 1);
        assert_eq!(metrics.estimated_input_tokens, estimate_tokens_from_chars(sent));
        assert_eq!(metrics.estimated_output_tokens, 1);
        assert!(repaired.char_count() > opening.char_count());
    }

    #[test]
    fn test_transport_failures_are_counted_apart() {
        let mut metrics = ExtractionMetrics::default();
        metrics.record_transport_failure();
        metrics.record_transport_failure();
        metrics.record_invalid();
        assert_eq!(metrics.transport_failures, 2);
        assert_eq!(metrics.validation_failures, 1);
    }
}
