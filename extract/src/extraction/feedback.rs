//! Corrective messages for the repair loop.
//!
//! The model's invalid output is already in the conversation verbatim, so a
//! correction carries only what was wrong with it and what is expected.

use serde_json::Value;
use std::fmt::Write as _;

use crate::validation::{Violation, ViolationKind};

/// Build the correction for a response that parsed but violated the schema.
///
/// Includes:
/// - Attempt counter (e.g., "Attempt 1/3")
/// - Every violation with its path and kind
/// - The extraction rules, re-asserted
/// - The expected schema, when given
///
/// # Examples
///
/// ```
/// use bargedoc_extract::extraction::build_validation_feedback;
/// use bargedoc_extract::validation::{Violation, ViolationKind};
///
/// let violations = vec![Violation::new(
///     "/barge/name",
///     ViolationKind::MissingRequired,
///     "required field 'name' is missing",
/// )];
/// let feedback = build_validation_feedback(&violations, 1, 3, "RULES", None);
/// assert!(feedback.contains("Attempt 1/3"));
/// assert!(feedback.contains("/barge/name"));
/// ```
#[must_use]
pub fn build_validation_feedback(
    violations: &[Violation],
    attempt: usize,
    max_attempts: usize,
    rules: &str,
    schema: Option<&Value>,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: your response does not conform to the document schema.\n\n"
    );

    feedback.push_str("Violations:\n");
    for violation in violations {
        let _ = writeln!(feedback, "  - {violation}");
    }

    finish(&mut feedback, rules, schema);
    feedback.push_str(
        "\n\nReturn the corrected JSON object only. Keep every value you already read correctly and fix each violation listed above.",
    );
    feedback
}

/// Build the correction for a response that was not JSON at all.
///
/// # Examples
///
/// ```
/// use bargedoc_extract::extraction::feedback::build_parse_error_feedback;
///
/// let feedback = build_parse_error_feedback("expected value at line 1 column 1", 2, 3, "RULES", None);
/// assert!(feedback.contains("Attempt 2/3"));
/// assert!(feedback.contains("Could not parse"));
/// ```
#[must_use]
pub fn build_parse_error_feedback(
    parse_error: &str,
    attempt: usize,
    max_attempts: usize,
    rules: &str,
    schema: Option<&Value>,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: Could not parse your response as JSON.\n\n"
    );

    feedback.push_str("Parse error: ");
    feedback.push_str(parse_error);

    finish(&mut feedback, rules, schema);
    feedback.push_str(
        "\n\nRespond with a single JSON object only: no prose, no Markdown, no code fences.",
    );
    feedback
}

/// Chooses the correction that fits the violations found.
#[must_use]
pub fn build_repair_feedback(
    violations: &[Violation],
    attempt: usize,
    max_attempts: usize,
    rules: &str,
    schema: Option<&Value>,
) -> String {
    match violations {
        [only] if only.kind == ViolationKind::Unparseable => {
            build_parse_error_feedback(&only.message, attempt, max_attempts, rules, schema)
        }
        _ => build_validation_feedback(violations, attempt, max_attempts, rules, schema),
    }
}

fn finish(feedback: &mut String, rules: &str, schema: Option<&Value>) {
    feedback.push_str("\nExtraction rules (still apply):\n");
    feedback.push_str(rules);

    if let Some(schema) = schema {
        feedback.push_str("\n\nExpected schema:\n");
        let schema_str =
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        feedback.push_str(&schema_str);
    }
}
