//! Structural validation of candidate documents.
//!
//! Validation is total: any JSON value, or any string at all, yields either a
//! typed [`FieldDocument`] or a non-empty, ordered list of [`Violation`]s.

use jsonschema::ValidationError;
use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::document::{FieldDocument, Timestamp, Timestamps};
use crate::schema::SchemaRegistry;

/// Category of a structural defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent.
    MissingRequired,
    /// A value has the wrong JSON type.
    WrongType,
    /// A field is not declared by the schema.
    UnknownField,
    /// A timestamp string is not an ISO-8601 date-time.
    MalformedTimestamp,
    /// The response is not parseable as JSON at all.
    Unparseable,
    /// Any other schema keyword failed.
    Constraint,
}

impl ViolationKind {
    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequired => "missing_required",
            Self::WrongType => "wrong_type",
            Self::UnknownField => "unknown_field",
            Self::MalformedTimestamp => "malformed_timestamp",
            Self::Unparseable => "unparseable",
            Self::Constraint => "constraint",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural defect, located by JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer of the offending field (`""` is the document root).
    pub path: String,
    /// Defect category.
    pub kind: ViolationKind,
    /// Human-readable explanation.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    #[must_use]
    pub fn new(path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    fn from_schema_error(error: &ValidationError<'_>) -> Vec<Self> {
        let at = error.instance_path.to_string();
        match &error.kind {
            ValidationErrorKind::Required { property } => {
                let name = property
                    .as_str()
                    .map_or_else(|| property.to_string(), str::to_string);
                vec![Self::new(
                    child_path(&at, &name),
                    ViolationKind::MissingRequired,
                    format!("required field '{name}' is missing"),
                )]
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
                .iter()
                .map(|name| {
                    Self::new(
                        child_path(&at, name),
                        ViolationKind::UnknownField,
                        format!("field '{name}' is not declared in the schema"),
                    )
                })
                .collect(),
            ValidationErrorKind::Type { .. } => {
                vec![Self::new(at, ViolationKind::WrongType, error.to_string())]
            }
            _ => vec![Self::new(at, ViolationKind::Constraint, error.to_string())],
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "At path '{path}' [{}]: {}", self.kind, self.message)
    }
}

/// Appends one escaped segment to a JSON pointer.
pub(crate) fn child_path(parent: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{parent}/{escaped}")
}

/// Members keyed by product name rather than declared by the schema.
const PRODUCT_MAPS: [&str; 2] = ["summary_by_product", "products_loaded_discharged"];

/// Drops declared members whose value is `null`, at every depth.
///
/// Entries of a product map are kept even when `null`, so the schema reports
/// them instead of losing the product name.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let v = if PRODUCT_MAPS.contains(&k.as_str()) {
                        strip_map_entries(v)
                    } else {
                        strip_nulls(v)
                    };
                    (k, v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn strip_map_entries(value: Value) -> Value {
    match value {
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(product, totals)| (product, strip_nulls(totals)))
                .collect(),
        ),
        other => strip_nulls(other),
    }
}

/// Flags timestamp strings that do not parse as date-times.
///
/// Non-string values are left to the schema's type check.
fn timestamp_violations(candidate: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    for snapshot in ["arrival", "departure"] {
        let Some(events) = candidate
            .get(snapshot)
            .and_then(|s| s.get("timestamps"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for name in Timestamps::FIELDS {
            if let Some(Value::String(raw)) = events.get(name) {
                if Timestamp::parse(raw).is_none() {
                    violations.push(Violation::new(
                        format!("/{snapshot}/timestamps/{name}"),
                        ViolationKind::MalformedTimestamp,
                        format!("'{raw}' is not an ISO-8601 date-time"),
                    ));
                }
            }
        }
    }
    violations
}

/// Validates a JSON value against the registry's schema and decodes it.
pub fn validate(
    registry: &SchemaRegistry,
    candidate: &Value,
) -> Result<FieldDocument, Vec<Violation>> {
    let normalized = strip_nulls(candidate.clone());

    let mut violations: Vec<Violation> = registry
        .validator()
        .iter_errors(&normalized)
        .flat_map(|error| Violation::from_schema_error(&error))
        .collect();
    violations.extend(timestamp_violations(&normalized));

    if !violations.is_empty() {
        violations.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));
        violations.dedup();
        return Err(violations);
    }

    // A custom schema may accept shapes the typed model does not.
    serde_json::from_value(normalized).map_err(|e| {
        vec![Violation::new(
            "",
            ViolationKind::WrongType,
            format!("document does not match the field document model: {e}"),
        )]
    })
}

/// Strips a surrounding Markdown code fence, if any.
fn unfence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    // Drop the info string ("json") on the opening fence line.
    body.split_once('\n').map_or(body, |(_, rest)| rest).trim()
}

/// Parses raw model output and validates it.
///
/// Output that is not JSON yields a single [`ViolationKind::Unparseable`]
/// violation at the document root.
pub fn validate_str(registry: &SchemaRegistry, raw: &str) -> Result<FieldDocument, Vec<Violation>> {
    match serde_json::from_str::<Value>(unfence(raw)) {
        Ok(value) => validate(registry, &value),
        Err(e) => Err(vec![Violation::new(
            "",
            ViolationKind::Unparseable,
            format!("response is not valid JSON: {e}"),
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    fn minimal() -> Value {
        json!({
            "barge": {"name": "BARGE A"},
            "port": {"vessel_name": "MV ONE"},
            "arrival": {"tanks": [{
                "tank_id": "1P", "product": "MGO", "api": 32.1, "ullage_ft": 4.0,
                "ullage_in": 2.0, "temperature_f": 70.0, "gross_bbls": 1000.0
            }]},
            "departure": {"tanks": []}
        })
    }

    #[test]
    fn test_minimal_document_is_valid() {
        let document = validate(&registry(), &minimal()).unwrap();
        assert_eq!(document.barge.name, "BARGE A");
        assert_eq!(document.arrival.tanks[0].tank_id, "1P");
        assert!(document.departure.tanks.is_empty());
    }

    #[test]
    fn test_round_trip_of_full_document() {
        let full = json!({
            "barge": {"name": "BARGE A", "voyage_number": "V-12", "otb_job_number": "J 881"},
            "port": {"vessel_name": "MV ONE", "port_city": "Houston"},
            "arrival": {
                "water_specific_gravity": 1.025,
                "drafts_ft": {"fwd_port": 8.5, "fwd_stbd": 8.4, "aft_port": 9.1, "aft_stbd": 9.0},
                "timestamps": {"arrival": "2024-03-05T06:00:00-06:00", "all_fast": "2024-03-05T06:45:00"},
                "tanks": [{
                    "tank_id": "1P", "product": "MGO", "api": 32.1, "ullage_ft": 4.0,
                    "ullage_in": 2.5, "temperature_f": 70.0, "water_bbls": 1.25,
                    "gross_bbls": 1000.0, "net_bbls": 987.65, "metric_tons": 133.3
                }],
                "summary_by_product": {"MGO": {"gross_bbls": 1000.0, "net_bbls": 987.65}}
            },
            "departure": {"tanks": [], "timestamps": {"depart": "2024-03-05T18:00:00Z"}},
            "products_loaded_discharged": {"MGO": {"gross_bbls": 1000.0}}
        });
        let registry = registry();
        let document = validate(&registry, &full).unwrap();
        let reserialized = serde_json::to_value(&document).unwrap();
        assert_eq!(validate(&registry, &reserialized).unwrap(), document);
    }

    #[test]
    fn test_missing_barge_name_cites_path() {
        let mut candidate = minimal();
        candidate["barge"].as_object_mut().unwrap().remove("name");

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert_eq!(
            violations,
            vec![Violation::new(
                "/barge/name",
                ViolationKind::MissingRequired,
                "required field 'name' is missing"
            )]
        );
    }

    #[test]
    fn test_missing_departure_is_rejected() {
        let mut candidate = minimal();
        candidate.as_object_mut().unwrap().remove("departure");

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert!(violations
            .iter()
            .any(|v| v.path == "/departure" && v.kind == ViolationKind::MissingRequired));
    }

    #[test]
    fn test_unknown_field_at_every_level() {
        let registry = registry();
        let cases = [
            ("", "/confidence"),
            ("/barge", "/barge/flag"),
            ("/arrival", "/arrival/notes"),
            ("/arrival/tanks/0", "/arrival/tanks/0/remarks"),
        ];
        for (parent, expected) in cases {
            let mut candidate = minimal();
            let name = expected.rsplit('/').next().unwrap();
            candidate
                .pointer_mut(parent)
                .and_then(Value::as_object_mut)
                .unwrap()
                .insert(name.to_string(), json!("x"));

            let violations = validate(&registry, &candidate).unwrap_err();
            assert!(
                violations
                    .iter()
                    .any(|v| v.path == expected && v.kind == ViolationKind::UnknownField),
                "expected unknown_field at {expected}, got {violations:?}"
            );
        }
    }

    #[test]
    fn test_unknown_field_inside_product_map() {
        let mut candidate = minimal();
        candidate["arrival"]["summary_by_product"] =
            json!({"MGO": {"gross_bbls": 1.0, "density": 0.85}});

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert_eq!(violations[0].path, "/arrival/summary_by_product/MGO/density");
        assert_eq!(violations[0].kind, ViolationKind::UnknownField);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let mut candidate = minimal();
        candidate["arrival"]["tanks"][0]["gross_bbls"] = json!("1,000");

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/arrival/tanks/0/gross_bbls");
        assert_eq!(violations[0].kind, ViolationKind::WrongType);
    }

    #[test]
    fn test_malformed_timestamp() {
        let mut candidate = minimal();
        candidate["arrival"]["timestamps"] = json!({"hose_on": "half past two"});

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/arrival/timestamps/hose_on");
        assert_eq!(violations[0].kind, ViolationKind::MalformedTimestamp);
    }

    #[test]
    fn test_iso8601_timestamp_forms_are_accepted() {
        let registry = registry();
        let forms = [
            "2024-03-05T14:30:00",
            "2024-03-05T14:30Z",
            "2024-03-05T14:30-05:00",
            "2024-03-05T14:30:00+0530",
            "2024-03-05T14:30:00.250Z",
            "2024-03-05",
        ];
        for form in forms {
            let mut candidate = minimal();
            candidate["arrival"]["timestamps"] = json!({"hose_on": form});

            let result = validate(&registry, &candidate);
            assert!(result.is_ok(), "expected {form} to validate, got {result:?}");
        }
    }

    #[test]
    fn test_null_members_count_as_absent() {
        let mut candidate = minimal();
        candidate["barge"]["voyage_number"] = Value::Null;
        candidate["arrival"]["drafts_ft"] = Value::Null;

        let document = validate(&registry(), &candidate).unwrap();
        assert_eq!(document.barge.voyage_number, None);
        assert_eq!(document.arrival.drafts_ft, None);
    }

    #[test]
    fn test_null_product_entry_is_wrong_type() {
        let mut candidate = minimal();
        candidate["arrival"]["summary_by_product"] =
            json!({"MGO": null, "ULSD": {"gross_bbls": 10.0, "net_bbls": null}});

        let violations = validate(&registry(), &candidate).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/arrival/summary_by_product/MGO");
        assert_eq!(violations[0].kind, ViolationKind::WrongType);
    }

    #[test]
    fn test_negative_volume_is_structurally_valid() {
        let mut candidate = minimal();
        candidate["arrival"]["tanks"][0]["gross_bbls"] = json!(-5.0);
        assert!(validate(&registry(), &candidate).is_ok());
    }

    #[test]
    fn test_non_object_inputs_never_panic() {
        let registry = registry();
        for candidate in [json!(null), json!(42), json!("text"), json!([1, 2]), json!({})] {
            let violations = validate(&registry, &candidate).unwrap_err();
            assert!(!violations.is_empty());
        }
    }

    #[test]
    fn test_unparseable_text() {
        let violations = validate_str(&registry(), "Sorry, I cannot read this image.").unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Unparseable);
        assert_eq!(violations[0].path, "");
    }

    #[test]
    fn test_code_fenced_json_is_accepted() {
        let raw = format!("```json\n{}\n```", minimal());
        assert!(validate_str(&registry(), &raw).is_ok());
    }

    #[test]
    fn test_child_path_escapes_segments() {
        assert_eq!(child_path("/arrival/summary_by_product", "ULSD/B5"), "/arrival/summary_by_product/ULSD~1B5");
    }

    #[test]
    fn test_display_names_path_and_kind() {
        let violation = Violation::new("/barge/name", ViolationKind::MissingRequired, "required field 'name' is missing");
        assert_eq!(
            violation.to_string(),
            "At path '/barge/name' [missing_required]: required field 'name' is missing"
        );
    }
}
