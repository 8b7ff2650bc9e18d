//! Canonical document schema, loaded once at startup and shared read-only.
//!
//! The same schema value is sent to the vision model as its output constraint
//! and used to validate what comes back. Loading normalizes it in two ways:
//!
//! - every object schema is closed (`additionalProperties: false`) at every
//!   nesting level, except map schemas that already declare a value schema;
//! - `null` alternatives are folded away, because the validator treats a
//!   `null` member as an absent one.

use jsonschema::Validator;
use serde_json::{Map, Value, json};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::document::FieldDocument;

/// Name under which the schema is registered with the model provider.
pub const SCHEMA_NAME: &str = "field_document_extraction";

/// Errors raised while loading the schema. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("Failed to read schema file {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The schema is not valid JSON.
    #[error("Schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The schema root is not an object.
    #[error("Schema root must be a JSON object")]
    NotAnObject,

    /// The schema is valid JSON but not a usable JSON Schema.
    #[error("Schema compilation error: {0}")]
    Compile(String),
}

/// Process-wide holder of the closed document schema and its compiled validator.
pub struct SchemaRegistry {
    schema: Value,
    validator: Validator,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SchemaRegistry {
    /// Builds the registry from the schema derived from [`FieldDocument`].
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_value(json!(schemars::schema_for!(FieldDocument)))
    }

    /// Loads the schema from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_value(serde_json::from_str(&raw)?)
    }

    /// Normalizes and compiles an already parsed schema.
    pub fn from_value(mut schema: Value) -> Result<Self, SchemaError> {
        if !schema.is_object() {
            return Err(SchemaError::NotAnObject);
        }
        fold_nullable(&mut schema);
        close_objects(&mut schema);

        // Timestamps get their own, more lenient check in the validator.
        let validator = jsonschema::options()
            .should_validate_formats(false)
            .build(&schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;

        tracing::debug!(event = "schema_loaded", "schema_loaded");
        Ok(Self { schema, validator })
    }

    /// The normalized, closed-world schema.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    pub(crate) const fn validator(&self) -> &Validator {
        &self.validator
    }
}

/// Keywords whose value is a single sub-schema.
const SCHEMA_KEYWORDS: [&str; 10] = [
    "items",
    "additionalProperties",
    "unevaluatedProperties",
    "propertyNames",
    "contains",
    "not",
    "if",
    "then",
    "else",
    "additionalItems",
];

/// Keywords whose value maps names to sub-schemas.
const SCHEMA_MAP_KEYWORDS: [&str; 5] = [
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
];

/// Keywords whose value is a list of sub-schemas.
const SCHEMA_LIST_KEYWORDS: [&str; 4] = ["anyOf", "allOf", "oneOf", "prefixItems"];

/// Visits the direct sub-schemas of a schema object.
fn for_each_subschema(map: &mut Map<String, Value>, mut visit: impl FnMut(&mut Value)) {
    for (keyword, value) in map.iter_mut() {
        let keyword = keyword.as_str();
        if SCHEMA_KEYWORDS.contains(&keyword) {
            visit(value);
        } else if SCHEMA_MAP_KEYWORDS.contains(&keyword) {
            if let Some(entries) = value.as_object_mut() {
                entries.values_mut().for_each(&mut visit);
            }
        } else if SCHEMA_LIST_KEYWORDS.contains(&keyword) {
            if let Some(items) = value.as_array_mut() {
                items.iter_mut().for_each(&mut visit);
            }
        }
    }
}

/// Sets `additionalProperties: false` on every object schema that leaves it open.
pub fn close_objects(schema: &mut Value) {
    let Some(map) = schema.as_object_mut() else {
        return;
    };
    let is_object = map.get("type").and_then(Value::as_str) == Some("object")
        || map.contains_key("properties");
    if is_object && !map.contains_key("additionalProperties") {
        map.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    for_each_subschema(map, close_objects);
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

/// Removes `null` from type unions and `anyOf`/`oneOf` alternatives.
pub fn fold_nullable(schema: &mut Value) {
    let Some(map) = schema.as_object_mut() else {
        return;
    };
    for_each_subschema(map, fold_nullable);

    if let Some(Value::Array(types)) = map.get_mut("type") {
        types.retain(|t| t.as_str() != Some("null"));
        if types.len() == 1 {
            let only = types.remove(0);
            map.insert("type".to_string(), only);
        }
    }

    for keyword in ["anyOf", "oneOf"] {
        let Some(Value::Array(alternatives)) = map.get_mut(keyword) else {
            continue;
        };
        alternatives.retain(|alternative| !is_null_schema(alternative));
        if alternatives.len() == 1 {
            if let Some(Value::Object(inner)) = alternatives.pop() {
                map.remove(keyword);
                for (key, value) in inner {
                    map.entry(key).or_insert(value);
                }
            }
        }
    }

    if map.get("default") == Some(&Value::Null) {
        map.remove("default");
    }
}
