//! Statically declared schema for inbound quote submissions.
//!
//! The field list is fixed at compile time; a submission must not carry keys
//! outside it and must carry every required key with the declared JSON type.

use crate::error::{IngestError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// JSON type a field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    StringArray,
    Integer,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::StringArray => "an array of strings",
            Self::Integer => "an integer",
        }
    }
}

/// One declared field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required,
    }
}

/// Accepted shape of a quote submission. `id` is tolerated and discarded,
/// identities are always assigned by the catalog store.
pub const QUOTE_SCHEMA: &[FieldSpec] = &[
    field("id", FieldKind::Integer, false),
    field("text", FieldKind::String, true),
    field("tags", FieldKind::StringArray, true),
    field("lang", FieldKind::String, false),
];

/// Check a JSON object against a declared field list
pub fn validate_object(schema: &[FieldSpec], object: &Map<String, Value>) -> Result<()> {
    for key in object.keys() {
        if !schema.iter().any(|f| f.name == key.as_str()) {
            return Err(IngestError::Validation(format!("unexpected key: {key}")));
        }
    }

    for declared in schema {
        match object.get(declared.name) {
            None | Some(Value::Null) if declared.required => {
                return Err(IngestError::Validation(format!(
                    "missing required field: {}",
                    declared.name
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) if !declared.kind.matches(value) => {
                return Err(IngestError::Validation(format!(
                    "field {} must be {}",
                    declared.name,
                    declared.kind.describe()
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// A validated quote submission
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuoteSubmission {
    pub text: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

impl QuoteSubmission {
    /// Parse raw JSON bytes, validating against [`QUOTE_SCHEMA`] first
    pub fn from_json(raw: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| IngestError::Validation(format!("invalid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| IngestError::Validation("expected a JSON object".to_string()))?;

        validate_object(QUOTE_SCHEMA, object)?;

        let submission: Self = serde_json::from_value(value)
            .map_err(|e| IngestError::Validation(format!("malformed quote: {e}")))?;

        if submission.text.trim().is_empty() {
            return Err(IngestError::Validation("text must not be empty".to_string()));
        }

        Ok(submission)
    }
}
