//! Search-index documents and how rows become them

pub mod assembler;
pub mod plan;

pub use assembler::RowAssembler;
pub use plan::{FieldRole, PlanError, PlanResult, QueryPlan, QuerySpec};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

pub const LABEL_SUFFIX: &str = "_label";
pub const CLOSURE_SUFFIX: &str = "_closure";
pub const CLOSURE_LABEL_SUFFIX: &str = "_closure_label";
pub const CLOSURE_MAP_SUFFIX: &str = "_closure_map";

/// A field value as the index stores it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    StringArray(Vec<String>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            FieldValue::StringArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::String(s) => JsonValue::from(s.as_str()),
            FieldValue::Boolean(b) => JsonValue::from(*b),
            FieldValue::Integer(i) => JsonValue::from(*i),
            FieldValue::Float(f) => JsonValue::from(*f),
            FieldValue::StringArray(values) => JsonValue::from(values.clone()),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::StringArray(values)
    }
}

/// An enrichment that failed for one field. The rest of the document is
/// still written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered field map. Fields are written once; a second write to the same
/// name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    fields: IndexMap<String, FieldValue>,
    errors: Vec<FieldError>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn record_error(&mut self, field: impl Into<String>, message: impl fmt::Display) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.to_string(),
        });
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Flat JSON object sent to the index. Recorded errors are not part of it.
    pub fn to_index_document(&self) -> Map<String, JsonValue> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}
