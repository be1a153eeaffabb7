//! Property values carried by nodes and relationships
//!
//! Ontology graphs store most annotations as strings or string arrays
//! (`label`, `definition`, `synonym`), so the accessors here lean towards
//! reading "one or many strings" uniformly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Well-known property keys
pub mod keys {
    pub const IRI: &str = "iri";
    pub const LABEL: &str = "label";
    pub const DEFINITION: &str = "definition";
    pub const SYNONYM: &str = "synonym";
}

/// Property value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<PropertyValue>),
    Null,
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            PropertyValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// All string values: the value itself for a string, the string elements
    /// for an array, nothing otherwise.
    pub fn strings(&self) -> Vec<&str> {
        match self {
            PropertyValue::String(s) => vec![s.as_str()],
            PropertyValue::Array(arr) => arr.iter().filter_map(|v| v.as_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Textual rendering without quotes, used when a value has to become a
    /// document string.
    pub fn to_plain_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Array(_) => "Array",
            PropertyValue::Null => "Null",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(values: Vec<&str>) -> Self {
        PropertyValue::Array(values.into_iter().map(PropertyValue::from).collect())
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(arr: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(arr)
    }
}

/// Property map for nodes and relationships
pub type PropertyMap = HashMap<String, PropertyValue>;
