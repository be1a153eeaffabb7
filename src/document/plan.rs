//! Query files and the per-query plan derived from them
//!
//! A query file is YAML:
//!
//! ```yaml
//! query: |
//!   MATCH (s)-[r]->(o) RETURN s AS subject, r AS relation, o AS object
//! subject_closure: rdfs:subClassOf|partOf
//! ```
//!
//! The plan records which columns the query projects, the role of each
//! projected field and the closure types each field uses. The query text is
//! rewritten to also return every bound variable, so elements the pattern
//! touched without projecting still reach the evidence subgraph.

use crate::closure::{RelationshipError, RelationshipSet};
use crate::curie::CurieResolver;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const SUBJECT: &str = "subject";
pub const OBJECT: &str = "object";
pub const FEATURE: &str = "feature";
pub const RELATION: &str = "relation";
pub const EVIDENCE: &str = "evidence";

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Query has no RETURN clause")]
    MissingReturn,

    #[error("Invalid closure for {field}: {source}")]
    Closure {
        field: String,
        #[source]
        source: RelationshipError,
    },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// One query file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_closure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_closure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_closure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_closure: Option<String>,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml(text: &str) -> PlanResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    /// (field, expression) for every override present
    pub fn closure_overrides(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (SUBJECT, &self.subject_closure),
            (OBJECT, &self.object_closure),
            (RELATION, &self.relation_closure),
            (EVIDENCE, &self.evidence_closure),
        ]
        .into_iter()
        .filter_map(|(field, expression)| expression.as_deref().map(|e| (field, e)))
    }
}

/// How a projected field is enriched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Identifier, label and closures only
    Plain,
    /// Plus taxon, gene, chromosome and (for `subject`) orthologs
    SubjectObject,
    /// Plus disease and phenotype cross-references
    Feature,
}

impl FieldRole {
    pub fn for_field(field: &str) -> Self {
        match field {
            SUBJECT | OBJECT => FieldRole::SubjectObject,
            FEATURE => FieldRole::Feature,
            _ => FieldRole::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    name: String,
    text: String,
    projection: Vec<String>,
    /// The query itself returns `*`: every column is a field
    returns_all: bool,
    roles: HashMap<String, FieldRole>,
    closures: HashMap<String, RelationshipSet>,
    default_closure: RelationshipSet,
}

const RETURN_KEYWORD: &str = r"(?i)\bRETURN\s+(DISTINCT\s+)?";
const RETURN_TAIL: &str = r"(?i)\s+(ORDER\s+BY|SKIP|LIMIT)\b|\s*;\s*$";
const ALIASED_ITEM: &str = r"(?is)^(.*?)\s+AS\s+(`[^`]+`|\S+)$";

impl QueryPlan {
    pub fn new(name: impl Into<String>, spec: &QuerySpec, curies: &CurieResolver) -> PlanResult<Self> {
        let original = spec.query.trim();
        if original.is_empty() {
            return Err(PlanError::EmptyQuery);
        }
        let return_keyword = Regex::new(RETURN_KEYWORD)?;
        let return_tail = Regex::new(RETURN_TAIL)?;
        let aliased_item = Regex::new(ALIASED_ITEM)?;

        let keyword = return_keyword
            .find_iter(original)
            .filter(|m| is_unquoted(original, m.start()))
            .last()
            .ok_or(PlanError::MissingReturn)?;

        let items_text = &original[keyword.end()..];
        let tail = return_tail
            .find_iter(items_text)
            .find(|m| is_unquoted(items_text, m.start()));
        let items_text = match tail {
            Some(tail) => &items_text[..tail.start()],
            None => items_text,
        };

        let mut projection = Vec::new();
        let mut returns_all = false;
        for item in split_top_level(items_text) {
            if item == "*" {
                returns_all = true;
                continue;
            }
            let column = match aliased_item.captures(&item) {
                Some(captures) => captures[2].trim_matches('`').to_string(),
                None => item.trim_matches('`').to_string(),
            };
            projection.push(column);
        }

        let text = if returns_all {
            original.to_string()
        } else {
            let distinct = keyword.as_str().to_ascii_uppercase().contains("DISTINCT");
            format!(
                "{}RETURN {}*, {}",
                &original[..keyword.start()],
                if distinct { "DISTINCT " } else { "" },
                &original[keyword.end()..]
            )
        };

        let roles = projection
            .iter()
            .map(|field| (field.clone(), FieldRole::for_field(field)))
            .collect();

        let mut closures = HashMap::new();
        for (field, expression) in spec.closure_overrides() {
            let set = RelationshipSet::parse_expression(expression, curies).map_err(|source| PlanError::Closure {
                field: field.to_string(),
                source,
            })?;
            closures.insert(field.to_string(), set);
        }

        Ok(Self {
            name: name.into(),
            text,
            projection,
            returns_all,
            roles,
            closures,
            default_closure: RelationshipSet::default_closure_types(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Query text as executed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Explicitly projected columns in RETURN order
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn is_projected(&self, column: &str) -> bool {
        self.returns_all || self.roles.contains_key(column)
    }

    pub fn role(&self, field: &str) -> FieldRole {
        match self.roles.get(field) {
            Some(role) => *role,
            None if self.returns_all => FieldRole::for_field(field),
            None => FieldRole::Plain,
        }
    }

    /// Closure types for `field`: its override, else the defaults
    pub fn closure_types(&self, field: &str) -> &RelationshipSet {
        self.closures.get(field).unwrap_or(&self.default_closure)
    }

    /// Types used by every field without an override, and by sidecar fields
    pub fn default_closure_types(&self) -> &RelationshipSet {
        &self.default_closure
    }

    /// Rows describe (subject, object) facts and get merged by that pair
    pub fn is_pair_keyed(&self) -> bool {
        self.is_projected(SUBJECT) && self.is_projected(OBJECT)
    }
}

/// Split a RETURN item list on commas outside quotes, backticks and brackets
/// Whether byte offset `at` lies outside string literals and backticks
fn is_unquoted(text: &str, at: usize) -> bool {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        if i >= at {
            break;
        }
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None => {}
        }
    }
    quote.is_none()
}

fn split_top_level(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    items.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}
