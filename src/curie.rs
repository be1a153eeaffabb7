//! IRI ↔ curie resolution
//!
//! A curie is `prefix:local` where `prefix` maps to an IRI namespace. When
//! several namespaces match an IRI the longest one wins, so `X:` for
//! `http://x.org/a_` beats a broader `http://x.org/` mapping.

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CurieError {
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    #[error("Not a curie: {0}")]
    NotACurie(String),
}

pub type CurieResult<T> = Result<T, CurieError>;

/// Prefixes every resolver knows unless configured otherwise
const STANDARD_PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
];

#[derive(Debug, Clone, Default)]
pub struct CurieResolver {
    prefixes: IndexMap<String, String>,
}

impl CurieResolver {
    /// Resolver with only the given prefixes
    pub fn new(prefixes: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            prefixes: prefixes.into_iter().collect(),
        }
    }

    /// Standard rdf/rdfs/owl/dc prefixes plus `prefixes`, which override them
    pub fn with_standard_prefixes(prefixes: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut resolver = Self::new(
            STANDARD_PREFIXES
                .iter()
                .map(|(p, iri)| (p.to_string(), iri.to_string())),
        );
        for (prefix, iri) in prefixes {
            resolver.add_prefix(prefix, iri);
        }
        resolver
    }

    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Compact an IRI, or `None` when no namespace matches
    pub fn to_curie(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, namespace)| !namespace.is_empty() && iri.starts_with(namespace.as_str()))
            .max_by_key(|(_, namespace)| namespace.len())
            .map(|(prefix, namespace)| format!("{}:{}", prefix, &iri[namespace.len()..]))
    }

    /// Expand a curie, or `None` when the prefix is unknown
    pub fn to_iri(&self, curie: &str) -> Option<String> {
        self.expand(curie).ok()
    }

    pub fn expand(&self, curie: &str) -> CurieResult<String> {
        let (prefix, local) = curie
            .split_once(':')
            .ok_or_else(|| CurieError::NotACurie(curie.to_string()))?;
        let namespace = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| CurieError::UnknownPrefix(prefix.to_string()))?;
        Ok(format!("{}{}", namespace, local))
    }

    /// Document identifier for an IRI: its curie, falling back to the IRI
    pub fn id_for(&self, iri: &str) -> String {
        self.to_curie(iri).unwrap_or_else(|| iri.to_string())
    }

    /// Turn a configured name into an IRI: curies with a known prefix are
    /// expanded, anything else is taken as-is.
    pub fn resolve_name(&self, name: &str) -> String {
        self.to_iri(name).unwrap_or_else(|| name.to_string())
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, iri)| (p.as_str(), iri.as_str()))
    }
}

/// Prefix part of a curie (`MONDO` for `MONDO:0000001`)
pub fn prefix_of(curie: &str) -> Option<&str> {
    curie.split_once(':').map(|(prefix, _)| prefix)
}
