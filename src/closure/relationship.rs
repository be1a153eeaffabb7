//! Relationship (type, direction) constraints for traversals

use crate::curie::CurieResolver;
use crate::graph::{Direction, Edge, NodeId};
use crate::vocab;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RelationshipError {
    #[error("empty relationship expression")]
    EmptyExpression,

    #[error("empty relationship name in expression: {0}")]
    EmptyName(String),
}

/// One relationship type followed in one direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub type_name: String,
    pub direction: Direction,
}

impl RelationshipSpec {
    pub fn new(type_name: impl Into<String>, direction: Direction) -> Self {
        Self {
            type_name: type_name.into(),
            direction,
        }
    }

    /// Whether `edge` can be followed from `from` under this spec
    pub fn admits(&self, edge: &Edge, from: NodeId) -> bool {
        edge.is_type(&self.type_name) && edge.leaves(from, self.direction)
    }
}

impl fmt::Display for RelationshipSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.direction)
    }
}

/// Order-independent set of relationship specs.
///
/// Two sets built from the same specs in any order are equal and hash the
/// same, which is what makes them usable as cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipSet(BTreeSet<RelationshipSpec>);

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, type_name: impl Into<String>, direction: Direction) -> Self {
        self.insert(RelationshipSpec::new(type_name, direction));
        self
    }

    /// Every type in `type_names`, all in `direction`
    pub fn with_all<I, S>(mut self, type_names: I, direction: Direction) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in type_names {
            self.insert(RelationshipSpec::new(name, direction));
        }
        self
    }

    pub fn insert(&mut self, spec: RelationshipSpec) -> bool {
        self.0.insert(spec)
    }

    pub fn contains(&self, type_name: &str, direction: Direction) -> bool {
        self.0
            .iter()
            .any(|spec| spec.type_name == type_name && spec.direction == direction)
    }

    /// Whether any spec lets `edge` be followed from `from`
    pub fn admits(&self, edge: &Edge, from: NodeId) -> bool {
        self.0.iter().any(|spec| spec.admits(edge, from))
    }

    /// Directions to ask the graph for; `Both` when mixed
    pub fn scan_direction(&self) -> Direction {
        let mut outgoing = false;
        let mut incoming = false;
        for spec in &self.0 {
            match spec.direction {
                Direction::Outgoing => outgoing = true,
                Direction::Incoming => incoming = true,
                Direction::Both => return Direction::Both,
            }
        }
        match (outgoing, incoming) {
            (true, false) => Direction::Outgoing,
            (false, true) => Direction::Incoming,
            _ => Direction::Both,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationshipSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Closure types used when a field has no override: equivalence and
    /// same-as in both directions, subclass/type/subproperty outgoing
    pub fn default_closure_types() -> Self {
        Self::new()
            .with(vocab::OWL_EQUIVALENT_CLASS, Direction::Both)
            .with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .with(vocab::RDF_TYPE, Direction::Outgoing)
            .with(vocab::OWL_SAME_AS, Direction::Both)
            .with(vocab::RDFS_SUB_PROPERTY_OF, Direction::Outgoing)
    }

    /// Equivalence-only types for clique members
    pub fn equivalence_types() -> Self {
        Self::new()
            .with(vocab::OWL_EQUIVALENT_CLASS, Direction::Both)
            .with(vocab::OWL_SAME_AS, Direction::Both)
    }

    /// Parse a compact expression such as `rdfs:subClassOf|partOf|^hasPart`.
    ///
    /// Names are `|` separated, curies are expanded through `curies`, a
    /// leading `^` follows the relationship backwards and a leading `~`
    /// follows it both ways. Everything else is outgoing.
    pub fn parse_expression(expression: &str, curies: &CurieResolver) -> Result<Self, RelationshipError> {
        if expression.trim().is_empty() {
            return Err(RelationshipError::EmptyExpression);
        }
        let mut set = Self::new();
        for part in expression.split('|') {
            let part = part.trim();
            let (direction, name) = if let Some(name) = part.strip_prefix('^') {
                (Direction::Incoming, name)
            } else if let Some(name) = part.strip_prefix('~') {
                (Direction::Both, name)
            } else {
                (Direction::Outgoing, part)
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(RelationshipError::EmptyName(expression.to_string()));
            }
            set.insert(RelationshipSpec::new(curies.resolve_name(name), direction));
        }
        Ok(set)
    }
}

impl FromIterator<RelationshipSpec> for RelationshipSet {
    fn from_iter<T: IntoIterator<Item = RelationshipSpec>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for RelationshipSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
