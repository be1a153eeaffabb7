//! Transitive closures over typed relationships
//!
//! A closure of a node is the ordered list of entities reachable from it
//! along a set of (type, direction) constraints, each identified by curie and
//! labelled by its declared label.

pub mod engine;
pub mod relationship;
pub mod traversal;

pub use engine::{ClosureEngine, ClosureKey, ClosureShape};
pub use relationship::{RelationshipError, RelationshipSet, RelationshipSpec};
pub use traversal::{Order, Step, TraversalDescription, Traverser};

use crate::graph::NodeId;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClosureError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Node {0} has no IRI")]
    MissingIri(NodeId),
}

pub type ClosureResult<T> = Result<T, ClosureError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    /// Primary id (curie, or IRI when no prefix matches)
    pub curie: String,
    /// Primary label; the primary id when the entity has none
    pub label: String,
    /// Ids in traversal order, each entity once
    pub curies: Vec<String>,
    /// Declared labels in traversal order. Entities without a label are
    /// skipped, so this is not parallel to `curies`.
    pub labels: Vec<String>,
    /// id -> label for every labelled entity
    pub closure_map: IndexMap<String, String>,
    /// Ids already pushed; distinct nodes can share a curie
    seen: FxHashSet<String>,
}

impl Closure {
    pub(crate) fn push(&mut self, id: String, label: Option<&str>) {
        if !self.seen.insert(id.clone()) {
            return;
        }
        if let Some(label) = label {
            self.labels.push(label.to_string());
            self.closure_map.insert(id.clone(), label.to_string());
        }
        self.curies.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.curie.is_empty() && self.curies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_ids_are_pushed_once() {
        let mut closure = Closure::default();
        closure.push("X:1".to_string(), Some("one"));
        closure.push("X:2".to_string(), None);
        closure.push("X:1".to_string(), Some("one again"));
        assert_eq!(closure.curies, vec!["X:1", "X:2"]);
        assert_eq!(closure.labels, vec!["one"]);
        assert_eq!(closure.closure_map.len(), 1);
    }

    #[test]
    fn test_large_closure_keeps_traversal_order() {
        let mut closure = Closure::default();
        for i in (0..20_000).rev() {
            closure.push(format!("X:{}", i), None);
        }
        closure.push("X:0".to_string(), None);
        assert_eq!(closure.curies.len(), 20_000);
        assert_eq!(closure.curies[0], "X:19999");
        assert_eq!(closure.curies[19_999], "X:0");
    }
}
