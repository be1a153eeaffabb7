//! Directed, typed relationship between two nodes

use super::property::{keys, PropertyMap, PropertyValue};
use super::types::{Direction, EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// A relationship in the property graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, edge_type: impl Into<EdgeType>) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn new_with_properties(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
        properties: PropertyMap,
    ) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            properties,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// IRI of the property this relationship instantiates.
    ///
    /// Loaders record it in an `iri` property; when absent the type name
    /// already is the predicate IRI.
    pub fn iri(&self) -> &str {
        self.properties
            .get(keys::IRI)
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| self.edge_type.as_str())
    }

    pub fn is_type(&self, edge_type: &str) -> bool {
        self.edge_type.as_str() == edge_type
    }

    /// The endpoint opposite `node`. For self loops this is `node` itself.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }

    /// Whether the relationship can be followed from `node` in `direction`
    pub fn leaves(&self, node: NodeId, direction: Direction) -> bool {
        match direction {
            Direction::Outgoing => self.source == node,
            Direction::Incoming => self.target == node,
            Direction::Both => self.source == node || self.target == node,
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

impl std::hash::Hash for Edge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_direction() {
        let edge = Edge::new(EdgeId::new(2), NodeId::new(10), NodeId::new(20), "subClassOf");

        assert!(edge.leaves(NodeId::new(10), Direction::Outgoing));
        assert!(edge.leaves(NodeId::new(20), Direction::Incoming));
        assert!(!edge.leaves(NodeId::new(20), Direction::Outgoing));
        assert!(edge.leaves(NodeId::new(20), Direction::Both));
        assert_eq!(edge.other_end(NodeId::new(10)), NodeId::new(20));
        assert_eq!(edge.other_end(NodeId::new(20)), NodeId::new(10));
    }

    #[test]
    fn test_edge_iri_falls_back_to_type() {
        let mut edge = Edge::new(EdgeId::new(1), NodeId::new(1), NodeId::new(2), "CAUSES");
        assert_eq!(edge.iri(), "CAUSES");

        edge.set_property("iri", "http://x.org/a_CAUSES");
        assert_eq!(edge.iri(), "http://x.org/a_CAUSES");
        assert!(edge.is_type("CAUSES"));
    }

    #[test]
    fn test_self_loop_other_end() {
        let edge = Edge::new(EdgeId::new(3), NodeId::new(5), NodeId::new(5), "sameAs");
        assert_eq!(edge.other_end(NodeId::new(5)), NodeId::new(5));
    }
}
