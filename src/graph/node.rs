//! Graph node: an ontology class, individual or association
//!
//! Every entity that reaches a document is identified by its `iri` property.
//! Nodes without one (blank nodes from the source RDF) can still be walked
//! over but never surface as identifiers.

use super::property::{keys, PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node in the property graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    /// Category labels (`gene`, `cliqueLeader`, ...), kept sorted so category
    /// lists come out in a stable order
    pub labels: BTreeSet<Label>,

    pub properties: PropertyMap,
}

impl Node {
    /// Create a node identified by `iri`
    pub fn new(id: NodeId, iri: impl Into<String>) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(keys::IRI.to_string(), PropertyValue::String(iri.into()));
        Node {
            id,
            labels: BTreeSet::new(),
            properties,
        }
    }

    /// Create a node with no IRI
    pub fn anonymous(id: NodeId) -> Self {
        Node {
            id,
            labels: BTreeSet::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn new_with_properties(id: NodeId, labels: Vec<Label>, properties: PropertyMap) -> Self {
        Node {
            id,
            labels: labels.into_iter().collect(),
            properties,
        }
    }

    pub fn iri(&self) -> Option<&str> {
        self.properties.get(keys::IRI).and_then(|v| v.as_string())
    }

    /// Declared human-readable labels (the `label` property), not categories
    pub fn display_labels(&self) -> Vec<&str> {
        self.property_strings(keys::LABEL)
    }

    /// First declared label, if any
    pub fn first_label(&self) -> Option<&str> {
        self.display_labels().into_iter().next()
    }

    /// String values of a property that may be single or multi valued
    pub fn property_strings(&self, key: &str) -> Vec<&str> {
        self.properties
            .get(key)
            .map(|v| v.strings())
            .unwrap_or_default()
    }

    pub fn add_label(&mut self, label: impl Into<Label>) {
        self.labels.insert(label.into());
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.as_str() == label)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_iri() {
        let node = Node::new(NodeId::new(1), "http://x.org/a_a");
        assert_eq!(node.iri(), Some("http://x.org/a_a"));
        assert!(Node::anonymous(NodeId::new(2)).iri().is_none());
    }

    #[test]
    fn test_display_labels_single_and_multi() {
        let mut node = Node::new(NodeId::new(1), "http://x.org/a_a");
        assert!(node.first_label().is_none());

        node.set_property("label", "A");
        assert_eq!(node.display_labels(), vec!["A"]);

        node.set_property("label", vec!["A", "alpha"]);
        assert_eq!(node.display_labels(), vec!["A", "alpha"]);
        assert_eq!(node.first_label(), Some("A"));
    }

    #[test]
    fn test_categories() {
        let mut node = Node::new(NodeId::new(3), "http://x.org/g");
        node.add_label("gene");
        node.add_label("cliqueLeader");
        assert!(node.has_label("gene"));
        assert!(!node.has_label("variant"));
        let ordered: Vec<&str> = node.labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(ordered, vec!["cliqueLeader", "gene"]);
    }

    #[test]
    fn test_node_equality_by_id() {
        let a = Node::new(NodeId::new(7), "http://x.org/a");
        let b = Node::new(NodeId::new(7), "http://x.org/b");
        let c = Node::new(NodeId::new(8), "http://x.org/a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
