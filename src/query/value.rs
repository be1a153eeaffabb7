//! Values bound in result rows

use crate::graph::{EdgeId, NodeId, PropertyValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::ControlFlow;

/// A walk through the graph: `nodes.len() == edges.len() + 1`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl GraphPath {
    pub fn start(node: NodeId) -> Self {
        GraphPath {
            nodes: vec![node],
            edges: Vec::new(),
        }
    }

    pub fn push(&mut self, edge: EdgeId, node: NodeId) {
        self.edges.push(edge);
        self.nodes.push(node);
    }

    pub fn pop(&mut self) {
        if self.edges.pop().is_some() {
            self.nodes.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A value in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Node(NodeId),
    Edge(EdgeId),
    Path(GraphPath),
    Property(PropertyValue),
    Null,
}

impl Value {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Value::Edge(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyValue> {
        match self {
            Value::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Property(PropertyValue::Null))
    }

    /// Equality as used by `WHERE`: nodes compare equal to their numeric id,
    /// null equals nothing
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            _ if self.is_null() || other.is_null() => false,
            (Value::Node(id), Value::Property(PropertyValue::Integer(i)))
            | (Value::Property(PropertyValue::Integer(i)), Value::Node(id)) => id.as_u64() as i64 == *i,
            _ => self == other,
        }
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<EdgeId> for Value {
    fn from(id: EdgeId) -> Self {
        Value::Edge(id)
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        Value::Property(value)
    }
}

/// One result row: column name -> value, in projection order
pub type Row = IndexMap<String, Value>;

/// Receives rows one at a time; `Break` stops the match early
pub type RowSink<'s> = dyn FnMut(Row) -> ControlFlow<()> + 's;

/// Named query parameters (`$id`)
pub type Params = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_push_pop() {
        let mut path = GraphPath::start(NodeId::new(1));
        path.push(EdgeId::new(7), NodeId::new(2));
        assert_eq!(path.len(), 1);
        path.pop();
        assert!(path.is_empty());
        assert_eq!(path.nodes, vec![NodeId::new(1)]);
        path.pop();
        assert_eq!(path.nodes, vec![NodeId::new(1)]);
    }

    #[test]
    fn test_node_matches_integer_id() {
        let node = Value::Node(NodeId::new(5));
        assert!(node.matches(&Value::Property(PropertyValue::Integer(5))));
        assert!(node.matches(&Value::Node(NodeId::new(5))));
        assert!(!node.matches(&Value::Node(NodeId::new(6))));
        assert!(!Value::Null.matches(&Value::Null));
    }
}
