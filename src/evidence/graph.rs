//! Per-fact evidence subgraph
//!
//! Only handles are stored; properties are read back from the source graph
//! when fields are derived. That keeps bundles small enough to spill to disk
//! cheaply and makes merging a plain set union.

use crate::curie::CurieResolver;
use crate::graph::{EdgeId, GraphSource, NodeId};
use crate::query::{GraphPath, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceGraph {
    nodes: BTreeSet<NodeId>,
    edges: BTreeSet<EdgeId>,
}

impl EvidenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    /// Add a relationship together with both of its endpoints. Handles the
    /// graph does not know are ignored.
    pub fn add_edge(&mut self, graph: &dyn GraphSource, edge: EdgeId) -> bool {
        let Some(found) = graph.edge(edge) else {
            return false;
        };
        self.nodes.insert(found.source);
        self.nodes.insert(found.target);
        self.edges.insert(edge)
    }

    pub fn add_path(&mut self, graph: &dyn GraphSource, path: &GraphPath) {
        for node in &path.nodes {
            self.add_node(*node);
        }
        for edge in &path.edges {
            self.add_edge(graph, *edge);
        }
    }

    /// Add whatever graph element a row value holds; primitives add nothing
    pub fn add_value(&mut self, graph: &dyn GraphSource, value: &Value) {
        match value {
            Value::Node(id) => {
                self.add_node(*id);
            }
            Value::Edge(id) => {
                self.add_edge(graph, *id);
            }
            Value::Path(path) => self.add_path(graph, path),
            Value::Property(_) | Value::Null => {}
        }
    }

    /// Union `other` into this graph
    pub fn merge(&mut self, other: &EvidenceGraph) {
        self.nodes.extend(other.nodes.iter().copied());
        self.edges.extend(other.edges.iter().copied());
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Compact JSON rendering stored in the `evidence_graph` field:
    /// `{"nodes": [{"id", "lbl", "meta"}], "edges": [{"sub", "pred", "obj"}]}`
    pub fn to_json(&self, graph: &dyn GraphSource, curies: &CurieResolver) -> serde_json::Value {
        let node_id = |id: NodeId| {
            graph
                .node(id)
                .and_then(|n| n.iri())
                .map(|iri| curies.id_for(iri))
                .unwrap_or_else(|| id.to_string())
        };

        let nodes: Vec<serde_json::Value> = self
            .nodes()
            .filter_map(|id| graph.node(id))
            .map(|node| {
                let categories: Vec<&str> = node.labels.iter().map(|l| l.as_str()).collect();
                json!({
                    "id": node_id(node.id),
                    "lbl": node.first_label(),
                    "meta": { "category": categories },
                })
            })
            .collect();

        let edges: Vec<serde_json::Value> = self
            .edges()
            .filter_map(|id| graph.edge(id))
            .map(|edge| {
                json!({
                    "sub": node_id(edge.source),
                    "pred": curies.id_for(edge.iri()),
                    "obj": node_id(edge.target),
                })
            })
            .collect();

        json!({ "nodes": nodes, "edges": edges })
    }
}
