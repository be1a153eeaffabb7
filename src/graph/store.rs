//! In-memory graph storage
//!
//! Arena-style storage indexed by handle, with adjacency lists in both
//! directions plus label, relationship-type and IRI indices. The loader treats
//! a populated store as immutable; the mutators exist for loading snapshots
//! and building fixtures.

use super::edge::Edge;
use super::node::Node;
use super::property::{keys, PropertyMap, PropertyValue};
use super::source::GraphSource;
use super::types::{Direction, EdgeId, EdgeType, Label, NodeId};
use crate::query::{Params, QueryCache, QueryExecutor, QueryResult, Row};
use std::collections::HashMap;
use std::ops::ControlFlow;
use thiserror::Error;

/// Errors that can occur while building a graph
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory graph storage
///
/// - nodes / edges: arenas indexed by handle (slot 0 unused)
/// - outgoing / incoming: adjacency lists per node
/// - label_index: category -> nodes, in insertion order
/// - edge_type_index: relationship type -> edges
/// - iri_index: IRI -> node
/// - queries: parsed query text, shared by every caller
#[derive(Debug)]
pub struct GraphStore {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    label_index: HashMap<Label, Vec<NodeId>>,
    edge_type_index: HashMap<EdgeType, Vec<EdgeId>>,
    iri_index: HashMap<String, NodeId>,
    queries: QueryCache,
    next_node_id: u64,
    next_edge_id: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            nodes: Vec::with_capacity(1024),
            edges: Vec::with_capacity(4096),
            outgoing: Vec::with_capacity(1024),
            incoming: Vec::with_capacity(1024),
            label_index: HashMap::new(),
            edge_type_index: HashMap::new(),
            iri_index: HashMap::new(),
            queries: QueryCache::default(),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    /// Create a node identified by `iri`
    pub fn create_node(&mut self, iri: impl Into<String>) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(Node::new(id, iri));
        id
    }

    /// Create a node without an IRI (a blank node)
    pub fn create_anonymous_node(&mut self) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(Node::anonymous(id));
        id
    }

    pub fn create_node_with_properties(&mut self, labels: Vec<Label>, properties: PropertyMap) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(Node::new_with_properties(id, labels, properties));
        id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_u64() as usize).and_then(|slot| slot.as_ref())
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Set a property on a node, keeping the IRI index in step
    pub fn set_node_property(
        &mut self,
        node_id: NodeId,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<()> {
        let key = key.into();
        let value = value.into();
        let node = self
            .nodes
            .get_mut(node_id.as_u64() as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(GraphError::NodeNotFound(node_id))?;

        if key == keys::IRI {
            if let Some(old) = node.iri() {
                self.iri_index.remove(old);
            }
            if let Some(iri) = value.as_string() {
                self.iri_index.insert(iri.to_string(), node_id);
            }
        }
        node.set_property(key, value);
        Ok(())
    }

    /// Add a category label to an existing node AND update the label index
    pub fn add_label_to_node(&mut self, node_id: NodeId, label: impl Into<Label>) -> GraphResult<()> {
        let label = label.into();
        let node = self
            .nodes
            .get_mut(node_id.as_u64() as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(GraphError::NodeNotFound(node_id))?;

        if node.labels.insert(label.clone()) {
            self.label_index.entry(label).or_default().push(node_id);
        }
        Ok(())
    }

    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
    ) -> GraphResult<EdgeId> {
        self.create_edge_with_properties(source, target, edge_type, PropertyMap::new())
    }

    pub fn create_edge_with_properties(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
        properties: PropertyMap,
    ) -> GraphResult<EdgeId> {
        let edge_id = EdgeId::new(self.next_edge_id);
        let edge = Edge::new_with_properties(edge_id, source, target, edge_type, properties);
        self.insert_edge(edge)?;
        Ok(edge_id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.as_u64() as usize).and_then(|slot| slot.as_ref())
    }

    pub fn get_outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.edges_from(&self.outgoing, node_id)
    }

    pub fn get_incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.edges_from(&self.incoming, node_id)
    }

    pub fn get_nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|&id| self.get_node(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        self.edge_type_index
            .get(edge_type)
            .map(|ids| ids.iter().filter_map(|&id| self.get_edge(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_node_by_iri(&self, iri: &str) -> Option<&Node> {
        self.iri_index.get(iri).and_then(|&id| self.get_node(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().flatten().count()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    /// Insert a node read back from a snapshot, preserving its handle
    pub fn insert_recovered_node(&mut self, node: Node) {
        if node.id.as_u64() >= self.next_node_id {
            self.next_node_id = node.id.as_u64() + 1;
        }
        self.insert_node(node);
    }

    /// Insert an edge read back from a snapshot, preserving its handle.
    /// Source and target nodes must already exist.
    pub fn insert_recovered_edge(&mut self, edge: Edge) -> GraphResult<()> {
        self.insert_edge(edge)
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn insert_node(&mut self, node: Node) {
        let node_id = node.id;
        let idx = node_id.as_u64() as usize;

        if idx >= self.nodes.len() {
            self.nodes.resize(idx + 1, None);
            self.outgoing.resize(idx + 1, Vec::new());
            self.incoming.resize(idx + 1, Vec::new());
        }

        for label in &node.labels {
            self.label_index.entry(label.clone()).or_default().push(node_id);
        }
        if let Some(iri) = node.iri() {
            self.iri_index.insert(iri.to_string(), node_id);
        }

        self.nodes[idx] = Some(node);
    }

    fn insert_edge(&mut self, edge: Edge) -> GraphResult<()> {
        if !self.has_node(edge.source) {
            return Err(GraphError::InvalidEdgeSource(edge.source));
        }
        if !self.has_node(edge.target) {
            return Err(GraphError::InvalidEdgeTarget(edge.target));
        }

        let edge_id = edge.id;
        let idx = edge_id.as_u64() as usize;
        if idx >= self.edges.len() {
            self.edges.resize(idx + 1, None);
        }

        self.outgoing[edge.source.as_u64() as usize].push(edge_id);
        self.incoming[edge.target.as_u64() as usize].push(edge_id);
        self.edge_type_index
            .entry(edge.edge_type.clone())
            .or_default()
            .push(edge_id);

        if edge_id.as_u64() >= self.next_edge_id {
            self.next_edge_id = edge_id.as_u64() + 1;
        }
        self.edges[idx] = Some(edge);
        Ok(())
    }

    fn edges_from<'a>(&'a self, adjacency: &'a [Vec<EdgeId>], node_id: NodeId) -> Vec<&'a Edge> {
        adjacency
            .get(node_id.as_u64() as usize)
            .map(|ids| ids.iter().filter_map(|&id| self.get_edge(id)).collect())
            .unwrap_or_default()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphSource for GraphStore {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.get_node(id)
    }

    fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.get_edge(id)
    }

    fn node_by_iri(&self, iri: &str) -> Option<NodeId> {
        self.iri_index.get(iri).copied()
    }

    fn relationships(&self, id: NodeId, direction: Direction) -> Vec<&Edge> {
        match direction {
            Direction::Outgoing => self.get_outgoing_edges(id),
            Direction::Incoming => self.get_incoming_edges(id),
            Direction::Both => {
                let mut edges = self.get_outgoing_edges(id);
                edges.extend(self.get_incoming_edges(id));
                edges
            }
        }
    }

    fn nodes_with_label(&self, label: &str) -> Vec<NodeId> {
        self.label_index
            .get(&Label::new(label))
            .cloned()
            .unwrap_or_default()
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.all_nodes().map(|n| n.id).collect()
    }

    fn execute_each(&self, query: &str, params: &Params, sink: &mut dyn FnMut(Row) -> ControlFlow<()>) -> QueryResult<usize> {
        let parsed = self.queries.parse(query)?;
        QueryExecutor::new(self, &parsed, params, sink).execute()
    }
}
