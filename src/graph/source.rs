//! Read-only view of a property graph
//!
//! Everything downstream of the graph (closures, sidecars, evidence,
//! assembly) talks to this trait only. The loader never writes to the graph.

use super::edge::Edge;
use super::node::Node;
use super::types::{Direction, EdgeId, NodeId};
use crate::query::{Params, QueryResult, Row};
use crate::vocab;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::ops::ControlFlow;

pub trait GraphSource: Send + Sync {
    fn node(&self, id: NodeId) -> Option<&Node>;

    fn edge(&self, id: EdgeId) -> Option<&Edge>;

    fn node_by_iri(&self, iri: &str) -> Option<NodeId>;

    /// Relationships attached to `id` readable in `direction`.
    /// `Both` yields outgoing first, then incoming.
    fn relationships(&self, id: NodeId, direction: Direction) -> Vec<&Edge>;

    fn nodes_with_label(&self, label: &str) -> Vec<NodeId>;

    /// Every node handle, in ascending order
    fn node_ids(&self) -> Vec<NodeId>;

    /// Run a declarative pattern query, handing rows to `sink` as they are
    /// matched. Returns the number of rows emitted.
    fn execute_each(&self, query: &str, params: &Params, sink: &mut dyn FnMut(Row) -> ControlFlow<()>) -> QueryResult<usize>;

    /// Run a query and collect its rows. Only for small result sets.
    fn execute(&self, query: &str, params: &Params) -> QueryResult<Vec<Row>> {
        let mut rows = Vec::new();
        self.execute_each(query, params, &mut |row| {
            rows.push(row);
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }

    /// `parent` plus the IRIs of every property declared (transitively) as its
    /// sub-property. Unknown parents entail only themselves.
    fn entailed_relationship_types(&self, parent: &str) -> Vec<String> {
        let mut entailed = vec![parent.to_string()];
        let Some(root) = self.node_by_iri(parent) else {
            return entailed;
        };

        let mut seen = FxHashSet::default();
        seen.insert(root);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for edge in self.relationships(current, Direction::Incoming) {
                if !edge.is_type(vocab::RDFS_SUB_PROPERTY_OF) || !seen.insert(edge.source) {
                    continue;
                }
                if let Some(iri) = self.node(edge.source).and_then(|n| n.iri()) {
                    entailed.push(iri.to_string());
                }
                queue.push_back(edge.source);
            }
        }
        entailed
    }
}
