//! Lazy graph traversals with global node uniqueness
//!
//! A [`TraversalDescription`] says which relationships to follow, in which
//! order and between which depths; [`TraversalDescription::traverse`] turns it
//! into an iterator of [`Step`]s. Each node is visited at most once per
//! traversal, which is also what guarantees termination on cyclic graphs.

use super::relationship::RelationshipSet;
use crate::graph::{Direction, EdgeId, GraphSource, Node, NodeId};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Order {
    DepthFirst,
    BreadthFirst,
}

/// One visited node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub node: NodeId,
    pub depth: usize,
    /// Relationship the node was reached through; `None` for the start node
    pub last_edge: Option<EdgeId>,
}

#[derive(Debug, Clone)]
pub struct TraversalDescription {
    order: Order,
    relationships: RelationshipSet,
    min_depth: usize,
    max_depth: Option<usize>,
    excluded_prefixes: Vec<String>,
}

impl TraversalDescription {
    pub fn depth_first() -> Self {
        Self::with_order(Order::DepthFirst)
    }

    pub fn breadth_first() -> Self {
        Self::with_order(Order::BreadthFirst)
    }

    pub fn with_order(order: Order) -> Self {
        Self {
            order,
            relationships: RelationshipSet::new(),
            min_depth: 0,
            max_depth: None,
            excluded_prefixes: Vec::new(),
        }
    }

    pub fn relationships(mut self, type_name: impl Into<String>, direction: Direction) -> Self {
        self.relationships = self.relationships.with(type_name, direction);
        self
    }

    /// Follow every type in `type_names` in `direction`
    pub fn relationship_family<I, S>(mut self, type_names: I, direction: Direction) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships = self.relationships.with_all(type_names, direction);
        self
    }

    pub fn relationship_set(mut self, set: &RelationshipSet) -> Self {
        for spec in set.iter() {
            self.relationships.insert(spec.clone());
        }
        self
    }

    /// Do not yield nodes shallower than `depth`
    pub fn from_depth(mut self, depth: usize) -> Self {
        self.min_depth = depth;
        self
    }

    /// Do not expand past `depth`
    pub fn to_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Prune nodes without an IRI or whose IRI starts with one of `prefixes`.
    /// The start node is never pruned.
    pub fn exclude_anonymous(mut self, prefixes: &[String]) -> Self {
        self.excluded_prefixes = prefixes.to_vec();
        self
    }

    pub fn relationship_types(&self) -> &RelationshipSet {
        &self.relationships
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn traverse<'a>(&'a self, graph: &'a dyn GraphSource, start: NodeId) -> Traverser<'a> {
        let mut frontier = VecDeque::new();
        if graph.node(start).is_some() {
            frontier.push_back(Step {
                node: start,
                depth: 0,
                last_edge: None,
            });
        }
        Traverser {
            graph,
            description: self,
            frontier,
            visited: FxHashSet::default(),
        }
    }

    fn excludes(&self, node: &Node) -> bool {
        if self.excluded_prefixes.is_empty() {
            return false;
        }
        match node.iri() {
            Some(iri) => self.excluded_prefixes.iter().any(|p| iri.starts_with(p.as_str())),
            None => true,
        }
    }
}

pub struct Traverser<'a> {
    graph: &'a dyn GraphSource,
    description: &'a TraversalDescription,
    frontier: VecDeque<Step>,
    visited: FxHashSet<NodeId>,
}

impl<'a> Traverser<'a> {
    fn expand(&mut self, step: Step) {
        if self.description.max_depth.is_some_and(|max| step.depth >= max) {
            return;
        }
        let relationships = &self.description.relationships;
        let edges = self
            .graph
            .relationships(step.node, relationships.scan_direction());

        let next: Vec<Step> = edges
            .into_iter()
            .filter(|edge| relationships.admits(edge, step.node))
            .map(|edge| Step {
                node: edge.other_end(step.node),
                depth: step.depth + 1,
                last_edge: Some(edge.id),
            })
            .filter(|s| !self.visited.contains(&s.node))
            .collect();

        match self.description.order {
            // Reversed so the first relationship is explored first
            Order::DepthFirst => self.frontier.extend(next.into_iter().rev()),
            Order::BreadthFirst => self.frontier.extend(next),
        }
    }
}

impl<'a> Iterator for Traverser<'a> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        loop {
            let step = match self.description.order {
                Order::DepthFirst => self.frontier.pop_back()?,
                Order::BreadthFirst => self.frontier.pop_front()?,
            };
            if !self.visited.insert(step.node) {
                continue;
            }
            let Some(node) = self.graph.node(step.node) else {
                continue;
            };
            if step.depth > 0 && self.description.excludes(node) {
                continue;
            }
            self.expand(step);
            if step.depth >= self.description.min_depth {
                return Some(step);
            }
        }
    }
}
