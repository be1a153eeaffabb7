//! Cached closure computation

use super::relationship::RelationshipSet;
use super::traversal::{Order, TraversalDescription};
use super::{Closure, ClosureError, ClosureResult};
use crate::cache::{BoundedCache, CacheStats};
use crate::curie::CurieResolver;
use crate::graph::{GraphSource, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Whether the start node is part of its own closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureShape {
    IncludeRoot,
    ExcludeRoot,
}

/// Cache key: equal for equal relationship sets, whatever instance built them
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClosureKey {
    pub node: NodeId,
    pub types: RelationshipSet,
    pub shape: ClosureShape,
    pub order: Order,
}

pub struct ClosureEngine {
    graph: Arc<dyn GraphSource>,
    curies: Arc<CurieResolver>,
    anonymous_prefixes: Vec<String>,
    cache: BoundedCache<ClosureKey, Arc<Closure>>,
    traversals: AtomicU64,
}

impl ClosureEngine {
    pub fn new(
        graph: Arc<dyn GraphSource>,
        curies: Arc<CurieResolver>,
        anonymous_prefixes: Vec<String>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            graph,
            curies,
            anonymous_prefixes,
            cache: BoundedCache::new(cache_capacity),
            traversals: AtomicU64::new(0),
        }
    }

    /// Depth-first closure including the start node
    pub fn closure(&self, start: NodeId, types: &RelationshipSet) -> ClosureResult<Arc<Closure>> {
        self.closure_with(start, types, ClosureShape::IncludeRoot, Order::DepthFirst)
    }

    /// Like [`closure`](Self::closure), but logs failures and returns an
    /// empty closure instead
    pub fn closure_or_empty(&self, start: NodeId, types: &RelationshipSet) -> Arc<Closure> {
        match self.closure(start, types) {
            Ok(closure) => closure,
            Err(e) => {
                warn!("Closure of {} over {} failed: {}", start, types, e);
                Arc::new(Closure::default())
            }
        }
    }

    pub fn closure_with(
        &self,
        start: NodeId,
        types: &RelationshipSet,
        shape: ClosureShape,
        order: Order,
    ) -> ClosureResult<Arc<Closure>> {
        let key = ClosureKey {
            node: start,
            types: types.clone(),
            shape,
            order,
        };
        self.cache
            .get_or_try_insert_with(key, || self.compute(start, types, shape, order).map(Arc::new))
    }

    /// Document id for a node: curie, else IRI
    pub fn entity_id(&self, node: NodeId) -> ClosureResult<String> {
        let node = self.graph.node(node).ok_or(ClosureError::NodeNotFound(node))?;
        let iri = node.iri().ok_or(ClosureError::MissingIri(node.id))?;
        Ok(self.curies.id_for(iri))
    }

    /// Blank or skolemised node, never surfaced as an identifier
    pub fn is_anonymous(&self, node: NodeId) -> bool {
        match self.graph.node(node).and_then(|n| n.iri()) {
            Some(iri) => self.anonymous_prefixes.iter().any(|p| iri.starts_with(p.as_str())),
            None => true,
        }
    }

    /// Number of traversals actually run (cache misses)
    pub fn traversal_count(&self) -> u64 {
        self.traversals.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn graph(&self) -> &Arc<dyn GraphSource> {
        &self.graph
    }

    pub fn curies(&self) -> &Arc<CurieResolver> {
        &self.curies
    }

    fn compute(
        &self,
        start: NodeId,
        types: &RelationshipSet,
        shape: ClosureShape,
        order: Order,
    ) -> ClosureResult<Closure> {
        self.traversals.fetch_add(1, Ordering::Relaxed);

        let graph = self.graph.as_ref();
        let root = graph.node(start).ok_or(ClosureError::NodeNotFound(start))?;
        let root_iri = root.iri().ok_or(ClosureError::MissingIri(start))?;

        let mut closure = Closure {
            curie: self.curies.id_for(root_iri),
            label: root.first_label().unwrap_or_default().to_string(),
            ..Closure::default()
        };

        let description = TraversalDescription::with_order(order)
            .relationship_set(types)
            .exclude_anonymous(&self.anonymous_prefixes);

        for step in description.traverse(graph, start) {
            if shape == ClosureShape::ExcludeRoot && step.node == start {
                continue;
            }
            let Some(node) = graph.node(step.node) else {
                continue;
            };
            let Some(iri) = node.iri() else {
                continue;
            };
            closure.push(self.curies.id_for(iri), node.first_label());
        }

        if closure.label.is_empty() {
            closure.label = closure.curie.clone();
        }
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Direction, GraphStore};
    use crate::vocab;

    /// Scenario graph: c -subClassOf-> b -subClassOf-> a, d -type-> c.
    /// a is labelled "A", c is labelled "C", b has no label.
    fn scenario() -> (Arc<GraphStore>, [NodeId; 4]) {
        let mut store = GraphStore::new();
        let a = store.create_node("http://x.org/a_a");
        let b = store.create_node("http://x.org/a_b");
        let c = store.create_node("http://x.org/a_c");
        let d = store.create_node("http://x.org/a_d");
        store.set_node_property(a, "label", "A").unwrap();
        store.set_node_property(c, "label", "C").unwrap();
        store.create_edge(c, b, vocab::RDFS_SUBCLASS_OF).unwrap();
        store.create_edge(b, a, vocab::RDFS_SUBCLASS_OF).unwrap();
        store.create_edge(d, c, vocab::RDF_TYPE).unwrap();
        (Arc::new(store), [a, b, c, d])
    }

    fn engine(store: Arc<GraphStore>) -> ClosureEngine {
        let curies = CurieResolver::new(vec![("X".to_string(), "http://x.org/a_".to_string())]);
        ClosureEngine::new(store, Arc::new(curies), vec!["_:".to_string()], 100)
    }

    #[test]
    fn test_subclass_closure() {
        let (store, [_, _, c, _]) = scenario();
        let engine = engine(store);
        let types = RelationshipSet::new().with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing);

        let closure = engine.closure(c, &types).unwrap();
        assert_eq!(closure.curie, "X:c");
        assert_eq!(closure.label, "C");
        assert_eq!(closure.curies, vec!["X:c", "X:b", "X:a"]);
        assert_eq!(closure.labels, vec!["C", "A"]);
        assert_eq!(closure.closure_map.get("X:a").map(String::as_str), Some("A"));
        assert!(!closure.closure_map.contains_key("X:b"));
    }

    #[test]
    fn test_mixed_type_closure() {
        let (store, [_, _, _, d]) = scenario();
        let engine = engine(store);
        let types = RelationshipSet::new()
            .with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .with(vocab::RDF_TYPE, Direction::Outgoing);

        let closure = engine.closure(d, &types).unwrap();
        assert_eq!(closure.curies, vec!["X:d", "X:c", "X:b", "X:a"]);
        // d has no label: the primary label falls back to the id
        assert_eq!(closure.label, "X:d");
        assert_eq!(closure.labels, vec!["C", "A"]);
    }

    #[test]
    fn test_exclude_root_shape() {
        let (store, [_, _, c, _]) = scenario();
        let engine = engine(store);
        let types = RelationshipSet::new().with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing);

        let closure = engine
            .closure_with(c, &types, ClosureShape::ExcludeRoot, Order::BreadthFirst)
            .unwrap();
        assert_eq!(closure.curie, "X:c");
        assert_eq!(closure.curies, vec!["X:b", "X:a"]);
    }

    #[test]
    fn test_equal_sets_hit_the_cache() {
        let (store, [_, _, c, _]) = scenario();
        let engine = engine(store);
        let first = RelationshipSet::new()
            .with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .with(vocab::RDF_TYPE, Direction::Outgoing);
        let second = RelationshipSet::new()
            .with(vocab::RDF_TYPE, Direction::Outgoing)
            .with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing);

        let a = engine.closure(c, &first).unwrap();
        let b = engine.closure(c, &second).unwrap();
        assert_eq!(engine.traversal_count(), 1);
        assert!(Arc::ptr_eq(&a, &b));

        engine.closure_with(c, &first, ClosureShape::ExcludeRoot, Order::DepthFirst).unwrap();
        assert_eq!(engine.traversal_count(), 2);
        assert_eq!(engine.cache_stats().hits, 1);
    }

    #[test]
    fn test_concurrent_readers_converge() {
        let (store, [a, b, c, d]) = scenario();
        let engine = engine(store);
        let types = RelationshipSet::new()
            .with(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .with(vocab::RDF_TYPE, Direction::Outgoing);
        let threads = 8;

        let same_key: Vec<Arc<Closure>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| scope.spawn(|| engine.closure(d, &types).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(same_key.iter().all(|closure| **closure == *same_key[0]));
        assert_eq!(same_key[0].curies, vec!["X:d", "X:c", "X:b", "X:a"]);
        let traversals = engine.traversal_count();
        assert!((1..=threads as u64).contains(&traversals));

        std::thread::scope(|scope| {
            for (i, node) in [a, b, c, d].into_iter().cycle().take(threads).enumerate() {
                let engine = &engine;
                let types = &types;
                scope.spawn(move || {
                    let closure = engine.closure(node, types).unwrap();
                    assert_eq!(closure.curies.len(), i % 4 + 1);
                });
            }
        });
        assert_eq!(*engine.closure(d, &types).unwrap(), *same_key[0]);
        assert!(engine.traversal_count() <= traversals + threads as u64);
    }

    #[test]
    fn test_cycles_terminate_without_duplicates() {
        let mut store = GraphStore::new();
        let x = store.create_node("http://x.org/a_x");
        let y = store.create_node("http://x.org/a_y");
        store.create_edge(x, y, vocab::OWL_EQUIVALENT_CLASS).unwrap();
        store.create_edge(y, x, vocab::OWL_EQUIVALENT_CLASS).unwrap();
        store.create_edge(x, x, vocab::OWL_SAME_AS).unwrap();
        let engine = engine(Arc::new(store));

        let closure = engine.closure(x, &RelationshipSet::default_closure_types()).unwrap();
        assert_eq!(closure.curies, vec!["X:x", "X:y"]);
    }

    #[test]
    fn test_anonymous_nodes_never_surface() {
        let mut store = GraphStore::new();
        let x = store.create_node("http://x.org/a_x");
        let blank = store.create_node("_:restriction");
        let hidden = store.create_node("http://x.org/a_hidden");
        store.create_edge(x, blank, vocab::RDFS_SUBCLASS_OF).unwrap();
        store.create_edge(blank, hidden, vocab::RDFS_SUBCLASS_OF).unwrap();
        let engine = engine(Arc::new(store));

        let closure = engine.closure(x, &RelationshipSet::default_closure_types()).unwrap();
        assert_eq!(closure.curies, vec!["X:x"]);
    }

    #[test]
    fn test_failures() {
        let mut store = GraphStore::new();
        let unnamed = store.create_anonymous_node();
        let engine = engine(Arc::new(store));
        let types = RelationshipSet::default_closure_types();

        assert_eq!(
            engine.closure(NodeId::new(77), &types).unwrap_err(),
            ClosureError::NodeNotFound(NodeId::new(77))
        );
        assert_eq!(engine.closure(unnamed, &types).unwrap_err(), ClosureError::MissingIri(unnamed));
        assert!(engine.closure_or_empty(unnamed, &types).curies.is_empty());
    }

    #[test]
    fn test_unknown_namespace_uses_raw_iri() {
        let mut store = GraphStore::new();
        let y = store.create_node("http://y.org/thing");
        let engine = engine(Arc::new(store));
        let closure = engine.closure(y, &RelationshipSet::default_closure_types()).unwrap();
        assert_eq!(closure.curie, "http://y.org/thing");
        assert_eq!(engine.entity_id(y).unwrap(), "http://y.org/thing");
    }
}
