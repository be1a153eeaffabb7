use super::{dedup, SidecarResolver, SidecarResult};
use crate::cache::{BoundedCache, CacheStats};
use crate::closure::TraversalDescription;
use crate::graph::{Direction, GraphSource, NodeId};
use crate::vocab::{self, category};
use std::sync::Arc;

/// Direct orthologs of a gene, either direction
pub struct OrthologOf {
    graph: Arc<dyn GraphSource>,
    description: TraversalDescription,
    cache: BoundedCache<NodeId, Vec<NodeId>>,
}

impl OrthologOf {
    pub fn new(graph: Arc<dyn GraphSource>, cache_capacity: usize) -> Self {
        let description = TraversalDescription::breadth_first()
            .from_depth(1)
            .to_depth(1)
            .relationships(vocab::ORTHOLOGOUS_TO, Direction::Both)
            .relationships(vocab::IN_1_TO_1_ORTHOLOGY, Direction::Both);

        Self {
            graph,
            description,
            cache: BoundedCache::new(cache_capacity),
        }
    }

    fn find(&self, start: NodeId) -> Vec<NodeId> {
        let graph = self.graph.as_ref();
        let genes = self
            .description
            .traverse(graph, start)
            .map(|step| step.node)
            .filter(|id| *id != start)
            .filter(|id| graph.node(*id).is_some_and(|n| n.has_label(category::GENE)));
        dedup(genes)
    }
}

impl SidecarResolver for OrthologOf {
    fn name(&self) -> &'static str {
        "ortholog"
    }

    fn resolve(&self, node: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.cache.get_or_try_insert_with(node, || Ok(self.find(node)))
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
