use super::{EntailedTypes, SidecarResolver, SidecarResult};
use crate::cache::{BoundedCache, CacheStats};
use crate::closure::TraversalDescription;
use crate::graph::{Direction, GraphSource, NodeId};
use crate::vocab::{self, category};
use std::sync::Arc;

/// The gene behind a variant or genotype: the first `gene` node reached,
/// never the start node itself
pub struct GeneOf {
    graph: Arc<dyn GraphSource>,
    description: TraversalDescription,
    cache: BoundedCache<NodeId, Vec<NodeId>>,
}

impl GeneOf {
    pub fn new(graph: Arc<dyn GraphSource>, entailed: &EntailedTypes, cache_capacity: usize) -> Self {
        let description = TraversalDescription::depth_first()
            .from_depth(1)
            .relationships(vocab::OWL_SAME_AS, Direction::Both)
            .relationships(vocab::OWL_EQUIVALENT_CLASS, Direction::Both)
            .relationship_family(&entailed.part_of, Direction::Outgoing)
            .relationship_family(&entailed.variant, Direction::Incoming)
            .relationships(vocab::DERIVES_SEQ_FROM_GENE, Direction::Outgoing)
            .relationships(vocab::HAS_GENOTYPE, Direction::Incoming)
            .relationships(vocab::DERIVES_FROM, Direction::Outgoing);

        Self {
            graph,
            description,
            cache: BoundedCache::new(cache_capacity),
        }
    }

    fn find(&self, start: NodeId) -> Vec<NodeId> {
        let graph = self.graph.as_ref();
        self.description
            .traverse(graph, start)
            .find(|step| graph.node(step.node).is_some_and(|n| n.has_label(category::GENE)))
            .map(|step| vec![step.node])
            .unwrap_or_default()
    }
}

impl SidecarResolver for GeneOf {
    fn name(&self) -> &'static str {
        "gene"
    }

    fn resolve(&self, node: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.cache.get_or_try_insert_with(node, || Ok(self.find(node)))
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
