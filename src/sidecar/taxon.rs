use super::{EntailedTypes, SidecarResolver, SidecarResult};
use crate::cache::{BoundedCache, CacheStats};
use crate::closure::TraversalDescription;
use crate::graph::{Direction, GraphSource, NodeId};
use crate::vocab;
use std::sync::Arc;

/// The organism an entity belongs to: the first node reached through an
/// in-taxon relationship
pub struct TaxonOf {
    graph: Arc<dyn GraphSource>,
    description: TraversalDescription,
    cache: BoundedCache<NodeId, Vec<NodeId>>,
}

impl TaxonOf {
    pub fn new(graph: Arc<dyn GraphSource>, entailed: &EntailedTypes, cache_capacity: usize) -> Self {
        let description = TraversalDescription::depth_first()
            .relationships(vocab::OWL_EQUIVALENT_CLASS, Direction::Both)
            .relationships(vocab::OWL_SAME_AS, Direction::Both)
            .relationships(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .relationships(vocab::RDF_TYPE, Direction::Outgoing)
            .relationships(vocab::IN_TAXON, Direction::Outgoing)
            .relationship_family(&entailed.part_of, Direction::Outgoing)
            .relationship_family(&entailed.has_part, Direction::Incoming)
            .relationship_family(&entailed.subsequence_of, Direction::Incoming)
            .relationship_family(&entailed.variant, Direction::Outgoing)
            .relationships(vocab::DERIVES_FROM, Direction::Outgoing)
            .relationships(vocab::HAS_GENOTYPE, Direction::Outgoing);

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
            .find(|step| {
                step.last_edge
                    .and_then(|id| graph.edge(id))
                    .is_some_and(|edge| edge.is_type(vocab::IN_TAXON))
            })
            .map(|step| vec![step.node])
            .unwrap_or_default()
    }
}

impl SidecarResolver for TaxonOf {
    fn name(&self) -> &'static str {
        "taxon"
    }

    fn resolve(&self, node: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.cache.get_or_try_insert_with(node, || Ok(self.find(node)))
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
