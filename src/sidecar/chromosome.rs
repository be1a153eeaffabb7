use super::{dedup, SidecarResolver, SidecarResult};
use crate::cache::{BoundedCache, CacheStats};
use crate::closure::TraversalDescription;
use crate::graph::{Direction, GraphSource, NodeId};
use crate::vocab;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::debug;

/// Chromosomes a feature is located on.
///
/// Follows location/begin/reference hops plus the class hierarchy; a
/// chromosome is the instance end of an `rdf:type` edge whose class is
/// `SO:0000340` or one of its subclasses.
pub struct ChromosomeOf {
    graph: Arc<dyn GraphSource>,
    description: TraversalDescription,
    chromosome_classes: FxHashSet<NodeId>,
    cache: BoundedCache<NodeId, Vec<NodeId>>,
}

impl ChromosomeOf {
    pub fn new(graph: Arc<dyn GraphSource>, cache_capacity: usize) -> Self {
        let description = TraversalDescription::depth_first()
            .relationships(vocab::OWL_EQUIVALENT_CLASS, Direction::Both)
            .relationships(vocab::OWL_SAME_AS, Direction::Both)
            .relationships(vocab::RDFS_SUBCLASS_OF, Direction::Outgoing)
            .relationships(vocab::RDF_TYPE, Direction::Outgoing)
            .relationships(vocab::LOCATION, Direction::Outgoing)
            .relationships(vocab::BEGIN, Direction::Outgoing)
            .relationships(vocab::REFERENCE, Direction::Outgoing);

        let chromosome_classes = Self::chromosome_entailment(graph.as_ref());
        debug!("{} chromosome classes", chromosome_classes.len());

        Self {
            graph,
            description,
            chromosome_classes,
            cache: BoundedCache::new(cache_capacity),
        }
    }

    /// The chromosome class and all its subclasses; empty when the graph
    /// does not declare the class
    fn chromosome_entailment(graph: &dyn GraphSource) -> FxHashSet<NodeId> {
        let Some(root) = graph.node_by_iri(vocab::CHROMOSOME) else {
            return FxHashSet::default();
        };
        TraversalDescription::breadth_first()
            .relationships(vocab::RDFS_SUBCLASS_OF, Direction::Incoming)
            .traverse(graph, root)
            .map(|step| step.node)
            .collect()
    }

    fn find(&self, start: NodeId) -> Vec<NodeId> {
        let graph = self.graph.as_ref();
        let found = self.description.traverse(graph, start).filter_map(|step| {
            let edge = graph.edge(step.last_edge?)?;
            if edge.is_type(vocab::RDF_TYPE) && self.chromosome_classes.contains(&step.node) {
                Some(edge.other_end(step.node))
            } else {
                None
            }
        });
        dedup(found)
    }
}

impl SidecarResolver for ChromosomeOf {
    fn name(&self) -> &'static str {
        "chromosome"
    }

    fn resolve(&self, node: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.cache.get_or_try_insert_with(node, || Ok(self.find(node)))
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}
