//! Sidecar resolvers
//!
//! Single-purpose lookups attached to subject, object and feature fields:
//! taxon, chromosome, gene, orthologs and the disease/phenotype
//! cross-references. They are built once per run; the traversal resolvers
//! each keep their own LRU cache keyed by start node.

pub mod chromosome;
pub mod gene;
pub mod ortholog;
pub mod taxon;
pub mod xref;

pub use chromosome::ChromosomeOf;
pub use gene::GeneOf;
pub use ortholog::OrthologOf;
pub use taxon::TaxonOf;
pub use xref::{CrossReferenceQueries, CrossReferences};

use crate::cache::CacheStats;
use crate::graph::{GraphSource, NodeId};
use crate::query::QueryError;
use crate::vocab;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Cross-reference query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Cross-reference query has no `{0}` column")]
    MissingColumn(String),
}

pub type SidecarResult<T> = Result<T, SidecarError>;

/// An auxiliary lookup from one entity to related entities
pub trait SidecarResolver: Send + Sync {
    /// Field stem the result is written under
    fn name(&self) -> &'static str;

    fn resolve(&self, node: NodeId) -> SidecarResult<Vec<NodeId>>;

    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Relationship type families expanded through sub-property declarations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntailedTypes {
    pub part_of: Vec<String>,
    pub has_part: Vec<String>,
    pub subsequence_of: Vec<String>,
    pub variant: Vec<String>,
}

impl EntailedTypes {
    /// Resolve every family against the graph. Each call is a graph walk, so
    /// this runs once per pipeline.
    pub fn resolve(graph: &dyn GraphSource) -> Self {
        Self {
            part_of: graph.entailed_relationship_types(vocab::PART_OF),
            has_part: graph.entailed_relationship_types(vocab::HAS_PART),
            subsequence_of: graph.entailed_relationship_types(vocab::SUBSEQUENCE_OF),
            variant: graph.entailed_relationship_types(vocab::IS_VARIANT_OF),
        }
    }
}

/// All sidecars for one run
pub struct Sidecars {
    pub taxon: TaxonOf,
    pub chromosome: ChromosomeOf,
    pub gene: GeneOf,
    pub ortholog: OrthologOf,
    pub cross_references: CrossReferences,
}

impl Sidecars {
    pub fn build(graph: Arc<dyn GraphSource>, cache_capacity: usize, queries: CrossReferenceQueries) -> Self {
        let entailed = EntailedTypes::resolve(graph.as_ref());
        debug!(
            "Entailed types: {} part-of, {} has-part, {} subsequence-of, {} variant",
            entailed.part_of.len(),
            entailed.has_part.len(),
            entailed.subsequence_of.len(),
            entailed.variant.len()
        );

        Self {
            taxon: TaxonOf::new(Arc::clone(&graph), &entailed, cache_capacity),
            chromosome: ChromosomeOf::new(Arc::clone(&graph), cache_capacity),
            gene: GeneOf::new(Arc::clone(&graph), &entailed, cache_capacity),
            ortholog: OrthologOf::new(Arc::clone(&graph), cache_capacity),
            cross_references: CrossReferences::new(graph, queries),
        }
    }

    /// Traversal resolvers, for cache reporting
    pub fn cached(&self) -> [&dyn SidecarResolver; 4] {
        [&self.taxon, &self.chromosome, &self.gene, &self.ortholog]
    }
}

/// Drop repeated handles, keeping first-seen order
pub(crate) fn dedup(nodes: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
    let mut seen = FxHashSet::default();
    nodes.into_iter().filter(|n| seen.insert(*n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;

    #[test]
    fn test_entailed_types_follow_sub_properties() {
        let mut store = GraphStore::new();
        let part_of = store.create_node(vocab::PART_OF);
        let sub = store.create_node("http://x.org/member_of");
        let subsub = store.create_node("http://x.org/strict_member_of");
        store.create_edge(sub, part_of, vocab::RDFS_SUB_PROPERTY_OF).unwrap();
        store.create_edge(subsub, sub, vocab::RDFS_SUB_PROPERTY_OF).unwrap();

        let entailed = EntailedTypes::resolve(&store);
        assert_eq!(
            entailed.part_of,
            vec![vocab::PART_OF, "http://x.org/member_of", "http://x.org/strict_member_of"]
        );
        assert_eq!(entailed.variant, vec![vocab::IS_VARIANT_OF]);
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let ids = [3, 1, 3, 2, 1].map(NodeId::new);
        assert_eq!(dedup(ids), vec![NodeId::new(3), NodeId::new(1), NodeId::new(2)]);
    }
}
