//! Run-scoped services
//!
//! Everything a worker needs to turn rows into documents, built once per run
//! and shared behind an `Arc`. The graph is read-only, the caches are
//! internally synchronised, so workers never coordinate through the context.

use crate::closure::ClosureEngine;
use crate::config::LoaderConfig;
use crate::curie::CurieResolver;
use crate::evidence::{AggregationBackend, EvidenceAspect};
use crate::graph::{GraphSnapshot, GraphSource, SnapshotResult};
use crate::sidecar::Sidecars;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RunContext {
    pub graph: Arc<dyn GraphSource>,
    pub curies: Arc<CurieResolver>,
    pub closures: ClosureEngine,
    pub sidecars: Sidecars,
    pub aspect: EvidenceAspect,
    pub aggregation: AggregationBackend,
}

impl RunContext {
    pub fn new(graph: Arc<dyn GraphSource>, config: &LoaderConfig) -> Self {
        let curies = Arc::new(CurieResolver::with_standard_prefixes(
            config.curies.iter().map(|(p, iri)| (p.clone(), iri.clone())),
        ));
        let closures = ClosureEngine::new(
            Arc::clone(&graph),
            Arc::clone(&curies),
            config.anonymous_prefixes.clone(),
            config.closure_cache_capacity,
        );
        let sidecars = Sidecars::build(
            Arc::clone(&graph),
            config.sidecar_cache_capacity,
            config.cross_reference_queries(),
        );

        Self {
            graph,
            curies,
            closures,
            sidecars,
            aspect: EvidenceAspect::new(config.evidence.clone()),
            aggregation: config.aggregation,
        }
    }

    /// Load the graph snapshot named by the configuration and build a context
    /// over it
    pub fn open(config: &LoaderConfig, location: &std::path::Path) -> SnapshotResult<Self> {
        let store = GraphSnapshot::open(location)?.load_store()?;
        info!(
            "Graph loaded: {} nodes, {} edges",
            store.node_count(),
            store.edge_count()
        );
        Ok(Self::new(Arc::new(store), config))
    }

    /// Log cache counters; called at the end of a run
    pub fn log_cache_stats(&self) {
        let stats = self.closures.cache_stats();
        debug!(
            "Closure cache: {} hits, {} misses, {} entries, {} traversals",
            stats.hits,
            stats.misses,
            stats.entries,
            self.closures.traversal_count()
        );
        for resolver in self.sidecars.cached() {
            if let Some(stats) = resolver.cache_stats() {
                debug!(
                    "{} cache: {} hits, {} misses, {} entries",
                    resolver.name(),
                    stats.hits,
                    stats.misses,
                    stats.entries
                );
            }
        }
    }
}
