//! Evidence subgraphs and their pair-keyed aggregation

pub mod accumulator;
pub mod aspect;
pub mod graph;
pub mod store;

pub use accumulator::{
    emits_evidence, AggregationBackend, EvidenceAccumulator, EvidenceBundle, EvidenceKey, Observation, PendingFact,
};
pub use aspect::{EvidenceAspect, EvidenceVocabulary};
pub use graph::EvidenceGraph;
pub use store::{KeyedStore, MemoryStore, RocksStore, StoreError, StoreResult};
