//! Pair-keyed aggregation of query rows
//!
//! Rows describing the same (subject, object) fact are folded into one
//! pending document. The first row for a key fixes the document and the
//! `emit_evidence` flag; later rows only widen the evidence subgraph and the
//! ignored set.

use super::graph::EvidenceGraph;
use super::store::{KeyedStore, MemoryStore, RocksStore, StoreResult};
use crate::document::OutputDocument;
use crate::graph::{GraphSource, NodeId, PropertyValue};
use crate::query::{Row, Value};
use crate::vocab::category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const SUBJECT_CATEGORY: &str = "subject_category";
pub const OBJECT_CATEGORY: &str = "object_category";

/// Logical identity of a fact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvidenceKey {
    pub subject: String,
    pub object: String,
}

impl EvidenceKey {
    pub fn new(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for EvidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.subject, self.object)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub subgraph: EvidenceGraph,
    /// Entities already written as first-class fields
    pub ignored: BTreeSet<NodeId>,
    pub emit_evidence: bool,
}

impl Default for EvidenceBundle {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EvidenceBundle {
    pub fn new(emit_evidence: bool) -> Self {
        Self {
            subgraph: EvidenceGraph::new(),
            ignored: BTreeSet::new(),
            emit_evidence,
        }
    }

    /// Bundle for one row. Every graph element in the row joins the
    /// subgraph; nodes in `projected` columns are ignored for evidence.
    pub fn from_row(graph: &dyn GraphSource, row: &Row, projected: &[String]) -> Self {
        let mut bundle = Self::new(emits_evidence(row));
        for (column, value) in row {
            bundle.subgraph.add_value(graph, value);
            if let Value::Node(id) = value {
                if projected.iter().any(|p| p == column) {
                    bundle.ignored.insert(*id);
                }
            }
        }
        bundle
    }

    /// Union subgraph and ignored set. `emit_evidence` keeps its value.
    pub fn merge(&mut self, other: &EvidenceBundle) {
        self.subgraph.merge(&other.subgraph);
        self.ignored.extend(other.ignored.iter().copied());
    }
}

/// False only for class-to-class facts: both categories are `ontology`
pub fn emits_evidence(row: &Row) -> bool {
    let is_ontology = |column: &str| {
        matches!(
            row.get(column),
            Some(Value::Property(PropertyValue::String(s))) if s == category::ONTOLOGY
        )
    };
    !(is_ontology(SUBJECT_CATEGORY) && is_ontology(OBJECT_CATEGORY))
}

/// A document waiting for its evidence fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFact {
    pub document: OutputDocument,
    pub bundle: EvidenceBundle,
}

#[derive(Debug, PartialEq)]
pub enum Observation {
    /// No key: the fact is complete and bypasses aggregation
    Emit(PendingFact),
    /// First row for its key
    Buffered,
    /// Folded into an earlier row's bundle
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationBackend {
    #[default]
    Rocksdb,
    Memory,
}

pub struct EvidenceAccumulator {
    store: Box<dyn KeyedStore<EvidenceKey, PendingFact>>,
    rows: u64,
}

impl EvidenceAccumulator {
    pub fn new(backend: AggregationBackend) -> StoreResult<Self> {
        let store: Box<dyn KeyedStore<EvidenceKey, PendingFact>> = match backend {
            AggregationBackend::Memory => Box::new(MemoryStore::new()),
            AggregationBackend::Rocksdb => Box::new(RocksStore::open_temporary()?),
        };
        Ok(Self::with_store(store))
    }

    pub fn with_store(store: Box<dyn KeyedStore<EvidenceKey, PendingFact>>) -> Self {
        Self { store, rows: 0 }
    }

    /// Fold one row in. `make_document` runs only when the row opens a new
    /// fact, so repeated rows never pay for assembly.
    pub fn observe<F>(&mut self, key: Option<EvidenceKey>, bundle: EvidenceBundle, make_document: F) -> StoreResult<Observation>
    where
        F: FnOnce() -> OutputDocument,
    {
        self.rows += 1;
        let Some(key) = key else {
            return Ok(Observation::Emit(PendingFact {
                document: make_document(),
                bundle,
            }));
        };

        match self.store.get(&key)? {
            Some(mut pending) => {
                pending.bundle.merge(&bundle);
                self.store.put(key, pending)?;
                Ok(Observation::Merged)
            }
            None => {
                let pending = PendingFact {
                    document: make_document(),
                    bundle,
                };
                self.store.put(key, pending)?;
                Ok(Observation::Buffered)
            }
        }
    }

    pub fn get(&self, key: &EvidenceKey) -> StoreResult<Option<PendingFact>> {
        self.store.get(key)
    }

    /// Buffered facts, first-seen key first
    pub fn pending(&self) -> Box<dyn Iterator<Item = StoreResult<(EvidenceKey, PendingFact)>> + '_> {
        self.store.entries()
    }

    pub fn key_count(&self) -> usize {
        self.store.len()
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;

    struct Fixture {
        store: GraphStore,
        x: NodeId,
        y: NodeId,
        e1: NodeId,
        e2: NodeId,
    }

    fn fixture() -> Fixture {
        let mut store = GraphStore::new();
        let x = store.create_node("http://x.org/X");
        let y = store.create_node("http://x.org/Y");
        let e1 = store.create_node("http://x.org/E1");
        let e2 = store.create_node("http://x.org/E2");
        Fixture { store, x, y, e1, e2 }
    }

    fn row(pairs: Vec<(&str, Value)>) -> Row {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn projected() -> Vec<String> {
        vec!["subject".to_string(), "object".to_string()]
    }

    #[test]
    fn test_row_bundle() {
        let f = fixture();
        let r = row(vec![
            ("subject", Value::Node(f.x)),
            ("object", Value::Node(f.y)),
            ("e", Value::Node(f.e1)),
            ("note", Value::Property("text".into())),
        ]);
        let bundle = EvidenceBundle::from_row(&f.store, &r, &projected());
        assert_eq!(bundle.subgraph.node_count(), 3);
        assert_eq!(bundle.ignored, BTreeSet::from([f.x, f.y]));
        assert!(bundle.emit_evidence);
    }

    #[test]
    fn test_ontology_pairs_do_not_emit_evidence() {
        let both = row(vec![
            (SUBJECT_CATEGORY, Value::Property("ontology".into())),
            (OBJECT_CATEGORY, Value::Property("ontology".into())),
        ]);
        assert!(!emits_evidence(&both));

        let one = row(vec![
            (SUBJECT_CATEGORY, Value::Property("ontology".into())),
            (OBJECT_CATEGORY, Value::Property("gene".into())),
        ]);
        assert!(emits_evidence(&one));
        assert!(emits_evidence(&Row::new()));
    }

    fn merge_rows(backend: AggregationBackend) {
        let f = fixture();
        let mut accumulator = EvidenceAccumulator::new(backend).unwrap();
        let key = EvidenceKey::new("X:X", "X:Y");

        let first = row(vec![
            ("subject", Value::Node(f.x)),
            ("object", Value::Node(f.y)),
            ("e", Value::Node(f.e1)),
        ]);
        let second = row(vec![
            ("subject", Value::Node(f.x)),
            ("object", Value::Node(f.y)),
            ("e", Value::Node(f.e2)),
            (SUBJECT_CATEGORY, Value::Property("ontology".into())),
            (OBJECT_CATEGORY, Value::Property("ontology".into())),
        ]);

        let mut assembled = 0;
        let mut make = || {
            assembled += 1;
            OutputDocument::new()
        };
        let observed = accumulator
            .observe(Some(key.clone()), EvidenceBundle::from_row(&f.store, &first, &projected()), &mut make)
            .unwrap();
        assert_eq!(observed, Observation::Buffered);
        let observed = accumulator
            .observe(Some(key.clone()), EvidenceBundle::from_row(&f.store, &second, &projected()), &mut make)
            .unwrap();
        assert_eq!(observed, Observation::Merged);
        assert_eq!(assembled, 1);

        let pending = accumulator.get(&key).unwrap().unwrap();
        // union, not sum: X and Y are shared
        assert_eq!(pending.bundle.subgraph.node_count(), 4);
        assert!(pending.bundle.subgraph.contains_node(f.e1));
        assert!(pending.bundle.subgraph.contains_node(f.e2));
        // fixed by the first row
        assert!(pending.bundle.emit_evidence);
        assert_eq!(accumulator.key_count(), 1);
        assert_eq!(accumulator.row_count(), 2);
    }

    #[test]
    fn test_merge_in_memory() {
        merge_rows(AggregationBackend::Memory);
    }

    #[test]
    fn test_merge_on_disk() {
        merge_rows(AggregationBackend::Rocksdb);
    }

    #[test]
    fn test_keyless_rows_bypass_the_store() {
        let mut accumulator = EvidenceAccumulator::new(AggregationBackend::Memory).unwrap();
        let observed = accumulator
            .observe(None, EvidenceBundle::default(), OutputDocument::new)
            .unwrap();
        assert!(matches!(observed, Observation::Emit(_)));
        assert_eq!(accumulator.key_count(), 0);
    }

    #[test]
    fn test_pending_in_discovery_order() {
        let mut accumulator = EvidenceAccumulator::new(AggregationBackend::Rocksdb).unwrap();
        for (s, o) in [("B", "1"), ("A", "2"), ("B", "1"), ("C", "3")] {
            accumulator
                .observe(Some(EvidenceKey::new(s, o)), EvidenceBundle::default(), OutputDocument::new)
                .unwrap();
        }
        let keys: Vec<String> = accumulator
            .pending()
            .map(|entry| entry.unwrap().0.subject)
            .collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }
}
