//! RocksDB graph snapshots
//!
//! A snapshot directory holds one column family of nodes and one of edges,
//! bincode encoded and keyed by zero-padded hex handle so a scan returns them
//! in handle order. Loading a snapshot rebuilds an in-memory [`GraphStore`].

use super::{Edge, EdgeId, EdgeType, GraphError, GraphStore, Label, Node, NodeId, PropertyMap};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const NODES_CF: &str = "nodes";
const EDGES_CF: &str = "edges";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Column family error: {0}")]
    ColumnFamily(String),

    #[error("Snapshot is inconsistent: {0}")]
    Graph(#[from] GraphError),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    id: u64,
    labels: Vec<String>,
    properties: PropertyMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEdge {
    id: u64,
    source: u64,
    target: u64,
    edge_type: String,
    properties: PropertyMap,
}

pub struct GraphSnapshot {
    db: DB,
}

impl GraphSnapshot {
    /// Open or create a snapshot directory
    pub fn open(path: impl AsRef<Path>) -> SnapshotResult<Self> {
        let path = path.as_ref();
        info!("Opening graph snapshot at: {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(NODES_CF, Self::cf_options()),
            ColumnFamilyDescriptor::new(EDGES_CF, Self::cf_options()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    pub fn put_node(&self, node: &Node) -> SnapshotResult<()> {
        let cf = self
            .db
            .cf_handle(NODES_CF)
            .ok_or_else(|| SnapshotError::ColumnFamily(NODES_CF.to_string()))?;

        let stored = StoredNode {
            id: node.id.as_u64(),
            labels: node.labels.iter().map(|l| l.as_str().to_string()).collect(),
            properties: node.properties.clone(),
        };
        self.db.put_cf(&cf, Self::node_key(node.id.as_u64()), bincode::serialize(&stored)?)?;
        Ok(())
    }

    pub fn put_edge(&self, edge: &Edge) -> SnapshotResult<()> {
        let cf = self
            .db
            .cf_handle(EDGES_CF)
            .ok_or_else(|| SnapshotError::ColumnFamily(EDGES_CF.to_string()))?;

        let stored = StoredEdge {
            id: edge.id.as_u64(),
            source: edge.source.as_u64(),
            target: edge.target.as_u64(),
            edge_type: edge.edge_type.as_str().to_string(),
            properties: edge.properties.clone(),
        };
        self.db.put_cf(&cf, Self::edge_key(edge.id.as_u64()), bincode::serialize(&stored)?)?;
        Ok(())
    }

    /// Persist every node and edge of `store`
    pub fn write_store(&self, store: &GraphStore) -> SnapshotResult<()> {
        for node in store.all_nodes() {
            self.put_node(node)?;
        }
        for edge in store.all_edges() {
            self.put_edge(edge)?;
        }
        self.db.flush()?;
        info!(
            "Wrote snapshot with {} nodes and {} edges",
            store.node_count(),
            store.edge_count()
        );
        Ok(())
    }

    /// Rebuild an in-memory graph. Nodes are loaded before edges.
    pub fn load_store(&self) -> SnapshotResult<GraphStore> {
        let mut store = GraphStore::new();

        let cf = self
            .db
            .cf_handle(NODES_CF)
            .ok_or_else(|| SnapshotError::ColumnFamily(NODES_CF.to_string()))?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let stored: StoredNode = bincode::deserialize(&value)?;
            store.insert_recovered_node(Node::new_with_properties(
                NodeId::new(stored.id),
                stored.labels.into_iter().map(Label::new).collect(),
                stored.properties,
            ));
        }

        let cf = self
            .db
            .cf_handle(EDGES_CF)
            .ok_or_else(|| SnapshotError::ColumnFamily(EDGES_CF.to_string()))?;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let stored: StoredEdge = bincode::deserialize(&value)?;
            store.insert_recovered_edge(Edge::new_with_properties(
                EdgeId::new(stored.id),
                NodeId::new(stored.source),
                NodeId::new(stored.target),
                EdgeType::new(stored.edge_type),
                stored.properties,
            ))?;
        }

        debug!(
            "Loaded snapshot: {} nodes, {} edges",
            store.node_count(),
            store.edge_count()
        );
        Ok(store)
    }

    fn node_key(node_id: u64) -> Vec<u8> {
        format!("n:{:016x}", node_id).into_bytes()
    }

    fn edge_key(edge_id: u64) -> Vec<u8> {
        format!("e:{:016x}", edge_id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphSource;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_round_trip_preserves_handles() {
        let temp_dir = TempDir::new().unwrap();

        let mut store = GraphStore::new();
        let a = store.create_node("http://x.org/a");
        let b = store.create_node("http://x.org/b");
        store.add_label_to_node(a, "gene").unwrap();
        store.set_node_property(a, "label", "A").unwrap();
        let e = store.create_edge(a, b, "subClassOf").unwrap();

        {
            let snapshot = GraphSnapshot::open(temp_dir.path()).unwrap();
            snapshot.write_store(&store).unwrap();
        }

        let snapshot = GraphSnapshot::open(temp_dir.path()).unwrap();
        let loaded = snapshot.load_store().unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.edge_count(), 1);
        assert_eq!(loaded.node_by_iri("http://x.org/a"), Some(a));
        assert_eq!(loaded.nodes_with_label("gene"), vec![a]);
        assert_eq!(loaded.get_node(a).unwrap().first_label(), Some("A"));
        let edge = loaded.get_edge(e).unwrap();
        assert_eq!((edge.source, edge.target), (a, b));
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = GraphSnapshot::open(temp_dir.path()).unwrap();
        snapshot.put_node(&Node::new(NodeId::new(1), "http://x.org/a")).unwrap();
        snapshot
            .put_edge(&Edge::new(EdgeId::new(1), NodeId::new(1), NodeId::new(9), "p"))
            .unwrap();

        assert!(matches!(
            snapshot.load_store(),
            Err(SnapshotError::Graph(GraphError::InvalidEdgeTarget(_)))
        ));
    }
}
