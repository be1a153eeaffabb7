//! Read-only property graph
//!
//! Nodes carry an `iri` property and category labels, relationships are typed
//! by predicate IRI. [`GraphStore`] is the in-memory implementation of
//! [`GraphSource`]; [`snapshot::GraphSnapshot`] persists it to RocksDB.

pub mod edge;
pub mod node;
pub mod property;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod types;

pub use edge::Edge;
pub use node::Node;
pub use property::{keys, PropertyMap, PropertyValue};
pub use snapshot::{GraphSnapshot, SnapshotError, SnapshotResult};
pub use source::GraphSource;
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{Direction, EdgeId, EdgeType, Label, NodeId};
