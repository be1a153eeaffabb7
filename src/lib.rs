//! GOlr Loader
//!
//! Turns a read-only ontology property graph into flat search-index
//! documents. Each query file selects rows from the graph; every entity in a
//! row is expanded into its closure over typed relationships, enriched with
//! taxon, gene, chromosome and ortholog sidecars, and rows describing the same
//! subject/object pair are folded into one document carrying the evidence
//! subgraph behind the association.
//!
//! # Layout
//!
//! - [`graph`]: property graph model, in-memory store and RocksDB snapshots
//! - [`query`]: pattern query language run against the graph
//! - [`closure`]: traversals and cached closures
//! - [`sidecar`]: taxon, chromosome, gene, ortholog and cross-reference lookups
//! - [`evidence`]: evidence subgraphs and per-pair aggregation
//! - [`document`]: query plans and row-to-document assembly
//! - [`pipeline`]: concurrent query runs and generated files
//! - [`index`]: Solr client and batched writer
//! - [`entity`]: per-entity documents for clique leaders
//! - [`check`]: dry runs of query files
//!
//! ## Example
//!
//! ```rust
//! use golr_loader::closure::RelationshipSet;
//! use golr_loader::config::LoaderConfig;
//! use golr_loader::context::RunContext;
//! use golr_loader::graph::GraphStore;
//! use golr_loader::vocab;
//! use std::sync::Arc;
//!
//! let mut store = GraphStore::new();
//! let dog = store.create_node("http://x.org/dog");
//! let mammal = store.create_node("http://x.org/mammal");
//! store.create_edge(dog, mammal, vocab::RDFS_SUBCLASS_OF).unwrap();
//!
//! let mut config = LoaderConfig::default();
//! config.curies.insert("X".to_string(), "http://x.org/".to_string());
//! let ctx = RunContext::new(Arc::new(store), &config);
//!
//! let closure = ctx.closures.closure(dog, &RelationshipSet::default_closure_types()).unwrap();
//! assert_eq!(closure.curies, vec!["X:dog", "X:mammal"]);
//! ```

pub mod cache;
pub mod check;
pub mod closure;
pub mod config;
pub mod context;
pub mod curie;
pub mod document;
pub mod entity;
pub mod evidence;
pub mod graph;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod sidecar;
pub mod vocab;

pub use config::LoaderConfig;
pub use context::RunContext;
pub use graph::{GraphSource, GraphStore};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
