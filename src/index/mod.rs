//! Search index output
//!
//! [`IndexClient`] is the seam to the index; [`SolrClient`] speaks the Solr
//! JSON update API and [`BatchWriter`] adds the batching, retry and commit
//! discipline on top of any client.

pub mod solr;
pub mod writer;

pub use solr::SolrClient;
pub use writer::BatchWriter;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// A document as sent to the index
pub type IndexDocument = Map<String, JsonValue>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index rejected the request: {0}")]
    Rejected(String),

    #[error("Upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type IndexResult<T> = Result<T, IndexError>;

#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Send documents; they become visible on the next commit
    async fn add_batch(&self, docs: &[IndexDocument]) -> IndexResult<()>;

    async fn commit(&self) -> IndexResult<()>;
}
