//! Read-only pattern queries over a [`GraphSource`]
//!
//! A deliberately small subset of the usual graph pattern language:
//! `MATCH` with labels, typed/directed/variable-length relationships and path
//! binding, `WHERE` equality conjunctions, and `RETURN` with aliases,
//! `DISTINCT`, `LIMIT` and `*`.

pub mod ast;
pub mod executor;
pub mod parser;
pub mod value;

pub use ast::PatternQuery;
pub use executor::QueryExecutor;
pub use parser::{parse_query, ParseError, ParseResult};
pub use value::{GraphPath, Params, Row, RowSink, Value};

use crate::graph::GraphSource;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Missing parameter: ${0}")]
    MissingParameter(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Parse and run `text` against `graph`, collecting every row
pub fn execute(graph: &dyn GraphSource, text: &str, params: &Params) -> QueryResult<Vec<Row>> {
    let query = parse_query(text)?;
    let mut rows = Vec::new();
    QueryExecutor::new(graph, &query, params, &mut |row| {
        rows.push(row);
        ControlFlow::Continue(())
    })
    .execute()?;
    Ok(rows)
}

/// Parsed queries keyed by text. Auxiliary queries run once per feature node,
/// so parsing them every time would dominate.
pub struct QueryCache {
    parsed: Mutex<LruCache<String, Arc<PatternQuery>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            parsed: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn parse(&self, text: &str) -> QueryResult<Arc<PatternQuery>> {
        if let Some(query) = self.lock().get(text) {
            return Ok(Arc::clone(query));
        }
        let query = Arc::new(parse_query(text)?);
        self.lock().put(text.to_string(), Arc::clone(&query));
        Ok(query)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<PatternQuery>>> {
        self.parsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(64)
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.lock().len())
            .finish()
    }
}
