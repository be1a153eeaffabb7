//! Concurrent query pipeline
//!
//! Each query file runs on its own blocking task, bounded by a semaphore of
//! `workers` permits. A task writes its documents to `<output>/<query>.json`
//! and, when an index is configured, uploads that file through the shared
//! [`BatchWriter`]. A failing query is logged and reported; the others carry
//! on.

pub mod loader;

pub use loader::{JsonArrayWriter, QueryLoader};

use crate::context::RunContext;
use crate::document::{PlanError, QueryPlan, QuerySpec};
use crate::evidence::StoreError;
use crate::index::{BatchWriter, IndexError};
use crate::query::QueryError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Upper bound on a whole run
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(10 * 24 * 60 * 60);

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Query {query} failed after {documents} documents: {source}")]
    InQuery {
        query: String,
        documents: usize,
        #[source]
        source: Box<LoaderError>,
    },

    #[error("Invalid query: {0}")]
    Plan(#[from] PlanError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Aggregation store error: {0}")]
    Store(#[from] StoreError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),
}

pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    /// Attach the query name and the number of documents written so far
    pub fn in_query(self, query: impl Into<String>, documents: usize) -> Self {
        match self {
            already @ LoaderError::InQuery { .. } => already,
            source => LoaderError::InQuery {
                query: query.into(),
                documents,
                source: Box::new(source),
            },
        }
    }
}

/// Query files in `dir` (`*.yaml` / `*.yml`), named by file stem, sorted by name
pub fn load_queries(dir: &Path) -> LoaderResult<Vec<(String, QuerySpec)>> {
    let mut queries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if !is_yaml {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let spec = QuerySpec::from_file(&path).map_err(|e| LoaderError::from(e).in_query(name, 0))?;
        queries.push((name.to_string(), spec));
    }
    queries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(queries)
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Where generated files go; a temporary directory when unset
    pub output_dir: Option<PathBuf>,
    pub workers: usize,
    /// Remove generated files once uploaded
    pub delete_json: bool,
    pub timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            workers: 1,
            delete_json: false,
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

/// What happened to one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub name: String,
    pub documents: usize,
    pub file: Option<PathBuf>,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub outcomes: Vec<QueryOutcome>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(QueryOutcome::is_success)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn total_documents(&self) -> usize {
        self.outcomes.iter().map(|o| o.documents).sum()
    }

    pub fn outcome(&self, name: &str) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    writer: Option<Arc<BatchWriter>>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, writer: Option<Arc<BatchWriter>>) -> Self {
        Self { options, writer }
    }

    /// Run every query; the report lists outcomes in query order
    pub async fn run(&self, ctx: Arc<RunContext>, queries: Vec<(String, QuerySpec)>) -> LoaderResult<PipelineReport> {
        let (output_dir, _scratch) = self.output_dir()?;
        let names: Vec<String> = queries.iter().map(|(name, _)| name.clone()).collect();
        info!("Running {} queries with {} workers", queries.len(), self.options.workers);

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut tasks = JoinSet::new();
        for (name, spec) in queries {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let writer = self.writer.clone();
            let path = output_dir.join(format!("{}.json", name));
            let delete_json = self.options.delete_json;
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_query(ctx, &name, spec, &path, writer, delete_json).await,
                    Err(e) => Err(LoaderError::Worker(e.to_string())),
                };
                outcome(name, path, result)
            });
        }

        let mut outcomes = Vec::new();
        let collect = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => error!("Worker task failed: {}", e),
                }
            }
        };
        let timed_out = tokio::time::timeout(self.options.timeout, collect).await.is_err();
        if timed_out {
            warn!("Run timed out after {:?}", self.options.timeout);
            tasks.abort_all();
        }

        let mut report = PipelineReport::default();
        for name in names {
            let outcome = match outcomes.iter().position(|o| o.name == name) {
                Some(i) => outcomes.swap_remove(i),
                None => QueryOutcome {
                    error: Some(if timed_out {
                        LoaderError::Timeout(self.options.timeout).to_string()
                    } else {
                        LoaderError::Worker("task did not complete".to_string()).to_string()
                    }),
                    name,
                    documents: 0,
                    file: None,
                },
            };
            report.outcomes.push(outcome);
        }
        ctx.log_cache_stats();
        info!(
            "Run finished: {} documents, {} failed queries",
            report.total_documents(),
            report.failed().len()
        );
        Ok(report)
    }

    /// Upload every generated file already in the output directory
    pub async fn upload_only(&self) -> LoaderResult<PipelineReport> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| LoaderError::Worker("upload requested without an index".to_string()))?;
        let dir = self
            .options
            .output_dir
            .as_ref()
            .ok_or_else(|| LoaderError::Worker("upload requested without an output directory".to_string()))?;

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();

        let mut report = PipelineReport::default();
        for path in files {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let result = upload(writer, &path, self.options.delete_json).await;
            report.outcomes.push(outcome(name, path, result));
        }
        Ok(report)
    }

    /// The configured output directory, or a scratch one that lives as long
    /// as the returned guard
    fn output_dir(&self) -> LoaderResult<(PathBuf, Option<TempDir>)> {
        match &self.options.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok((dir.clone(), None))
            }
            None => {
                let scratch = tempfile::Builder::new().prefix("golr-output").tempdir()?;
                Ok((scratch.path().to_path_buf(), Some(scratch)))
            }
        }
    }
}

async fn run_query(
    ctx: Arc<RunContext>,
    name: &str,
    spec: QuerySpec,
    path: &Path,
    writer: Option<Arc<BatchWriter>>,
    delete_json: bool,
) -> LoaderResult<usize> {
    info!("Query {} started", name);
    let task_name = name.to_string();
    let task_path = path.to_path_buf();
    let documents = tokio::task::spawn_blocking(move || {
        let plan = QueryPlan::new(task_name.as_str(), &spec, &ctx.curies)
            .map_err(|e| LoaderError::from(e).in_query(task_name.as_str(), 0))?;
        QueryLoader::new(&ctx, &plan).load_to_file(&task_path)
    })
    .await
    .map_err(|e| LoaderError::Worker(e.to_string()).in_query(name, 0))??;

    if let Some(writer) = writer {
        upload(&writer, path, delete_json)
            .await
            .map_err(|e| e.in_query(name, documents))?;
    }
    Ok(documents)
}

async fn upload(writer: &BatchWriter, path: &Path, delete_json: bool) -> LoaderResult<usize> {
    let count = writer.upload_file(path).await?;
    if delete_json {
        tokio::fs::remove_file(path).await?;
    }
    Ok(count)
}

fn outcome(name: String, path: PathBuf, result: LoaderResult<usize>) -> QueryOutcome {
    match result {
        Ok(documents) => {
            info!("Query {} finished with {} documents", name, documents);
            QueryOutcome {
                name,
                documents,
                file: Some(path),
                error: None,
            }
        }
        Err(e) => {
            error!("{}", e);
            let documents = match &e {
                LoaderError::InQuery { documents, .. } => *documents,
                _ => 0,
            };
            QueryOutcome {
                name,
                documents,
                file: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_is_attached_once() {
        let err = LoaderError::Worker("boom".to_string())
            .in_query("q1", 7)
            .in_query("outer", 0);
        assert_eq!(err.to_string(), "Query q1 failed after 7 documents: Worker error: boom");
    }

    #[test]
    fn test_load_queries_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "query: MATCH (n) RETURN n AS feature\n").unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "query: MATCH (s)-->(o) RETURN s AS subject, o AS object\nsubject_closure: rdfs:subClassOf\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let queries = load_queries(dir.path()).unwrap();
        let names: Vec<&str> = queries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(queries[0].1.subject_closure.as_deref(), Some("rdfs:subClassOf"));
    }

    #[test]
    fn test_bad_query_file_is_named() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "query: [unclosed").unwrap();
        let err = load_queries(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("Query bad failed"));
    }

    #[test]
    fn test_report() {
        let report = PipelineReport {
            outcomes: vec![
                QueryOutcome {
                    name: "a".to_string(),
                    documents: 3,
                    file: None,
                    error: None,
                },
                QueryOutcome {
                    name: "b".to_string(),
                    documents: 1,
                    file: None,
                    error: Some("boom".to_string()),
                },
            ],
        };
        assert!(!report.is_success());
        assert_eq!(report.failed(), vec!["b"]);
        assert_eq!(report.total_documents(), 4);
        assert!(report.outcome("a").is_some_and(QueryOutcome::is_success));
    }
}
