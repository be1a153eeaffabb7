//! Loader configuration
//!
//! One YAML file describes the graph to load from and how the run behaves:
//!
//! ```yaml
//! location: /data/graph
//! curies:
//!   MONDO: http://purl.obolibrary.org/obo/MONDO_
//! aggregation: rocksdb
//! index:
//!   request_timeout_secs: 3600
//! ```
//!
//! Every key is optional except `location` for commands that read a graph.

use crate::evidence::{AggregationBackend, EvidenceVocabulary};
use crate::sidecar::CrossReferenceQueries;
use crate::vocab;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Search index client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub connect_timeout_secs: u64,
    /// Must exceed the slowest expected commit
    pub request_timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 60,
            request_timeout_secs: 2 * 60 * 60,
        }
    }
}

impl IndexSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Graph snapshot directory
    pub location: Option<PathBuf>,
    /// Prefix -> IRI namespace, added to the standard rdf/rdfs/owl/dc prefixes
    pub curies: IndexMap<String, String>,
    /// IRI prefixes that mark anonymous nodes
    pub anonymous_prefixes: Vec<String>,
    pub closure_cache_capacity: usize,
    /// Per sidecar resolver
    pub sidecar_cache_capacity: usize,
    /// Documents per index add
    pub batch_size: usize,
    /// Concurrent queries; 0 means one per available core
    pub workers: usize,
    pub aggregation: AggregationBackend,
    pub index: IndexSettings,
    pub disease_query: Option<String>,
    pub phenotype_query: Option<String>,
    pub evidence: EvidenceVocabulary,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            location: None,
            curies: IndexMap::new(),
            anonymous_prefixes: vocab::DEFAULT_ANONYMOUS_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            closure_cache_capacity: 200_000,
            sidecar_cache_capacity: 100_000,
            batch_size: 10_000,
            workers: 0,
            aggregation: AggregationBackend::default(),
            index: IndexSettings::default(),
            disease_query: None,
            phenotype_query: None,
            evidence: EvidenceVocabulary::default(),
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let config: LoaderConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        if self.closure_cache_capacity == 0 || self.sidecar_cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache capacities must be positive".to_string()));
        }
        if self.index.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("index request timeout must be positive".to_string()));
        }
        if let Some((prefix, _)) = self.curies.iter().find(|(p, iri)| p.is_empty() || iri.is_empty()) {
            return Err(ConfigError::Invalid(format!("curie mapping `{}` is incomplete", prefix)));
        }
        Ok(())
    }

    /// Graph location, required by every command that reads the graph
    pub fn graph_location(&self) -> ConfigResult<&Path> {
        self.location
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("location is not set".to_string()))
    }

    /// Worker count with 0 resolved to the available parallelism
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Cross-reference queries with configured overrides applied
    pub fn cross_reference_queries(&self) -> CrossReferenceQueries {
        let mut queries = CrossReferenceQueries::default();
        if let Some(disease) = &self.disease_query {
            queries.disease = disease.clone();
        }
        if let Some(phenotype) = &self.phenotype_query {
            queries.phenotype = phenotype.clone();
        }
        queries
    }
}
