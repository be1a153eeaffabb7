//! Dry run of query files against the graph
//!
//! Every query is executed and its rows counted; nothing is assembled or
//! written. Used to catch broken queries before a long load.

use crate::document::QuerySpec;
use crate::graph::GraphSource;
use crate::query::Params;
use std::ops::ControlFlow;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub name: String,
    /// Row count, or the error the query failed with
    pub result: Result<usize, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.name.as_str())
            .collect()
    }
}

pub struct QueryCheck<'a> {
    graph: &'a dyn GraphSource,
}

impl<'a> QueryCheck<'a> {
    pub fn new(graph: &'a dyn GraphSource) -> Self {
        Self { graph }
    }

    pub fn run(&self, queries: &[(String, QuerySpec)]) -> CheckReport {
        let outcomes = queries
            .iter()
            .map(|(name, spec)| {
                let result = self
                    .graph
                    .execute_each(&spec.query, &Params::new(), &mut |_| ControlFlow::Continue(()))
                    .map_err(|e| e.to_string());
                match &result {
                    Ok(rows) => info!("Query {}: {} rows", name, rows),
                    Err(e) => error!("Query {} failed: {}", name, e),
                }
                CheckOutcome {
                    name: name.clone(),
                    result,
                }
            })
            .collect();
        CheckReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::vocab;

    #[test]
    fn test_failing_queries_are_reported() {
        let mut store = GraphStore::new();
        let a = store.create_node("http://x.org/A");
        let b = store.create_node("http://x.org/B");
        store.create_edge(a, b, vocab::RDFS_SUBCLASS_OF).unwrap();

        let queries = vec![
            ("edges".to_string(), QuerySpec::new("MATCH (s)-[r]->(o) RETURN s AS subject, o AS object")),
            ("broken".to_string(), QuerySpec::new("MATCH (s RETURN s")),
            ("nodes".to_string(), QuerySpec::new("MATCH (n) RETURN n AS feature")),
        ];
        let report = QueryCheck::new(&store).run(&queries);

        assert!(!report.is_success());
        assert_eq!(report.failed(), vec!["broken"]);
        assert_eq!(report.outcomes[0].result, Ok(1));
        assert_eq!(report.outcomes[2].result, Ok(2));
    }

    #[test]
    fn test_empty_check_succeeds() {
        let report = QueryCheck::new(&GraphStore::new()).run(&[]);
        assert!(report.is_success());
        assert!(report.failed().is_empty());
    }
}
