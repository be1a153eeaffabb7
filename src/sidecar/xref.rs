//! Disease and phenotype cross-references for feature fields.
//!
//! These are not traversals: each lookup runs a parameterised query with
//! `$id` bound to the feature node and collects one column. Nothing is
//! cached here.

use super::{dedup, SidecarError, SidecarResult};
use crate::graph::{GraphSource, NodeId};
use crate::query::{Params, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DISEASE_COLUMN: &str = "disease";
pub const PHENOTYPE_COLUMN: &str = "phenotype";

/// Query texts. Each must bind `$id` and return its own column
/// (`disease` or `phenotype`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossReferenceQueries {
    pub disease: String,
    pub phenotype: String,
}

impl Default for CrossReferenceQueries {
    fn default() -> Self {
        Self {
            disease: "MATCH (feature)-[:`http://purl.obolibrary.org/obo/RO_0003302`]->(disease:disease) \
                      WHERE id(feature) = $id RETURN DISTINCT disease"
                .to_string(),
            phenotype: "MATCH (feature)-[:`http://purl.obolibrary.org/obo/RO_0002200`]->(phenotype:phenotype) \
                        WHERE id(feature) = $id RETURN DISTINCT phenotype"
                .to_string(),
        }
    }
}

pub struct CrossReferences {
    graph: Arc<dyn GraphSource>,
    queries: CrossReferenceQueries,
}

impl CrossReferences {
    pub fn new(graph: Arc<dyn GraphSource>, queries: CrossReferenceQueries) -> Self {
        Self { graph, queries }
    }

    pub fn diseases(&self, feature: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.collect(&self.queries.disease, feature, DISEASE_COLUMN)
    }

    pub fn phenotypes(&self, feature: NodeId) -> SidecarResult<Vec<NodeId>> {
        self.collect(&self.queries.phenotype, feature, PHENOTYPE_COLUMN)
    }

    fn collect(&self, query: &str, feature: NodeId, column: &str) -> SidecarResult<Vec<NodeId>> {
        let mut params = Params::new();
        params.insert("id".to_string(), Value::Node(feature));

        let rows = self.graph.execute(query, &params)?;
        let mut nodes = Vec::with_capacity(rows.len());
        for row in &rows {
            let value = row
                .get(column)
                .ok_or_else(|| SidecarError::MissingColumn(column.to_string()))?;
            if let Some(node) = value.as_node() {
                nodes.push(node);
            }
        }
        Ok(dedup(nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::vocab::{self, category};

    fn fixture() -> (Arc<dyn GraphSource>, NodeId, NodeId, NodeId) {
        let mut store = GraphStore::new();
        let feature = store.create_node("http://x.org/gene");
        let phenotype = store.create_node("http://x.org/HP_1");
        let disease = store.create_node("http://x.org/MONDO_1");
        let other = store.create_node("http://x.org/HP_2");
        store.add_label_to_node(phenotype, category::PHENOTYPE).unwrap();
        store.add_label_to_node(disease, "disease").unwrap();
        store.create_edge(feature, phenotype, vocab::HAS_PHENOTYPE).unwrap();
        store.create_edge(feature, disease, "http://purl.obolibrary.org/obo/RO_0003302").unwrap();
        // not a phenotype node
        store.create_edge(feature, other, vocab::HAS_PHENOTYPE).unwrap();
        (Arc::new(store), feature, phenotype, disease)
    }

    #[test]
    fn test_default_queries() {
        let (graph, feature, phenotype, disease) = fixture();
        let xrefs = CrossReferences::new(graph, CrossReferenceQueries::default());
        assert_eq!(xrefs.phenotypes(feature).unwrap(), vec![phenotype]);
        assert_eq!(xrefs.diseases(feature).unwrap(), vec![disease]);
        assert!(xrefs.diseases(phenotype).unwrap().is_empty());
    }

    #[test]
    fn test_query_errors_surface() {
        let (graph, feature, ..) = fixture();
        let broken = CrossReferenceQueries {
            disease: "MATCH (feature WHERE".to_string(),
            phenotype: "MATCH (feature)-->(x) WHERE id(feature) = $id RETURN x".to_string(),
        };
        let xrefs = CrossReferences::new(graph, broken);
        assert!(matches!(xrefs.diseases(feature), Err(SidecarError::Query(_))));
        assert!(matches!(
            xrefs.phenotypes(feature),
            Err(SidecarError::MissingColumn(column)) if column == "phenotype"
        ));
    }
}
