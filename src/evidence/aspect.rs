//! Association pull-in
//!
//! A row usually binds a subject and an object but not the association node
//! that reifies the fact between them. Before evidence fields are derived,
//! every association that links two members of the subgraph is added,
//! together with its evidence, source and defining-resource relationships.

use super::graph::EvidenceGraph;
use crate::graph::{Direction, GraphSource};
use crate::vocab;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Predicates the aspect and the evidence fields key on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceVocabulary {
    pub has_subject: String,
    pub has_object: String,
    pub has_evidence: String,
    pub source: String,
    pub is_defined_by: String,
    /// Relationship property collected into `is_defined_by`
    pub defined_by_property: String,
}

impl Default for EvidenceVocabulary {
    fn default() -> Self {
        Self {
            has_subject: vocab::ASSOCIATION_HAS_SUBJECT.to_string(),
            has_object: vocab::ASSOCIATION_HAS_OBJECT.to_string(),
            has_evidence: vocab::HAS_EVIDENCE.to_string(),
            source: vocab::DC_SOURCE.to_string(),
            is_defined_by: vocab::RDFS_IS_DEFINED_BY.to_string(),
            defined_by_property: "isDefinedBy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvidenceAspect {
    vocabulary: EvidenceVocabulary,
}

impl EvidenceAspect {
    pub fn new(vocabulary: EvidenceVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &EvidenceVocabulary {
        &self.vocabulary
    }

    /// Add associations between members of `subgraph`. Returns how many
    /// association nodes were pulled in.
    pub fn invoke(&self, graph: &dyn GraphSource, subgraph: &mut EvidenceGraph) -> usize {
        let members: FxHashSet<_> = subgraph.nodes().collect();
        let vocabulary = &self.vocabulary;
        let mut pulled = 0;

        for member in members.iter().copied() {
            for subject_edge in graph.relationships(member, Direction::Incoming) {
                if !subject_edge.is_type(&vocabulary.has_subject) {
                    continue;
                }
                let association = subject_edge.source;
                let outgoing = graph.relationships(association, Direction::Outgoing);
                let object_edges: Vec<_> = outgoing
                    .iter()
                    .filter(|e| e.is_type(&vocabulary.has_object) && members.contains(&e.target))
                    .collect();
                if object_edges.is_empty() {
                    continue;
                }

                if subgraph.add_node(association) {
                    pulled += 1;
                }
                subgraph.add_edge(graph, subject_edge.id);
                for edge in object_edges {
                    subgraph.add_edge(graph, edge.id);
                }
                for edge in &outgoing {
                    if edge.is_type(&vocabulary.has_evidence)
                        || edge.is_type(&vocabulary.source)
                        || edge.is_type(&vocabulary.is_defined_by)
                    {
                        subgraph.add_edge(graph, edge.id);
                    }
                }
            }
        }
        pulled
    }
}
