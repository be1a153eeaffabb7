//! Row to document assembly
//!
//! Every projected entity becomes an identifier quint:
//!
//! | field                  | value                                  |
//! |------------------------|----------------------------------------|
//! | `<f>`                  | id (curie, else IRI)                   |
//! | `<f>_label`            | primary label                          |
//! | `<f>_closure`          | closure ids                            |
//! | `<f>_closure_label`    | closure labels                         |
//! | `<f>_closure_map`      | JSON object id -> label                |
//!
//! Sidecar and evidence fields use the same five suffixes with array
//! values, since they may resolve to several entities.

use super::plan::{FieldRole, QueryPlan, EVIDENCE, OBJECT, SUBJECT};
use super::{OutputDocument, CLOSURE_LABEL_SUFFIX, CLOSURE_MAP_SUFFIX, CLOSURE_SUFFIX, LABEL_SUFFIX};
use crate::closure::{Closure, RelationshipSet};
use crate::context::RunContext;
use crate::evidence::{EvidenceBundle, EvidenceGraph, EvidenceKey, PendingFact};
use crate::graph::{EdgeId, NodeId, PropertyValue};
use crate::query::{Row, Value};
use crate::sidecar::{dedup, SidecarResolver, SidecarResult};
use crate::vocab::category;
use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub const TAXON_SUFFIX: &str = "_taxon";
pub const GENE_SUFFIX: &str = "_gene";
pub const CHROMOSOME_SUFFIX: &str = "_chromosome";
pub const SUBJECT_ORTHOLOG_CLOSURE: &str = "subject_ortholog_closure";
pub const DISEASE: &str = "disease";
pub const PHENOTYPE: &str = "phenotype";
pub const EVIDENCE_OBJECT: &str = "evidence_object";
pub const SOURCE: &str = "source";
pub const IS_DEFINED_BY: &str = "is_defined_by";
pub const EVIDENCE_GRAPH: &str = "evidence_graph";

/// Categories that get gene and chromosome fields
const GENOMIC_CATEGORIES: &[&str] = &[category::GENE, category::VARIANT, category::GENOTYPE];

pub struct RowAssembler<'a> {
    ctx: &'a RunContext,
    plan: &'a QueryPlan,
}

impl<'a> RowAssembler<'a> {
    pub fn new(ctx: &'a RunContext, plan: &'a QueryPlan) -> Self {
        Self { ctx, plan }
    }

    pub fn plan(&self) -> &QueryPlan {
        self.plan
    }

    /// Merge key of a row. `None` for plans without a subject/object pair and
    /// for rows whose subject or object has no identifier.
    pub fn evidence_key(&self, row: &Row) -> Option<EvidenceKey> {
        if !self.plan.is_pair_keyed() {
            return None;
        }
        let subject = self.entity_id(row.get(SUBJECT)?)?;
        let object = self.entity_id(row.get(OBJECT)?)?;
        Some(EvidenceKey::new(subject, object))
    }

    pub fn bundle(&self, row: &Row) -> EvidenceBundle {
        let projected: Vec<String> = row
            .keys()
            .filter(|column| self.plan.is_projected(column))
            .cloned()
            .collect();
        EvidenceBundle::from_row(self.ctx.graph.as_ref(), row, &projected)
    }

    /// Document for the projected fields of one row. Enrichment failures are
    /// recorded on the document and the field is left out.
    pub fn assemble(&self, row: &Row) -> OutputDocument {
        let mut doc = OutputDocument::new();
        for (column, value) in row {
            if !self.plan.is_projected(column) {
                continue;
            }
            match value {
                Value::Node(id) => self.write_entity(&mut doc, column, *id),
                Value::Edge(id) => match self.defining_node(*id) {
                    Some(node) => self.write_entity(&mut doc, column, node),
                    None => self.field_failed(&mut doc, column, format!("{} has no defining node", id)),
                },
                Value::Property(property) => write_property(&mut doc, column, property),
                Value::Path(_) | Value::Null => {}
            }
        }
        doc
    }

    /// Complete a fact with its evidence fields, unless the fact opted out
    pub fn finish(&self, fact: PendingFact) -> OutputDocument {
        let PendingFact {
            mut document,
            mut bundle,
        } = fact;
        if !bundle.emit_evidence {
            return document;
        }

        let graph = self.ctx.graph.as_ref();
        let vocabulary = self.ctx.aspect.vocabulary();
        self.ctx.aspect.invoke(graph, &mut bundle.subgraph);

        let evidence_types = self.plan.closure_types(EVIDENCE);
        let objects: Vec<NodeId> = bundle
            .subgraph
            .nodes()
            .filter(|node| !bundle.ignored.contains(node) && !self.ctx.closures.is_anonymous(*node))
            .collect();
        write_closures(&mut document, EVIDENCE_OBJECT, &self.closures_of(&objects, evidence_types));

        let evidence = self.targets(&bundle.subgraph, &vocabulary.has_evidence);
        write_closures(&mut document, EVIDENCE, &self.closures_of(&evidence, evidence_types));

        let sources = self.targets(&bundle.subgraph, &vocabulary.source);
        write_closures(
            &mut document,
            SOURCE,
            &self.closures_of(&sources, self.plan.default_closure_types()),
        );

        document.insert(IS_DEFINED_BY, self.defined_by(&bundle.subgraph));
        document.insert(
            EVIDENCE_GRAPH,
            bundle.subgraph.to_json(graph, &self.ctx.curies).to_string(),
        );
        document
    }

    fn entity_id(&self, value: &Value) -> Option<String> {
        let node = match value {
            Value::Node(id) => *id,
            Value::Edge(id) => self.defining_node(*id)?,
            _ => return None,
        };
        self.ctx.closures.entity_id(node).ok()
    }

    /// The node describing a relationship's type, looked up by its IRI
    fn defining_node(&self, edge: EdgeId) -> Option<NodeId> {
        let graph = self.ctx.graph.as_ref();
        graph.edge(edge).and_then(|e| graph.node_by_iri(e.iri()))
    }

    fn write_entity(&self, doc: &mut OutputDocument, field: &str, node: NodeId) {
        let closure = match self.ctx.closures.closure(node, self.plan.closure_types(field)) {
            Ok(closure) => closure,
            Err(e) => return self.field_failed(doc, field, e),
        };
        write_closure(doc, field, &closure);

        match self.plan.role(field) {
            FieldRole::SubjectObject => self.write_genomic_context(doc, field, node),
            FieldRole::Feature => {
                let xrefs = &self.ctx.sidecars.cross_references;
                self.write_sidecar(doc, DISEASE, xrefs.diseases(node));
                self.write_sidecar(doc, PHENOTYPE, xrefs.phenotypes(node));
            }
            FieldRole::Plain => {}
        }
    }

    fn write_genomic_context(&self, doc: &mut OutputDocument, field: &str, node: NodeId) {
        let sidecars = &self.ctx.sidecars;
        self.write_sidecar(doc, &format!("{}{}", field, TAXON_SUFFIX), sidecars.taxon.resolve(node));

        let genomic = self
            .ctx
            .graph
            .node(node)
            .is_some_and(|n| GENOMIC_CATEGORIES.iter().any(|c| n.has_label(c)));
        if genomic {
            self.write_sidecar(doc, &format!("{}{}", field, GENE_SUFFIX), sidecars.gene.resolve(node));
            self.write_sidecar(
                doc,
                &format!("{}{}", field, CHROMOSOME_SUFFIX),
                sidecars.chromosome.resolve(node),
            );
        }

        if field == SUBJECT {
            match sidecars.ortholog.resolve(node) {
                Ok(orthologs) if orthologs.is_empty() => {}
                Ok(orthologs) => {
                    let closures = self.closures_of(&orthologs, self.plan.default_closure_types());
                    let mut ids = IndexSet::new();
                    let mut labels = IndexSet::new();
                    for closure in &closures {
                        ids.extend(closure.curies.iter().cloned());
                        labels.extend(closure.labels.iter().cloned());
                    }
                    doc.insert(SUBJECT_ORTHOLOG_CLOSURE, ids.into_iter().collect::<Vec<_>>());
                    doc.insert(
                        format!("{}{}", SUBJECT_ORTHOLOG_CLOSURE, LABEL_SUFFIX),
                        labels.into_iter().collect::<Vec<_>>(),
                    );
                }
                Err(e) => self.field_failed(doc, SUBJECT_ORTHOLOG_CLOSURE, e),
            }
        }
    }

    fn write_sidecar(&self, doc: &mut OutputDocument, base: &str, resolved: SidecarResult<Vec<NodeId>>) {
        match resolved {
            Ok(nodes) if nodes.is_empty() => {}
            Ok(nodes) => {
                let closures = self.closures_of(&nodes, self.plan.default_closure_types());
                write_closures(doc, base, &closures);
            }
            Err(e) => self.field_failed(doc, base, e),
        }
    }

    /// Closures of several entities; failures are logged and skipped
    fn closures_of(&self, nodes: &[NodeId], types: &RelationshipSet) -> Vec<Arc<Closure>> {
        nodes
            .iter()
            .filter_map(|node| match self.ctx.closures.closure(*node, types) {
                Ok(closure) => Some(closure),
                Err(e) => {
                    warn!("Query {}: closure of {} skipped: {}", self.plan.name(), node, e);
                    None
                }
            })
            .collect()
    }

    /// Targets of the subgraph's relationships of one type
    fn targets(&self, subgraph: &EvidenceGraph, edge_type: &str) -> Vec<NodeId> {
        let graph = self.ctx.graph.as_ref();
        dedup(
            subgraph
                .edges()
                .filter_map(|id| graph.edge(id))
                .filter(|edge| edge.is_type(edge_type))
                .map(|edge| edge.target),
        )
    }

    /// Defining resources: the configured relationship property plus the ids
    /// of `is_defined_by` targets
    fn defined_by(&self, subgraph: &EvidenceGraph) -> Vec<String> {
        let graph = self.ctx.graph.as_ref();
        let vocabulary = self.ctx.aspect.vocabulary();
        let mut values = IndexSet::new();
        for edge in subgraph.edges().filter_map(|id| graph.edge(id)) {
            if let Some(property) = edge.get_property(&vocabulary.defined_by_property) {
                values.extend(property.strings().into_iter().map(str::to_string));
            }
            if edge.is_type(&vocabulary.is_defined_by) {
                if let Ok(id) = self.ctx.closures.entity_id(edge.target) {
                    values.insert(id);
                }
            }
        }
        values.into_iter().collect()
    }

    fn field_failed(&self, doc: &mut OutputDocument, field: &str, error: impl fmt::Display) {
        warn!("Query {}: field {} skipped: {}", self.plan.name(), field, error);
        doc.record_error(field, error);
    }
}

fn write_property(doc: &mut OutputDocument, field: &str, property: &PropertyValue) {
    match property {
        PropertyValue::String(s) => doc.insert(field, s.clone()),
        PropertyValue::Integer(i) => doc.insert(field, *i),
        PropertyValue::Float(f) => doc.insert(field, *f),
        PropertyValue::Boolean(b) => doc.insert(field, *b),
        PropertyValue::Array(values) => doc.insert(
            field,
            values.iter().map(PropertyValue::to_plain_string).collect::<Vec<_>>(),
        ),
        PropertyValue::Null => {}
    }
}

fn write_closure(doc: &mut OutputDocument, base: &str, closure: &Closure) {
    doc.insert(base, closure.curie.clone());
    doc.insert(format!("{}{}", base, LABEL_SUFFIX), closure.label.clone());
    doc.insert(format!("{}{}", base, CLOSURE_SUFFIX), closure.curies.clone());
    doc.insert(format!("{}{}", base, CLOSURE_LABEL_SUFFIX), closure.labels.clone());
    doc.insert(
        format!("{}{}", base, CLOSURE_MAP_SUFFIX),
        closure_map_json(closure.closure_map.iter()),
    );
}

/// Array form of [`write_closure`]: ids and labels of every entity, closures
/// unioned in order
fn write_closures(doc: &mut OutputDocument, base: &str, closures: &[Arc<Closure>]) {
    let mut ids = IndexSet::new();
    let mut labels = Vec::new();
    let mut closure_ids = IndexSet::new();
    let mut closure_labels = IndexSet::new();
    let mut closure_map = IndexMap::new();

    for closure in closures {
        if ids.insert(closure.curie.clone()) {
            labels.push(closure.label.clone());
        }
        closure_ids.extend(closure.curies.iter().cloned());
        closure_labels.extend(closure.labels.iter().cloned());
        for (id, label) in &closure.closure_map {
            closure_map.entry(id.clone()).or_insert_with(|| label.clone());
        }
    }

    doc.insert(base, ids.into_iter().collect::<Vec<_>>());
    doc.insert(format!("{}{}", base, LABEL_SUFFIX), labels);
    doc.insert(format!("{}{}", base, CLOSURE_SUFFIX), closure_ids.into_iter().collect::<Vec<_>>());
    doc.insert(
        format!("{}{}", base, CLOSURE_LABEL_SUFFIX),
        closure_labels.into_iter().collect::<Vec<_>>(),
    );
    doc.insert(
        format!("{}{}", base, CLOSURE_MAP_SUFFIX),
        closure_map_json(closure_map.iter()),
    );
}

fn closure_map_json<'c>(entries: impl Iterator<Item = (&'c String, &'c String)>) -> String {
    let map: Map<String, JsonValue> = entries
        .map(|(id, label)| (id.clone(), JsonValue::from(label.as_str())))
        .collect();
    JsonValue::Object(map).to_string()
}
