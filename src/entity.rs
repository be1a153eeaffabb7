//! Per-entity documents
//!
//! One document per clique leader: identifiers, labels, taxon, categories
//! and the curies of everything in its equivalence clique. Nodes without a
//! label, anonymous nodes and IRIs outside every known namespace are skipped.

use crate::closure::{ClosureShape, Order, RelationshipSet, TraversalDescription};
use crate::config::ConfigResult;
use crate::context::RunContext;
use crate::document::OutputDocument;
use crate::graph::{keys, Direction, Node, NodeId};
use crate::pipeline::{JsonArrayWriter, LoaderResult};
use crate::vocab::{self, category};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Prefix -> prefixes that share its local identifiers, e.g.
/// `OMIM: [MIM]` turns `OMIM:100100` into `MIM:100100` as well
pub type EquivalentPrefixes = IndexMap<String, Vec<String>>;

/// Read an equivalent-prefix map from a YAML file
pub fn read_equivalent_prefixes(path: &Path) -> ConfigResult<EquivalentPrefixes> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

pub struct EntityLoader<'a> {
    ctx: &'a RunContext,
    equivalent_prefixes: &'a EquivalentPrefixes,
    equivalence_types: RelationshipSet,
}

impl<'a> EntityLoader<'a> {
    pub fn new(ctx: &'a RunContext, equivalent_prefixes: &'a EquivalentPrefixes) -> Self {
        Self {
            ctx,
            equivalent_prefixes,
            equivalence_types: RelationshipSet::equivalence_types(),
        }
    }

    pub fn load_to_file(&self, path: &Path) -> LoaderResult<usize> {
        let file = File::create(path)?;
        let count = self.load(BufWriter::new(file))?;
        info!("{} entity documents written to {}", count, path.display());
        Ok(count)
    }

    pub fn load<W: Write>(&self, out: W) -> LoaderResult<usize> {
        let mut sink = JsonArrayWriter::new(out)?;
        let leaders = self.ctx.graph.nodes_with_label(category::CLIQUE_LEADER);
        debug!("{} clique leaders", leaders.len());
        for id in leaders {
            if let Some(doc) = self.document(id) {
                sink.write(&doc)?;
            }
        }
        sink.finish()
    }

    /// The entity document for `id`, or `None` when the node is skipped
    pub fn document(&self, id: NodeId) -> Option<OutputDocument> {
        let graph = self.ctx.graph.as_ref();
        let node = graph.node(id)?;
        let iri = node.iri()?;
        if node.get_property(keys::LABEL).is_none() || self.ctx.closures.is_anonymous(id) {
            return None;
        }
        let Some(curie) = self.ctx.curies.to_curie(iri) else {
            debug!("No curie for {}", iri);
            return None;
        };
        let (prefix, reference) = curie.split_once(':')?;

        let mut doc = OutputDocument::new();
        doc.insert("id", curie.as_str());
        doc.insert("prefix", prefix);
        doc.insert("label", strings(node.display_labels()));
        doc.insert("definition", strings(node.property_strings(keys::DEFINITION)));
        doc.insert("synonym", strings(node.property_strings(keys::SYNONYM)));
        doc.insert("edges", graph.relationships(id, Direction::Both).len() as i64);
        self.write_taxon(&mut doc, id);
        doc.insert("has_phenotype", self.has_phenotype(id));
        doc.insert(
            "category",
            node.labels
                .iter()
                .map(|l| l.as_str())
                .filter(|l| !category::HIDDEN.contains(l))
                .map(str::to_string)
                .collect::<Vec<_>>(),
        );
        doc.insert("equivalent_curie", self.equivalent_curies(id, prefix, reference));
        let subclassed = graph
            .relationships(id, Direction::Incoming)
            .iter()
            .any(|edge| edge.is_type(vocab::RDFS_SUBCLASS_OF));
        doc.insert("leaf", !subclassed);
        Some(doc)
    }

    /// First node reached through an in-taxon edge; empty values otherwise
    fn write_taxon(&self, doc: &mut OutputDocument, id: NodeId) {
        let graph = self.ctx.graph.as_ref();
        let taxon = TraversalDescription::depth_first()
            .relationships(vocab::IN_TAXON, Direction::Outgoing)
            .from_depth(1)
            .traverse(graph, id)
            .find_map(|step| graph.node(step.node));

        match taxon {
            Some(taxon) => {
                let taxon_id = taxon.iri().map(|iri| self.ctx.curies.id_for(iri)).unwrap_or_default();
                doc.insert("taxon", taxon_id);
                doc.insert("taxon_label", taxon.first_label().unwrap_or_default());
                doc.insert("taxon_label_synonym", strings(taxon.property_strings(keys::SYNONYM)));
            }
            None => {
                doc.insert("taxon", "");
                doc.insert("taxon_label", "");
                doc.insert("taxon_label_synonym", Vec::<String>::new());
            }
        }
    }

    /// Linked to a phenotype through has-phenotype, in either direction
    fn has_phenotype(&self, id: NodeId) -> bool {
        let graph = self.ctx.graph.as_ref();
        graph
            .relationships(id, Direction::Both)
            .into_iter()
            .filter(|edge| edge.is_type(vocab::HAS_PHENOTYPE))
            .filter_map(|edge| graph.node(edge.other_end(id)))
            .any(|other: &Node| other.has_label(category::PHENOTYPE))
    }

    /// Clique members by curie, each followed by its prefix equivalents. The
    /// entity's own prefix equivalents come first.
    fn equivalent_curies(&self, id: NodeId, prefix: &str, reference: &str) -> Vec<String> {
        let mut curies = self.prefix_equivalents(prefix, reference);
        let clique = self.ctx.closures.closure_with(
            id,
            &self.equivalence_types,
            ClosureShape::ExcludeRoot,
            Order::BreadthFirst,
        );
        let members = match clique {
            Ok(closure) => closure.curies.clone(),
            Err(e) => {
                debug!("No equivalence clique for {}: {}", id, e);
                Vec::new()
            }
        };
        for member in members {
            // Unresolvable members come back as raw IRIs
            if self.ctx.curies.to_iri(&member).is_none() {
                continue;
            }
            if let Some((member_prefix, member_reference)) = member.split_once(':') {
                let equivalents = self.prefix_equivalents(member_prefix, member_reference);
                curies.push(member.clone());
                curies.extend(equivalents);
            }
        }
        curies
    }

    fn prefix_equivalents(&self, prefix: &str, reference: &str) -> Vec<String> {
        self.equivalent_prefixes
            .get(prefix)
            .map(|others| others.iter().map(|p| format!("{}:{}", p, reference)).collect())
            .unwrap_or_default()
    }
}

fn strings(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::document::FieldValue;
    use crate::evidence::AggregationBackend;
    use crate::graph::GraphStore;
    use std::sync::Arc;

    const X: &str = "http://x.org/";

    fn context(store: GraphStore) -> RunContext {
        let mut config = LoaderConfig {
            aggregation: AggregationBackend::Memory,
            ..LoaderConfig::default()
        };
        config.curies.insert("X".to_string(), X.to_string());
        config.curies.insert("Y".to_string(), "http://y.org/".to_string());
        config.curies.insert("NCBITaxon".to_string(), "http://purl.obolibrary.org/obo/NCBITaxon_".to_string());
        RunContext::new(Arc::new(store), &config)
    }

    fn labelled(store: &mut GraphStore, iri: &str, label: &str) -> NodeId {
        let id = store.create_node(iri);
        store.set_node_property(id, keys::LABEL, label).unwrap();
        id
    }

    fn leader(store: &mut GraphStore, iri: &str, label: &str) -> NodeId {
        let id = labelled(store, iri, label);
        store.add_label_to_node(id, category::CLIQUE_LEADER).unwrap();
        id
    }

    /// X:1 (gene) in human, equivalent to Y:1, with a phenotype and a subclass
    fn fixture() -> (GraphStore, NodeId) {
        let mut store = GraphStore::new();
        let gene = leader(&mut store, "http://x.org/1", "shh");
        store.add_label_to_node(gene, category::GENE).unwrap();
        store.add_label_to_node(gene, "Class").unwrap();
        store.set_node_property(gene, keys::SYNONYM, vec!["sonic", "hhg1"]).unwrap();
        store.set_node_property(gene, keys::DEFINITION, "sonic hedgehog").unwrap();

        let human = labelled(&mut store, "http://purl.obolibrary.org/obo/NCBITaxon_9606", "Homo sapiens");
        store.set_node_property(human, keys::SYNONYM, "human").unwrap();
        store.create_edge(gene, human, vocab::IN_TAXON).unwrap();

        let same = labelled(&mut store, "http://y.org/1", "SHH");
        store.create_edge(same, gene, vocab::OWL_EQUIVALENT_CLASS).unwrap();

        let phenotype = labelled(&mut store, "http://x.org/P1", "cyclopia");
        store.add_label_to_node(phenotype, category::PHENOTYPE).unwrap();
        store.create_edge(gene, phenotype, vocab::HAS_PHENOTYPE).unwrap();

        let sub = labelled(&mut store, "http://x.org/2", "shh variant class");
        store.create_edge(sub, gene, vocab::RDFS_SUBCLASS_OF).unwrap();
        (store, gene)
    }

    #[test]
    fn test_entity_document() {
        let (store, gene) = fixture();
        let ctx = context(store);
        let prefixes: EquivalentPrefixes = IndexMap::new();
        let doc = EntityLoader::new(&ctx, &prefixes).document(gene).unwrap();

        assert_eq!(doc.get("id").unwrap().as_str(), Some("X:1"));
        assert_eq!(doc.get("prefix").unwrap().as_str(), Some("X"));
        assert_eq!(doc.get("label").unwrap().as_strings().unwrap(), ["shh"]);
        assert_eq!(doc.get("definition").unwrap().as_strings().unwrap(), ["sonic hedgehog"]);
        assert_eq!(doc.get("synonym").unwrap().as_strings().unwrap(), ["sonic", "hhg1"]);
        assert_eq!(doc.get("edges"), Some(&FieldValue::Integer(4)));
        assert_eq!(doc.get("taxon").unwrap().as_str(), Some("NCBITaxon:9606"));
        assert_eq!(doc.get("taxon_label").unwrap().as_str(), Some("Homo sapiens"));
        assert_eq!(doc.get("taxon_label_synonym").unwrap().as_strings().unwrap(), ["human"]);
        assert_eq!(doc.get("has_phenotype"), Some(&FieldValue::Boolean(true)));
        assert_eq!(doc.get("category").unwrap().as_strings().unwrap(), ["gene"]);
        assert_eq!(doc.get("equivalent_curie").unwrap().as_strings().unwrap(), ["Y:1"]);
        assert_eq!(doc.get("leaf"), Some(&FieldValue::Boolean(false)));
    }

    #[test]
    fn test_equivalent_prefixes() {
        let (store, gene) = fixture();
        let ctx = context(store);
        let mut prefixes = EquivalentPrefixes::new();
        prefixes.insert("X".to_string(), vec!["XX".to_string()]);
        prefixes.insert("Y".to_string(), vec!["YY".to_string(), "YYY".to_string()]);

        let doc = EntityLoader::new(&ctx, &prefixes).document(gene).unwrap();
        assert_eq!(
            doc.get("equivalent_curie").unwrap().as_strings().unwrap(),
            ["XX:1", "Y:1", "YY:1", "YYY:1"]
        );
    }

    #[test]
    fn test_entity_without_taxon_gets_empty_values() {
        let mut store = GraphStore::new();
        let lone = leader(&mut store, "http://x.org/9", "lonely");
        let ctx = context(store);
        let prefixes = EquivalentPrefixes::new();
        let doc = EntityLoader::new(&ctx, &prefixes).document(lone).unwrap();

        assert_eq!(doc.get("taxon").unwrap().as_str(), Some(""));
        assert_eq!(doc.get("taxon_label").unwrap().as_str(), Some(""));
        assert!(doc.get("taxon_label_synonym").unwrap().as_strings().unwrap().is_empty());
        assert_eq!(doc.get("has_phenotype"), Some(&FieldValue::Boolean(false)));
        assert_eq!(doc.get("leaf"), Some(&FieldValue::Boolean(true)));
        assert_eq!(doc.get("edges"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn test_skipped_nodes() {
        let mut store = GraphStore::new();
        let kept = leader(&mut store, "http://x.org/1", "kept");
        let unlabelled = store.create_node("http://x.org/2");
        store.add_label_to_node(unlabelled, category::CLIQUE_LEADER).unwrap();
        leader(&mut store, "_:b0", "blank");
        leader(&mut store, "https://monarchinitiative.org/.well-known/genid/abc", "skolem");
        leader(&mut store, "http://elsewhere.org/1", "no namespace");
        labelled(&mut store, "http://x.org/3", "not a leader");
        let ctx = context(store);

        let prefixes = EquivalentPrefixes::new();
        let loader = EntityLoader::new(&ctx, &prefixes);
        assert!(loader.document(kept).is_some());
        assert!(loader.document(unlabelled).is_none());

        let mut out = Vec::new();
        assert_eq!(loader.load(&mut out).unwrap(), 1);
        let docs: Vec<serde_json::Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(docs[0]["id"], "X:1");
    }

    #[test]
    fn test_read_equivalent_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eq.yaml");
        std::fs::write(&path, "OMIM: [MIM]\nNCBIGene: [Entrez, GeneID]\n").unwrap();
        let prefixes = read_equivalent_prefixes(&path).unwrap();
        assert_eq!(prefixes["OMIM"], vec!["MIM".to_string()]);
        assert_eq!(prefixes.len(), 2);
    }
}
