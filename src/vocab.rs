//! Predicate and class IRIs the loader walks over

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_SUB_PROPERTY_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subPropertyOf";
pub const RDFS_IS_DEFINED_BY: &str = "http://www.w3.org/2000/01/rdf-schema#isDefinedBy";
pub const OWL_EQUIVALENT_CLASS: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
pub const DC_SOURCE: &str = "http://purl.org/dc/elements/1.1/source";

pub const IN_TAXON: &str = "http://purl.obolibrary.org/obo/RO_0002162";
pub const PART_OF: &str = "http://purl.obolibrary.org/obo/BFO_0000050";
pub const HAS_PART: &str = "http://purl.obolibrary.org/obo/BFO_0000051";
pub const SUBSEQUENCE_OF: &str = "http://purl.obolibrary.org/obo/RO_0002525";
pub const DERIVES_FROM: &str = "http://purl.obolibrary.org/obo/RO_0001000";
pub const HAS_PHENOTYPE: &str = "http://purl.obolibrary.org/obo/RO_0002200";
pub const HAS_EVIDENCE: &str = "http://purl.obolibrary.org/obo/RO_0002558";
pub const IS_VARIANT_OF: &str = "http://purl.obolibrary.org/obo/GENO_0000410";
pub const HAS_GENOTYPE: &str = "http://purl.obolibrary.org/obo/GENO_0000222";
pub const DERIVES_SEQ_FROM_GENE: &str = "http://purl.obolibrary.org/obo/GENO_0000639";
pub const ORTHOLOGOUS_TO: &str = "http://purl.obolibrary.org/obo/RO_HOM0000017";
pub const IN_1_TO_1_ORTHOLOGY: &str = "http://purl.obolibrary.org/obo/RO_HOM0000020";
pub const CHROMOSOME: &str = "http://purl.obolibrary.org/obo/SO_0000340";

pub const ASSOCIATION_HAS_SUBJECT: &str = "http://purl.org/oban/association_has_subject";
pub const ASSOCIATION_HAS_OBJECT: &str = "http://purl.org/oban/association_has_object";

/// FALDO location predicates, stored under their short names
pub const LOCATION: &str = "location";
pub const BEGIN: &str = "begin";
pub const REFERENCE: &str = "reference";

/// Category labels
pub mod category {
    pub const GENE: &str = "gene";
    pub const VARIANT: &str = "variant";
    pub const GENOTYPE: &str = "genotype";
    pub const PHENOTYPE: &str = "phenotype";
    pub const ONTOLOGY: &str = "ontology";
    pub const CLIQUE_LEADER: &str = "cliqueLeader";

    /// Categories that never show up in an entity's category list
    pub const HIDDEN: &[&str] = &["cliqueLeader", "Node", "Class", "NamedIndividual"];
}

/// IRI prefixes of anonymous (blank or skolemised) nodes
pub const DEFAULT_ANONYMOUS_PREFIXES: &[&str] = &["_:", "https://monarchinitiative.org/.well-known/genid/"];
