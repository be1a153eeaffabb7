use async_trait::async_trait;
use golr_loader::config::LoaderConfig;
use golr_loader::context::RunContext;
use golr_loader::document::QuerySpec;
use golr_loader::evidence::AggregationBackend;
use golr_loader::graph::{keys, GraphStore};
use golr_loader::index::{BatchWriter, IndexClient, IndexDocument, IndexError, IndexResult};
use golr_loader::pipeline::{load_queries, Pipeline, PipelineOptions};
use golr_loader::vocab;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::{Arc, Mutex};

const INTERACTS: &str = "http://x.org/interacts";

/// Index that keeps committed documents in memory and fails the first
/// `failures` adds
#[derive(Default)]
struct MockIndex {
    failures: Mutex<usize>,
    pending: Mutex<Vec<IndexDocument>>,
    committed: Mutex<Vec<IndexDocument>>,
    adds: Mutex<usize>,
}

impl MockIndex {
    fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }

    fn committed(&self) -> Vec<IndexDocument> {
        self.committed.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexClient for MockIndex {
    async fn add_batch(&self, docs: &[IndexDocument]) -> IndexResult<()> {
        *self.adds.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(IndexError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.pending.lock().unwrap().extend(docs.iter().cloned());
        Ok(())
    }

    async fn commit(&self) -> IndexResult<()> {
        let mut pending = self.pending.lock().unwrap();
        self.committed.lock().unwrap().append(&mut pending);
        Ok(())
    }
}

/// X interacts with Y, backed by two evidence codes; two ontology classes
/// C1 subClassOf C2
fn graph() -> GraphStore {
    let mut store = GraphStore::new();
    let x = store.create_node("http://x.org/X");
    let y = store.create_node("http://x.org/Y");
    let e1 = store.create_node("http://x.org/E1");
    let e2 = store.create_node("http://x.org/E2");
    store.set_node_property(x, keys::LABEL, "gene x").unwrap();
    store.set_node_property(e1, keys::LABEL, "assay").unwrap();
    store.add_label_to_node(x, "gene").unwrap();
    store.create_edge(x, y, INTERACTS).unwrap();
    store.create_edge(x, e1, vocab::HAS_EVIDENCE).unwrap();
    store.create_edge(x, e2, vocab::HAS_EVIDENCE).unwrap();

    let c1 = store.create_node("http://x.org/C1");
    let c2 = store.create_node("http://x.org/C2");
    store.create_edge(c1, c2, vocab::RDFS_SUBCLASS_OF).unwrap();
    store
}

fn context(backend: AggregationBackend) -> Arc<RunContext> {
    let mut config = LoaderConfig {
        aggregation: backend,
        ..LoaderConfig::default()
    };
    config.curies.insert("X".to_string(), "http://x.org/".to_string());
    Arc::new(RunContext::new(Arc::new(graph()), &config))
}

fn interactions() -> QuerySpec {
    QuerySpec::new(format!(
        "MATCH (s)-[r:`{}`]->(o), (s)-[ev:`{}`]->(e) RETURN s AS subject, o AS object",
        INTERACTS,
        vocab::HAS_EVIDENCE
    ))
}

fn class_hierarchy() -> QuerySpec {
    QuerySpec::new(format!(
        "MATCH (s)-[:`{}`]->(o) RETURN s AS subject, o AS object, 'ontology' AS subject_category, 'ontology' AS object_category",
        vocab::RDFS_SUBCLASS_OF
    ))
}

fn read_documents(path: &Path) -> Vec<JsonValue> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn strings(doc: &JsonValue, field: &str) -> Vec<String> {
    doc[field]
        .as_array()
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

async fn run_interactions(backend: AggregationBackend) -> Vec<JsonValue> {
    let output = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        PipelineOptions {
            output_dir: Some(output.path().to_path_buf()),
            ..PipelineOptions::default()
        },
        None,
    );
    let report = pipeline
        .run(context(backend), vec![("interactions".to_string(), interactions())])
        .await
        .unwrap();
    assert!(report.is_success(), "{:?}", report);
    read_documents(&output.path().join("interactions.json"))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rows_for_one_pair_merge_their_evidence() {
    let docs = run_interactions(AggregationBackend::Memory).await;
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc["subject"], "X:X");
    assert_eq!(doc["subject_label"], "gene x");
    assert_eq!(doc["object"], "X:Y");

    let evidence = strings(doc, "evidence");
    assert!(evidence.contains(&"X:E1".to_string()));
    assert!(evidence.contains(&"X:E2".to_string()));
    assert_eq!(strings(doc, "evidence_label"), vec!["assay"]);
    assert!(!strings(doc, "evidence_object").contains(&"X:X".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disk_aggregation_matches_memory() {
    let on_disk = run_interactions(AggregationBackend::Rocksdb).await;
    let in_memory = run_interactions(AggregationBackend::Memory).await;
    assert_eq!(on_disk.len(), 1);
    assert_eq!(strings(&on_disk[0], "evidence").len(), 2);
    assert_eq!(on_disk[0]["subject"], in_memory[0]["subject"]);
    assert_eq!(on_disk[0]["object"], in_memory[0]["object"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ontology_facts_carry_no_evidence() {
    let output = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        PipelineOptions {
            output_dir: Some(output.path().to_path_buf()),
            ..PipelineOptions::default()
        },
        None,
    );
    pipeline
        .run(context(AggregationBackend::Memory), vec![("classes".to_string(), class_hierarchy())])
        .await
        .unwrap();

    let docs = read_documents(&output.path().join("classes.json"));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["subject"], "X:C1");
    assert_eq!(strings(&docs[0], "subject_closure"), vec!["X:C1", "X:C2"]);
    for field in ["evidence", "evidence_object", "source", "is_defined_by", "evidence_graph"] {
        assert!(docs[0].get(field).is_none(), "unexpected {}", field);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_query_does_not_stop_the_others() {
    let index = Arc::new(MockIndex::default());
    let writer = Arc::new(BatchWriter::new(index.clone(), 10));
    let pipeline = Pipeline::new(
        PipelineOptions {
            workers: 2,
            ..PipelineOptions::default()
        },
        Some(writer),
    );
    let queries = vec![
        ("broken".to_string(), QuerySpec::new("MATCH (s RETURN s AS subject")),
        ("classes".to_string(), class_hierarchy()),
        ("interactions".to_string(), interactions()),
    ];

    let report = pipeline.run(context(AggregationBackend::Memory), queries).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed(), vec!["broken"]);
    assert_eq!(report.outcome("classes").unwrap().documents, 1);
    assert_eq!(report.outcome("interactions").unwrap().documents, 1);
    assert_eq!(report.total_documents(), 2);

    let committed = index.committed();
    assert_eq!(committed.len(), 2);
    let mut subjects: Vec<&str> = committed.iter().filter_map(|d| d["subject"].as_str()).collect();
    subjects.sort();
    assert_eq!(subjects, vec!["X:C1", "X:X"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_add_is_retried_once_without_duplicates() {
    let index = Arc::new(MockIndex::failing(1));
    let writer = Arc::new(BatchWriter::new(index.clone(), 10));
    let pipeline = Pipeline::new(PipelineOptions::default(), Some(writer));

    let report = pipeline
        .run(context(AggregationBackend::Memory), vec![("interactions".to_string(), interactions())])
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(*index.adds.lock().unwrap(), 2);
    let committed = index.committed();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0]["subject"], "X:X");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_failure_is_reported_for_its_query() {
    let index = Arc::new(MockIndex::failing(2));
    let writer = Arc::new(BatchWriter::new(index.clone(), 10));
    let pipeline = Pipeline::new(PipelineOptions::default(), Some(writer));

    let report = pipeline
        .run(context(AggregationBackend::Memory), vec![("interactions".to_string(), interactions())])
        .await
        .unwrap();

    assert_eq!(report.failed(), vec!["interactions"]);
    let outcome = report.outcome("interactions").unwrap();
    assert_eq!(outcome.documents, 1);
    assert!(outcome.error.as_deref().unwrap().contains("503"));
    assert!(index.committed().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_only_and_delete() {
    let output = tempfile::tempdir().unwrap();
    let options = PipelineOptions {
        output_dir: Some(output.path().to_path_buf()),
        ..PipelineOptions::default()
    };
    Pipeline::new(options.clone(), None)
        .run(context(AggregationBackend::Memory), vec![("classes".to_string(), class_hierarchy())])
        .await
        .unwrap();
    assert!(output.path().join("classes.json").exists());

    let index = Arc::new(MockIndex::default());
    let writer = Arc::new(BatchWriter::new(index.clone(), 10));
    let report = Pipeline::new(
        PipelineOptions {
            delete_json: true,
            ..options
        },
        Some(writer),
    )
    .upload_only()
    .await
    .unwrap();

    assert!(report.is_success());
    assert_eq!(report.total_documents(), 1);
    assert_eq!(index.committed().len(), 1);
    assert!(!output.path().join("classes.json").exists());
}

#[test]
fn test_query_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("classes.yaml"),
        "query: MATCH (s)-->(o) RETURN s AS subject, o AS object\nsubject_closure: rdfs:subClassOf\n",
    )
    .unwrap();
    let queries = load_queries(dir.path()).unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].0, "classes");
    assert_eq!(queries[0].1.subject_closure.as_deref(), Some("rdfs:subClassOf"));
}
