//! One query, start to finish: rows in, a JSON array of documents out

use super::{LoaderError, LoaderResult};
use crate::context::RunContext;
use crate::document::{OutputDocument, QueryPlan, RowAssembler};
use crate::evidence::{EvidenceAccumulator, Observation};
use crate::query::{Params, Row};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info};

/// Streams documents into a JSON array
pub struct JsonArrayWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut out: W) -> LoaderResult<Self> {
        out.write_all(b"[")?;
        Ok(Self { out, written: 0 })
    }

    pub fn write(&mut self, doc: &OutputDocument) -> LoaderResult<()> {
        if self.written > 0 {
            self.out.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut self.out, &doc.to_index_document())?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Close the array and flush; returns the document count
    pub fn finish(mut self) -> LoaderResult<usize> {
        self.out.write_all(b"]\n")?;
        self.out.flush()?;
        Ok(self.written)
    }
}

pub struct QueryLoader<'a> {
    ctx: &'a RunContext,
    plan: &'a QueryPlan,
}

impl<'a> QueryLoader<'a> {
    pub fn new(ctx: &'a RunContext, plan: &'a QueryPlan) -> Self {
        Self { ctx, plan }
    }

    /// Write the query's documents to `path`
    pub fn load_to_file(&self, path: &Path) -> LoaderResult<usize> {
        let file = File::create(path)?;
        let count = self.load(BufWriter::new(file))?;
        info!("Query {}: {} documents written to {}", self.plan.name(), count, path.display());
        Ok(count)
    }

    /// Write the query's documents to `out`. Failures carry the query name
    /// and how many documents were written before them.
    pub fn load<W: Write>(&self, out: W) -> LoaderResult<usize> {
        let mut sink = JsonArrayWriter::new(out).map_err(|e| e.in_query(self.plan.name(), 0))?;
        match self.stream(&mut sink) {
            Ok(()) => sink.finish().map_err(|e| e.in_query(self.plan.name(), 0)),
            Err(e) => Err(e.in_query(self.plan.name(), sink.written())),
        }
    }

    /// Rows are folded one at a time as the graph matches them; only the
    /// accumulator holds state between rows.
    fn stream<W: Write>(&self, sink: &mut JsonArrayWriter<W>) -> Result<(), LoaderError> {
        let assembler = RowAssembler::new(self.ctx, self.plan);
        let mut accumulator = EvidenceAccumulator::new(self.ctx.aggregation)?;

        let mut failure = None;
        let rows = self.ctx.graph.execute_each(self.plan.text(), &Params::new(), &mut |row| {
            match fold_row(&assembler, &mut accumulator, sink, &row) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }

        debug!(
            "Query {}: {} rows folded into {} facts",
            self.plan.name(),
            rows,
            accumulator.key_count()
        );
        for entry in accumulator.pending() {
            let (_key, fact) = entry?;
            sink.write(&assembler.finish(fact))?;
        }
        Ok(())
    }
}

fn fold_row<W: Write>(
    assembler: &RowAssembler<'_>,
    accumulator: &mut EvidenceAccumulator,
    sink: &mut JsonArrayWriter<W>,
    row: &Row,
) -> LoaderResult<()> {
    let key = assembler.evidence_key(row);
    let bundle = assembler.bundle(row);
    if let Observation::Emit(fact) = accumulator.observe(key, bundle, || assembler.assemble(row))? {
        sink.write(&assembler.finish(fact))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::document::QuerySpec;
    use crate::evidence::AggregationBackend;
    use crate::graph::GraphStore;
    use crate::vocab;
    use std::sync::Arc;

    fn context(store: GraphStore) -> RunContext {
        let mut config = LoaderConfig {
            aggregation: AggregationBackend::Memory,
            ..LoaderConfig::default()
        };
        config.curies.insert("X".to_string(), "http://x.org/".to_string());
        RunContext::new(Arc::new(store), &config)
    }

    fn documents(bytes: &[u8]) -> Vec<serde_json::Value> {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_json_array_writer() {
        let mut out = Vec::new();
        let mut writer = JsonArrayWriter::new(&mut out).unwrap();
        let mut doc = OutputDocument::new();
        doc.insert("id", "X:1");
        writer.write(&doc).unwrap();
        writer.write(&doc).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);
        assert_eq!(documents(&out).len(), 2);

        let mut empty = Vec::new();
        JsonArrayWriter::new(&mut empty).unwrap().finish().unwrap();
        assert!(documents(&empty).is_empty());
    }

    #[test]
    fn test_rows_for_one_pair_become_one_document() {
        let mut store = GraphStore::new();
        let a = store.create_node("http://x.org/A");
        let b = store.create_node("http://x.org/B");
        let c = store.create_node("http://x.org/C");
        store.create_edge(a, b, vocab::RDFS_SUBCLASS_OF).unwrap();
        store.create_edge(a, b, "http://x.org/related").unwrap();
        store.create_edge(a, c, vocab::RDFS_SUBCLASS_OF).unwrap();
        let ctx = context(store);

        let spec = QuerySpec::new("MATCH (s)-[r]->(o) RETURN s AS subject, o AS object");
        let plan = QueryPlan::new("pairs", &spec, &ctx.curies).unwrap();
        let mut out = Vec::new();
        assert_eq!(QueryLoader::new(&ctx, &plan).load(&mut out).unwrap(), 2);

        let docs = documents(&out);
        assert_eq!(docs[0]["subject"], "X:A");
        assert_eq!(docs[0]["object"], "X:B");
        assert_eq!(docs[1]["object"], "X:C");
    }

    #[test]
    fn test_failure_names_the_query() {
        let ctx = context(GraphStore::new());
        let spec = QuerySpec::new("MATCH (s)-[r->(o) RETURN s AS subject");
        let plan = QueryPlan::new("broken", &spec, &ctx.curies).unwrap();
        let err = QueryLoader::new(&ctx, &plan).load(Vec::new()).unwrap_err();
        assert!(matches!(
            &err,
            LoaderError::InQuery { query, documents: 0, .. } if query == "broken"
        ));
    }
}
