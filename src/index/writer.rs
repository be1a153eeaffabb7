//! Batched, committed writes to the index
//!
//! One writer is shared by every worker. Each batch is added and committed
//! under one mutex, so a commit never publishes half of another worker's
//! batch. Generated files are streamed from disk a batch at a time.

use super::{IndexClient, IndexDocument, IndexResult};
use serde::de::{self, Deserializer as _, SeqAccess, Visitor};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

pub struct BatchWriter {
    client: Arc<dyn IndexClient>,
    batch_size: usize,
    lock: Mutex<()>,
}

impl BatchWriter {
    pub fn new(client: Arc<dyn IndexClient>, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Add and commit `docs` one batch at a time. A failed add is retried
    /// once; a second failure ends the write and leaves that batch
    /// uncommitted.
    pub async fn write(&self, docs: &[IndexDocument]) -> IndexResult<usize> {
        for (n, batch) in docs.chunks(self.batch_size).enumerate() {
            self.write_batch(batch).await?;
            debug!("Committed batch {} ({} documents)", n + 1, batch.len());
        }
        Ok(docs.len())
    }

    async fn write_batch(&self, batch: &[IndexDocument]) -> IndexResult<()> {
        let _guard = self.lock.lock().await;
        self.add_with_retry(batch).await?;
        self.client.commit().await
    }

    /// Upload a generated file: a JSON array of documents. The array is read
    /// on a blocking task and handed over one batch at a time.
    pub async fn upload_file(&self, path: &Path) -> IndexResult<usize> {
        let (tx, mut rx) = mpsc::channel::<Vec<IndexDocument>>(1);
        let source = path.to_path_buf();
        let batch_size = self.batch_size;
        let reader = tokio::task::spawn_blocking(move || {
            read_batches(&source, batch_size, |batch| tx.blocking_send(batch).is_ok())
        });

        let mut failure = None;
        while let Some(batch) = rx.recv().await {
            if let Err(e) = self.write_batch(&batch).await {
                failure = Some(e);
                break;
            }
            debug!("Committed {} documents from {}", batch.len(), path.display());
        }
        drop(rx);

        let read = reader.await?;
        if let Some(e) = failure {
            return Err(e);
        }
        let count = read?;
        info!("Uploaded {} documents from {}", count, path.display());
        Ok(count)
    }

    async fn add_with_retry(&self, batch: &[IndexDocument]) -> IndexResult<()> {
        match self.client.add_batch(batch).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Index add of {} documents failed, retrying: {}", batch.len(), first);
                self.client.add_batch(batch).await
            }
        }
    }
}

/// Read the JSON array at `path` element by element, handing `batch_size`
/// documents at a time to `on_batch`. Stops early when `on_batch` returns
/// false. Returns the number of documents read.
fn read_batches<F>(path: &Path, batch_size: usize, on_batch: F) -> IndexResult<usize>
where
    F: FnMut(Vec<IndexDocument>) -> bool,
{
    let file = File::open(path)?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    let count = (&mut deserializer).deserialize_seq(BatchVisitor { batch_size, on_batch })?;
    deserializer.end()?;
    Ok(count)
}

struct BatchVisitor<F> {
    batch_size: usize,
    on_batch: F,
}

impl<'de, F> Visitor<'de> for BatchVisitor<F>
where
    F: FnMut(Vec<IndexDocument>) -> bool,
{
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON array of documents")
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<usize, A::Error> {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut count = 0;
        while let Some(doc) = seq.next_element::<IndexDocument>()? {
            batch.push(doc);
            count += 1;
            if batch.len() == self.batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                if !(self.on_batch)(full) {
                    return Err(de::Error::custom("upload stopped"));
                }
            }
        }
        if !batch.is_empty() && !(self.on_batch)(batch) {
            return Err(de::Error::custom("upload stopped"));
        }
        Ok(count)
    }
}
