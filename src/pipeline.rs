//! Concurrent indexing: documents in, signatures appended to one file.
//!
//! Submitted documents go through a bounded job queue to `threads` workers.
//! Each worker owns a [`SignatureBuilder`] (and so its own term vector
//! cache), tokenizes and splits the document, and flattens the resulting
//! signatures. Finished documents go through a second bounded queue to a
//! single writer thread, the only thread that touches the signature file.
//!
//! Both queues block when full, so a fast reader is held back by indexing
//! and indexing is held back by the disk. The signatures of one document are
//! written together; documents are written in completion order.
//!
//! With `threads = 0` everything runs on the submitting thread and records
//! are written in submission order.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use canonical::Tokenizer;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use index::{SignatureFileWriter, SignatureRecord};
use ingest::Document;
use serde::{Deserialize, Serialize};
use signature::{Signature, SignatureBuilder, SignatureConfig, SignatureMeta};
use tracing::{debug, info, warn};

use crate::error::TopsigError;
pub use crate::split::{SplitPolicy, SplitType, TermSpan};

/// Indexing pipeline sizing and document splitting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads. `0` indexes on the submitting thread.
    pub threads: usize,
    /// Capacity of the job queue and of the finished-signature queue.
    pub queue_capacity: usize,
    pub split: SplitPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            queue_capacity: 512,
            split: SplitPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }

    pub fn validate(&self) -> Result<(), TopsigError> {
        if self.queue_capacity == 0 {
            return Err(TopsigError::InvalidConfig(
                "queue_capacity must be >= 1".into(),
            ));
        }
        self.split.validate()
    }
}

/// Totals reported when a pipeline finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Documents submitted.
    pub documents: u64,
    /// Documents that produced no signature because no term survived
    /// tokenization.
    pub empty_documents: u64,
    /// Records appended to the signature file.
    pub signatures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    documents: AtomicU64,
    empty_documents: AtomicU64,
    signatures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            documents: self.documents.load(Ordering::Relaxed),
            empty_documents: self.empty_documents.load(Ordering::Relaxed),
            signatures: self.signatures.load(Ordering::Relaxed),
        }
    }
}

/// Turns one document into the flattened records of its spans.
struct DocumentIndexer {
    tokenizer: Arc<Tokenizer>,
    builder: SignatureBuilder,
    split: SplitPolicy,
}

impl DocumentIndexer {
    fn new(
        tokenizer: Arc<Tokenizer>,
        sig_cfg: &SignatureConfig,
        split: SplitPolicy,
    ) -> Result<Self, TopsigError> {
        Ok(Self {
            tokenizer,
            builder: SignatureBuilder::new(sig_cfg)?,
            split,
        })
    }

    fn index(&mut self, doc: &Document) -> Result<Vec<SignatureRecord>, TopsigError> {
        let tokens = self.tokenizer.tokenize(&doc.text);
        let spans = self.split.split(&tokens);
        let mut records = Vec::with_capacity(spans.len());
        for span in &spans {
            let sig = self.span_signature(doc, span)?;
            records.push(flatten(&sig));
        }
        Ok(records)
    }

    fn span_signature(&mut self, doc: &Document, span: &TermSpan<'_>) -> Result<Signature, TopsigError> {
        let mut sig = self.builder.new_accumulator(doc.id.as_str());
        for (term, count) in span.terms() {
            self.builder.add(&mut sig, term, count)?;
        }
        sig.meta = SignatureMeta {
            unique_terms: saturate(span.unique()),
            document_length: saturate(doc.text.len()),
            total_terms: saturate(span.total()),
            quality: 0,
            offset_begin: saturate(span.offset_begin()),
            offset_end: saturate(span.offset_end()),
            reserved: [0; 2],
        };
        Ok(sig)
    }
}

fn saturate(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn flatten(sig: &Signature) -> SignatureRecord {
    SignatureRecord {
        id: sig.id().to_string(),
        meta: sig.meta,
        bits: sig.finalize().bits,
    }
}

type FileWriter = SignatureFileWriter<BufWriter<File>>;

struct Threaded {
    jobs: Option<Sender<Document>>,
    records: Option<Sender<Vec<SignatureRecord>>>,
    errors: Receiver<TopsigError>,
    workers: Vec<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Threaded {
    fn spawn(
        writer: FileWriter,
        tokenizer: Arc<Tokenizer>,
        sig_cfg: &SignatureConfig,
        cfg: &PipelineConfig,
        counters: &Arc<Counters>,
    ) -> Result<Self, TopsigError> {
        let (job_tx, job_rx) = bounded::<Document>(cfg.queue_capacity);
        let (rec_tx, rec_rx) = bounded::<Vec<SignatureRecord>>(cfg.queue_capacity);
        let (err_tx, err_rx) = unbounded::<TopsigError>();

        let writer = {
            let errors = err_tx.clone();
            let counters = Arc::clone(counters);
            thread::Builder::new()
                .name("topsig-writer".into())
                .spawn(move || {
                    if let Err(e) = write_loop(writer, rec_rx, &counters) {
                        let _ = errors.send(e);
                    }
                })?
        };

        let mut workers = Vec::with_capacity(cfg.threads);
        for i in 0..cfg.threads {
            let mut indexer = DocumentIndexer::new(Arc::clone(&tokenizer), sig_cfg, cfg.split)?;
            let jobs = job_rx.clone();
            let records = rec_tx.clone();
            let errors = err_tx.clone();
            let counters = Arc::clone(counters);
            let handle = thread::Builder::new()
                .name(format!("topsig-index-{i}"))
                .spawn(move || {
                    for doc in jobs {
                        match indexer.index(&doc) {
                            Ok(recs) if recs.is_empty() => {
                                counters.empty_documents.fetch_add(1, Ordering::Relaxed);
                                debug!(docid = %doc.id, "document has no terms");
                            }
                            Ok(recs) => {
                                if records.send(recs).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = errors.send(e);
                                break;
                            }
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            records: Some(rec_tx),
            errors: err_rx,
            workers,
            writer: Some(writer),
        })
    }

    fn first_error(&self) -> Option<TopsigError> {
        self.errors.try_recv().ok()
    }

    /// Close the queues, wait for every thread and report the first error.
    fn join(&mut self) -> Result<(), TopsigError> {
        self.jobs.take();
        let mut panicked = false;
        for handle in self.workers.drain(..) {
            panicked |= handle.join().is_err();
        }
        self.records.take();
        if let Some(writer) = self.writer.take() {
            panicked |= writer.join().is_err();
        }
        if let Some(e) = self.first_error() {
            return Err(e);
        }
        if panicked {
            return Err(TopsigError::Pipeline("an indexing thread panicked".into()));
        }
        Ok(())
    }
}

fn write_loop(
    mut writer: FileWriter,
    records: Receiver<Vec<SignatureRecord>>,
    counters: &Counters,
) -> Result<(), TopsigError> {
    for batch in records {
        for rec in &batch {
            writer.append_record(&rec.id, &rec.meta, &rec.bits)?;
        }
        counters
            .signatures
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
    }
    writer.finish()?;
    Ok(())
}

enum Stage {
    Inline {
        indexer: DocumentIndexer,
        writer: FileWriter,
    },
    Threaded(Threaded),
}

/// Builds signatures for submitted documents and appends them to a
/// signature file.
///
/// Call [`finish`] to wait for queued work and flush the file. A pipeline
/// dropped without `finish` still joins its threads, but errors are lost.
///
/// [`finish`]: IndexingPipeline::finish
pub struct IndexingPipeline {
    stage: Option<Stage>,
    counters: Arc<Counters>,
    started: Instant,
}

impl IndexingPipeline {
    /// Create the signature file at `path` and start the pipeline.
    pub fn create(
        path: impl AsRef<Path>,
        sig_cfg: &SignatureConfig,
        tokenizer: Tokenizer,
        cfg: &PipelineConfig,
    ) -> Result<Self, TopsigError> {
        cfg.validate()?;
        let writer = SignatureFileWriter::create(path.as_ref(), sig_cfg)?;
        let tokenizer = Arc::new(tokenizer);
        let counters = Arc::new(Counters::default());
        let stage = if cfg.threads == 0 {
            Stage::Inline {
                indexer: DocumentIndexer::new(tokenizer, sig_cfg, cfg.split)?,
                writer,
            }
        } else {
            Stage::Threaded(Threaded::spawn(writer, tokenizer, sig_cfg, cfg, &counters)?)
        };
        info!(
            path = %path.as_ref().display(),
            threads = cfg.threads,
            queue_capacity = cfg.queue_capacity,
            split = %cfg.split.kind,
            width = sig_cfg.width,
            "indexing pipeline started"
        );
        Ok(Self {
            stage: Some(stage),
            counters,
            started: Instant::now(),
        })
    }

    /// Queue a document, blocking while the job queue is full.
    pub fn submit(&mut self, doc: Document) -> Result<(), TopsigError> {
        let Some(stage) = self.stage.as_mut() else {
            return Err(stopped());
        };
        self.counters.documents.fetch_add(1, Ordering::Relaxed);
        match stage {
            Stage::Inline { indexer, writer } => {
                let records = indexer.index(&doc)?;
                if records.is_empty() {
                    self.counters
                        .empty_documents
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(docid = %doc.id, "document has no terms");
                }
                for rec in &records {
                    writer.append_record(&rec.id, &rec.meta, &rec.bits)?;
                }
                self.counters
                    .signatures
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Stage::Threaded(t) => {
                if let Some(e) = t.first_error() {
                    return self.abort(e);
                }
                let sent = match &t.jobs {
                    Some(jobs) => jobs.send(doc).is_ok(),
                    None => false,
                };
                if sent {
                    Ok(())
                } else {
                    let e = TopsigError::Pipeline("indexing workers stopped".into());
                    self.abort(e)
                }
            }
        }
    }

    /// Queue an already built signature for writing.
    pub fn index_signature(&mut self, sig: &Signature) -> Result<(), TopsigError> {
        let Some(stage) = self.stage.as_mut() else {
            return Err(stopped());
        };
        let rec = flatten(sig);
        match stage {
            Stage::Inline { writer, .. } => {
                writer.append_record(&rec.id, &rec.meta, &rec.bits)?;
                self.counters.signatures.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Stage::Threaded(t) => {
                let sent = match &t.records {
                    Some(records) => records.send(vec![rec]).is_ok(),
                    None => false,
                };
                if sent {
                    Ok(())
                } else {
                    let e = TopsigError::Pipeline("signature writer stopped".into());
                    self.abort(e)
                }
            }
        }
    }

    /// Stop the threads after a failure, preferring the error a thread
    /// reported over `fallback`.
    fn abort(&mut self, fallback: TopsigError) -> Result<(), TopsigError> {
        if let Some(Stage::Threaded(mut t)) = self.stage.take() {
            let reported = t.first_error();
            let joined = t.join();
            return Err(reported.or(joined.err()).unwrap_or(fallback));
        }
        Err(fallback)
    }

    /// Wait until every submitted document is written, then flush the file.
    pub fn finish(mut self) -> Result<PipelineStats, TopsigError> {
        match self.stage.take() {
            Some(Stage::Inline { writer, .. }) => {
                writer.finish()?;
            }
            Some(Stage::Threaded(mut t)) => t.join()?,
            None => return Err(stopped()),
        }
        let stats = self.counters.snapshot();
        info!(
            documents = stats.documents,
            empty_documents = stats.empty_documents,
            signatures = stats.signatures,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "indexing pipeline finished"
        );
        Ok(stats)
    }
}

fn stopped() -> TopsigError {
    TopsigError::Pipeline("pipeline already stopped".into())
}

impl Drop for IndexingPipeline {
    fn drop(&mut self) {
        if let Some(Stage::Threaded(mut t)) = self.stage.take() {
            if let Err(e) = t.join() {
                warn!(error = %e, "indexing pipeline dropped with an error");
            }
        }
    }
}
