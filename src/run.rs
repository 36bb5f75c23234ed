//! Run drivers: one function per `topsig` command.
//!
//! Each driver takes a validated [`TopsigConfig`], does its whole job and
//! returns a count for the caller to report. Search drivers write TREC run
//! lines to the writer they are given.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::time::Instant;

use canonical::Tokenizer;
use index::{IsslIndex, SignatureFile};
use matcher::{read_run, IsslSearcher, QueryEncoder, Results, Searcher, TrecWriter};
use tracing::{debug, info};

use crate::config::{ConfigLoadError, TopsigConfig};
use crate::error::TopsigError;
use crate::pipeline::{IndexingPipeline, PipelineStats};
use crate::topics::{load_topics, Topic};

/// Read every configured target and write its signatures.
pub fn index_collection(cfg: &TopsigConfig) -> Result<PipelineStats, TopsigError> {
    let sig_cfg = cfg.signature_config()?;
    let tokenizer = Tokenizer::new(&cfg.tokenize_config()?)?;
    let ingest_cfg = cfg.ingest_config()?;
    let mut pipeline = IndexingPipeline::create(
        cfg.signature_path()?,
        &sig_cfg,
        tokenizer,
        &cfg.pipeline_config()?,
    )?;
    ingest::read_targets(&ingest_cfg, |doc| pipeline.submit(doc))?;
    pipeline.finish()
}

/// Build the ISSL index of the signature file and save it.
pub fn build_issl(cfg: &TopsigConfig) -> Result<IsslIndex, TopsigError> {
    let start = Instant::now();
    let file = SignatureFile::open(cfg.signature_path()?)?;
    file.check_width(cfg.signature.width)?;
    let index = IsslIndex::build(&file, cfg.search.alloc_retries)?;
    let path = cfg.issl_path()?;
    index.save(path)?;
    info!(
        path = %path.display(),
        records = index.records(),
        slices = index.slices(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "issl index saved"
    );
    Ok(index)
}

/// Query encoder matching the signature file's header. The file must have
/// the configured width.
fn query_encoder(cfg: &TopsigConfig, file: &SignatureFile) -> Result<QueryEncoder, TopsigError> {
    file.check_width(cfg.signature.width)?;
    let header_cfg = file
        .header()
        .signature_config()
        .with_term_cache_size(cfg.signature.term_cache_size);
    Ok(QueryEncoder::new(&header_cfg, &cfg.tokenize_config()?)?)
}

/// Exhaustive search for a single text query.
pub fn search_text(cfg: &TopsigConfig, id: &str, text: &str) -> Result<Results, TopsigError> {
    let mut searcher = Searcher::open(cfg.signature_path()?, cfg.search_config())?;
    let mut encoder = query_encoder(cfg, searcher.file())?;
    let query = encoder.encode(id, text)?;
    Ok(searcher.search(&query.signature, cfg.search.k)?)
}

/// Run every topic of the topic file and write the results.
///
/// Topics with feedback text are refined with it when `search.feedback_k`
/// is set; the others get blind feedback when `search.feedback_sample` is.
pub fn run_topics<W: Write>(cfg: &TopsigConfig, out: W) -> Result<usize, TopsigError> {
    let start = Instant::now();
    let topics = load_topics(cfg.topic.topic_path()?, cfg.topic.topic_format()?)?;
    let mut searcher = Searcher::open(cfg.signature_path()?, cfg.search_config())?;
    let mut encoder = query_encoder(cfg, searcher.file())?;
    let mut writer = TrecWriter::new(out, cfg.topic.run_id.as_str());
    let k = cfg.search.k;

    for topic in &topics {
        let topic = if cfg.topic.refine_invert {
            topic.clone().inverted()
        } else {
            topic.clone()
        };
        let query = encoder.encode(&topic.id, &topic.query)?;
        let results = match &topic.feedback {
            Some(text) if cfg.search.feedback_k > 0 => {
                let feedback = encoder.encode(&topic.id, text)?;
                searcher.search_with_feedback(&query.signature, k, &feedback.signature)?
            }
            _ => searcher.search(&query.signature, k)?,
        };
        debug!(topic = %topic.id, results = results.len(), "topic searched");
        writer.write_results(&topic.id, &results)?;
    }
    let lines = writer.lines();
    writer.finish()?;
    info!(
        topics = topics.len(),
        lines,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "topic run complete"
    );
    Ok(topics.len())
}

/// Use stored documents as queries against the ISSL index.
///
/// Queries come from `issl.source` (the indexed file by default), records
/// `issl.first..=issl.last`. Each query's docid is its topic id.
pub fn run_issl_search<W: Write>(cfg: &TopsigConfig, out: W) -> Result<usize, TopsigError> {
    let retries = cfg.search.alloc_retries;
    let file = SignatureFile::open(cfg.signature_path()?)?;
    file.check_width(cfg.signature.width)?;
    let index = IsslIndex::load(cfg.issl_path()?, retries)?;
    let source = match &cfg.issl.source {
        Some(path) => SignatureFile::open(path)?,
        None => file.clone(),
    };
    let searcher = IsslSearcher::new(file, index, cfg.search_config(), cfg.issl_config()?)?;

    let range = cfg.issl.query_range(source.len());
    let mut writer = TrecWriter::new(out, cfg.topic.run_id.as_str());
    let done = searcher.search_documents(&source, range, cfg.search.k, |docid, results| {
        writer.write_results(docid, &results)
    })?;
    writer.finish()?;
    Ok(done)
}

/// Rerank the documents of an existing run by distance to each topic.
pub fn run_rerank<W: Write>(cfg: &TopsigConfig, out: W) -> Result<usize, TopsigError> {
    let run_path = cfg
        .topic
        .rerank_run
        .as_deref()
        .ok_or_else(|| ConfigLoadError::MissingField("topic.rerank_run".into()))?;
    let topics: HashMap<String, Topic> =
        load_topics(cfg.topic.topic_path()?, cfg.topic.topic_format()?)?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
    let run = read_run(BufReader::new(File::open(run_path)?))?;

    let mut searcher = Searcher::open(cfg.signature_path()?, cfg.search_config())?;
    let mut encoder = query_encoder(cfg, searcher.file())?;
    let mut writer = TrecWriter::new(out, cfg.topic.run_id.as_str());
    for entry in &run {
        let topic = topics
            .get(&entry.topic)
            .ok_or_else(|| TopsigError::UnknownTopic(entry.topic.clone()))?;
        let query = encoder.encode(&topic.id, &topic.query)?;
        let results = searcher.rerank(&query.signature, &entry.docids)?;
        writer.write_results(&entry.topic, &results)?;
    }
    writer.finish()?;
    info!(topics = run.len(), "rerank complete");
    Ok(run.len())
}
