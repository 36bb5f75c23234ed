use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::time::Instant;

use index::{RecordPage, SignatureFile};
use rayon::prelude::*;
use signature::FlatSignature;
use tracing::{debug, info};

use crate::distance::document_distance;
use crate::feedback::{blind_feedback, explicit_feedback};
use crate::merge::merge_results;
use crate::query::Query;
use crate::topk::{Candidate, TopK};
use crate::types::{docid_hash, MatchError, Results, SearchConfig, SearchResult};

#[cfg(test)]
mod tests;

const MIB: usize = 1 << 20;

/// How much of the signature file is held in memory.
#[derive(Debug)]
enum PageCache {
    /// Nothing read yet.
    Unknown,
    /// The whole file fit in one page; it is kept for every later query.
    Whole(RecordPage),
    /// The file is larger than one page; pages are re-read per query.
    Paged { page_records: usize },
}

/// Exhaustive nearest-neighbour search over one signature file.
pub struct Searcher {
    file: SignatureFile,
    cfg: SearchConfig,
    pool: rayon::ThreadPool,
    cache: PageCache,
}

impl Searcher {
    pub fn new(file: SignatureFile, cfg: SearchConfig) -> Result<Self, MatchError> {
        cfg.validate()?;
        let pool = build_pool(cfg.threads)?;
        Ok(Self {
            file,
            cfg,
            pool,
            cache: PageCache::Unknown,
        })
    }

    pub fn open(path: impl AsRef<Path>, cfg: SearchConfig) -> Result<Self, MatchError> {
        Self::new(SignatureFile::open(path)?, cfg)
    }

    pub fn file(&self) -> &SignatureFile {
        &self.file
    }

    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    pub fn width(&self) -> usize {
        self.file.width()
    }

    /// Whether the entire file is cached in memory.
    pub fn is_fully_cached(&self) -> bool {
        matches!(self.cache, PageCache::Whole(_))
    }

    fn page_records(&self) -> usize {
        let record_size = self.file.layout().record_size();
        (self.cfg.cache_size_mb.saturating_mul(MIB) / record_size).max(1)
    }

    fn ensure_cache(&mut self) -> Result<(), MatchError> {
        if !matches!(self.cache, PageCache::Unknown) {
            return Ok(());
        }
        let page_records = self.page_records();
        self.cache = if self.file.len() <= page_records {
            let page = self
                .file
                .read_page(0, self.file.len(), self.cfg.alloc_retries)?;
            info!(
                records = page.len(),
                bytes = page.byte_len(),
                "signature file cached in memory"
            );
            PageCache::Whole(page)
        } else {
            info!(
                records = self.file.len(),
                page_records, "signature file will be searched in pages"
            );
            PageCache::Paged { page_records }
        };
        Ok(())
    }

    /// The `k` records closest to `query`, with blind feedback applied
    /// when `feedback_sample` is set.
    pub fn search(&mut self, query: &FlatSignature, k: usize) -> Result<Results, MatchError> {
        let results = self.scan(query, k)?;
        blind_feedback(results, self.cfg.feedback_sample, self.width())
    }

    /// Search `query`, then re-rank against the top `feedback_k` results of
    /// `feedback`.
    pub fn search_with_feedback(
        &mut self,
        query: &FlatSignature,
        k: usize,
        feedback: &FlatSignature,
    ) -> Result<Results, MatchError> {
        let results = self.scan(query, k)?;
        let feedback_k = self.cfg.feedback_k;
        let feedback_results = self.scan(feedback, feedback_k)?;
        explicit_feedback(results, &feedback_results, feedback_k, self.width())
    }

    /// Exhaustive scan without feedback.
    pub fn scan(&mut self, query: &FlatSignature, k: usize) -> Result<Results, MatchError> {
        if query.width() != self.width() {
            return Err(index::IndexError::WidthMismatch {
                expected: self.width(),
                actual: query.width(),
            }
            .into());
        }
        self.ensure_cache()?;
        let start = Instant::now();
        let results = match &self.cache {
            PageCache::Whole(page) => self.scan_page(page, query, k),
            PageCache::Paged { page_records } => {
                let page_records = *page_records;
                let mut merged = Results::empty();
                let mut first = 0;
                while first < self.file.len() {
                    let page = self
                        .file
                        .read_page(first, page_records, self.cfg.alloc_retries)?;
                    let page_results = self.scan_page(&page, query, k);
                    merged = merge_results(merged, page_results, k);
                    first += page.len();
                }
                merged
            }
            PageCache::Unknown => Results::empty(),
        };
        debug!(
            k,
            found = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "exhaustive scan complete"
        );
        Ok(results)
    }

    fn scan_page(&self, page: &RecordPage, query: &FlatSignature, k: usize) -> Results {
        let len = page.len();
        let threads = self.cfg.threads.min(len).max(1);
        if threads == 1 {
            return scan_range(page, 0..len, query, k);
        }
        self.pool.install(|| {
            (0..threads)
                .into_par_iter()
                .map(|t| scan_range(page, t * len / threads..(t + 1) * len / threads, query, k))
                .reduce(Results::empty, |a, b| merge_results(a, b, k))
        })
    }

    /// Record index of `docid`.
    pub fn find_document(&mut self, docid: &str) -> Result<usize, MatchError> {
        self.ensure_cache()?;
        let found = match &self.cache {
            PageCache::Whole(page) => page
                .iter()
                .position(|rec| rec.name_bytes() == docid.as_bytes()),
            _ => self.file.find(docid)?,
        };
        found.ok_or_else(|| MatchError::DocumentNotFound(docid.to_string()))
    }

    /// The stored signature of `docid`, ready to be used as a query.
    pub fn document_query(&mut self, docid: &str) -> Result<Query, MatchError> {
        let index = self.find_document(docid)?;
        let record = match &self.cache {
            PageCache::Whole(page) => page.record(index).to_record(),
            _ => self.file.read_record(index)?,
        };
        Ok(Query::from_record(record))
    }

    /// Rank the listed documents by their distance to `query`.
    ///
    /// Every docid must exist in the file. Repeated docids are ranked once.
    pub fn rerank(&mut self, query: &FlatSignature, docids: &[String]) -> Result<Results, MatchError> {
        let mut wanted: HashMap<&[u8], Option<SearchResult>> =
            docids.iter().map(|d| (d.as_bytes(), None)).collect();
        self.file.for_each_record(|i, rec| {
            if let Some(slot) = wanted.get_mut(rec.name_bytes()) {
                if slot.is_none() {
                    let distance = document_distance(rec.bits(), &query.bits, &query.mask);
                    let hash = docid_hash(rec.name_bytes());
                    let meta = rec.meta();
                    *slot = Some(SearchResult {
                        docid: rec.name(),
                        docid_hash: hash,
                        record: i,
                        bits: rec.bits().to_vec(),
                        distance,
                        quality: meta.quality,
                        offset_begin: meta.offset_begin,
                        offset_end: meta.offset_end,
                    });
                }
            }
            Ok::<(), MatchError>(())
        })?;

        if let Some(missing) = docids
            .iter()
            .find(|d| matches!(wanted.get(d.as_bytes()), Some(None)))
        {
            return Err(MatchError::DocumentNotFound(missing.clone()));
        }
        Ok(Results::from_unsorted(
            wanted.into_values().flatten().collect(),
        ))
    }
}

pub(crate) fn build_pool(threads: usize) -> Result<rayon::ThreadPool, MatchError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("topsig-search-{i}"))
        .build()
        .map_err(|e| MatchError::InvalidConfig(format!("cannot start search threads: {e}")))
}

fn scan_range(page: &RecordPage, range: Range<usize>, query: &FlatSignature, k: usize) -> Results {
    let mut top = TopK::new(k);
    for i in range {
        let rec = page.record(i);
        let distance = document_distance(rec.bits(), &query.bits, &query.mask);
        top.offer(&Candidate::from_view(page.first() + i, &rec, distance));
    }
    top.into_results()
}
