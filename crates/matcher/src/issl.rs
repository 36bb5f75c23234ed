use std::cmp::Ordering;
use std::ops::Range;
use std::thread;
use std::time::Instant;

use crossbeam_channel::bounded;
use index::{IndexError, IsslIndex, RecordPage, SignatureFile, SLICE_BITS};
use signature::FlatSignature;
use tracing::{debug, info};

use crate::distance::document_distance;
use crate::engine::build_pool;
use crate::topk::{Candidate, TopK};
use crate::types::{IsslConfig, MatchError, Results, SearchConfig};

/// The `k` highest-scoring record indices, best first.
///
/// Ties on score go to the lower record index.
pub fn extract_topk(scores: &[u32], k: usize) -> Vec<usize> {
    extract_topk_by(scores, k, |a, b| a.cmp(&b))
}

/// As [`extract_topk`], with ties on score broken by `tie` over record
/// indices (`Less` ranks first). The buffer only replaces its current worst
/// entry, which is located again after each replacement.
pub fn extract_topk_by<F>(scores: &[u32], k: usize, tie: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> Ordering,
{
    if k == 0 {
        return Vec::new();
    }
    let order = |a: &(u32, usize), b: &(u32, usize)| b.0.cmp(&a.0).then_with(|| tie(a.1, b.1));
    let mut top: Vec<(u32, usize)> = Vec::with_capacity(k.min(scores.len()));
    let mut worst: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        if top.len() < k {
            top.push((s, i));
            worst = None;
            continue;
        }
        let w = match worst {
            Some(w) => w,
            None => {
                let w = worst_slot(&top, &order);
                worst = Some(w);
                w
            }
        };
        if order(&(s, i), &top[w]) == Ordering::Less {
            top[w] = (s, i);
            worst = None;
        }
    }
    top.sort_by(&order);
    top.into_iter().map(|(_, i)| i).collect()
}

fn worst_slot<F>(top: &[(u32, usize)], order: &F) -> usize
where
    F: Fn(&(u32, usize), &(u32, usize)) -> Ordering,
{
    let mut w = 0;
    for (j, entry) in top.iter().enumerate().skip(1) {
        if order(entry, &top[w]) == Ordering::Greater {
            w = j;
        }
    }
    w
}

/// ISSL-accelerated search over a signature file and its index.
///
/// The signature file is held in memory for exact rescoring of the
/// candidates the index selects.
pub struct IsslSearcher {
    file: SignatureFile,
    index: IsslIndex,
    records: RecordPage,
    cfg: SearchConfig,
    issl: IsslConfig,
    pool: rayon::ThreadPool,
}

impl IsslSearcher {
    pub fn new(
        file: SignatureFile,
        index: IsslIndex,
        cfg: SearchConfig,
        issl: IsslConfig,
    ) -> Result<Self, MatchError> {
        cfg.validate()?;
        issl.validate()?;
        index.check_compatible(&file)?;
        let records = file.read_page(0, file.len(), cfg.alloc_retries)?;
        let pool = build_pool(cfg.threads)?;
        info!(
            records = records.len(),
            slices = index.slices(),
            max_distance = issl.max_distance,
            "issl searcher ready"
        );
        Ok(Self {
            file,
            index,
            records,
            cfg,
            issl,
            pool,
        })
    }

    pub fn file(&self) -> &SignatureFile {
        &self.file
    }

    pub fn index(&self) -> &IsslIndex {
        &self.index
    }

    /// Approximate top `k` for one query.
    ///
    /// Candidates are selected on the query's raw bits and then ranked by
    /// exact masked distance, so below the full radius a partial mask only
    /// affects the rescoring. At the full radius a masked query is scored
    /// exactly against every record instead.
    pub fn search(&self, query: &FlatSignature, k: usize) -> Result<Results, MatchError> {
        if self.issl.max_distance >= SLICE_BITS && query.mask.iter().any(|&m| m != 0xFF) {
            return Ok(self.rescore_all(query, k));
        }
        let scores = self.pool.install(|| {
            self.index
                .score(&query.bits, self.issl.max_distance, self.cfg.alloc_retries)
        })?;
        Ok(self.rescore(&scores, query, k))
    }

    fn rescore(&self, scores: &[u32], query: &FlatSignature, k: usize) -> Results {
        let records = &self.records;
        let ties = |a: usize, b: usize| {
            let (ra, rb) = (records.record(a), records.record(b));
            rb.quality()
                .cmp(&ra.quality())
                .then_with(|| ra.name_bytes().cmp(rb.name_bytes()))
        };
        let mut top = TopK::new(k);
        for i in extract_topk_by(scores, k, ties) {
            let rec = records.record(i);
            let distance = document_distance(rec.bits(), &query.bits, &query.mask);
            top.offer(&Candidate::from_view(i, &rec, distance));
        }
        top.into_results()
    }

    fn rescore_all(&self, query: &FlatSignature, k: usize) -> Results {
        let mut top = TopK::new(k);
        for (i, rec) in self.records.iter().enumerate() {
            let distance = document_distance(rec.bits(), &query.bits, &query.mask);
            top.offer(&Candidate::from_view(i, &rec, distance));
        }
        top.into_results()
    }

    /// Use records `range` of `source` as queries, in order.
    ///
    /// Queries are read `lookahead` at a time on a separate thread, so the
    /// next batch is read while the current one is scored. `sink` receives
    /// each query's docid and results. Returns the number of queries run.
    pub fn search_documents<F>(
        &self,
        source: &SignatureFile,
        range: Range<usize>,
        k: usize,
        mut sink: F,
    ) -> Result<usize, MatchError>
    where
        F: FnMut(&str, Results) -> Result<(), MatchError>,
    {
        source.check_width(self.file.width())?;
        if range.start > range.end || range.end > source.len() {
            return Err(MatchError::InvalidConfig(format!(
                "query range {}..{} outside source file of {} records",
                range.start,
                range.end,
                source.len()
            )));
        }
        let start = Instant::now();
        let batch = self.issl.lookahead;
        let retries = self.cfg.alloc_retries;
        let (tx, rx) = bounded::<Result<RecordPage, IndexError>>(1);

        let done = thread::scope(|scope| {
            let range = range.clone();
            scope.spawn(move || {
                let mut first = range.start;
                while first < range.end {
                    let count = batch.min(range.end - first);
                    let page = source.read_page(first, count, retries);
                    let failed = page.is_err();
                    if tx.send(page).is_err() || failed {
                        break;
                    }
                    first += count;
                }
            });

            let mut done = 0usize;
            for page in rx {
                let page = page?;
                let queries: Vec<&[u8]> = page.iter().map(|rec| rec.bits()).collect();
                let scores = self.pool.install(|| {
                    self.index
                        .score_batch(&queries, self.issl.max_distance, retries)
                })?;
                for (rec, scores) in page.iter().zip(&scores) {
                    let query = FlatSignature::from_bits(rec.bits().to_vec());
                    let results = self.rescore(scores, &query, k);
                    sink(&rec.name(), results)?;
                    done += 1;
                }
                debug!(first = page.first(), queries = page.len(), "issl batch scored");
            }
            Ok::<usize, MatchError>(done)
        })?;

        info!(
            queries = done,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "document queries complete"
        );
        Ok(done)
    }
}
