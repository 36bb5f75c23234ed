use std::cmp::Ordering;
use std::io;

use canonical::CanonicalError;
use index::IndexError;
use serde::{Deserialize, Serialize};
use signature::SignatureError;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Search-time settings shared by the exhaustive and ISSL searchers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned per query.
    pub k: usize,
    /// Worker threads for scanning and ISSL scoring.
    pub threads: usize,
    /// Upper bound on the in-memory signature page, in MiB.
    pub cache_size_mb: usize,
    /// Retry cap for large buffer allocations.
    pub alloc_retries: u32,
    /// Number of top results folded into a blind feedback query. `0` turns
    /// blind feedback off.
    pub feedback_sample: usize,
    /// Results of the feedback text used for explicit feedback.
    pub feedback_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: 10,
            threads: 1,
            cache_size_mb: 256,
            alloc_retries: index::DEFAULT_ALLOC_RETRIES,
            feedback_sample: 0,
            feedback_k: 10,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_cache_size_mb(mut self, mb: usize) -> Self {
        self.cache_size_mb = mb;
        self
    }

    pub fn with_alloc_retries(mut self, retries: u32) -> Self {
        self.alloc_retries = retries;
        self
    }

    pub fn with_feedback_sample(mut self, sample: usize) -> Self {
        self.feedback_sample = sample;
        self
    }

    pub fn with_feedback_k(mut self, k: usize) -> Self {
        self.feedback_k = k;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.k == 0 {
            return Err(MatchError::InvalidConfig("k must be >= 1".into()));
        }
        if self.threads == 0 {
            return Err(MatchError::InvalidConfig("threads must be >= 1".into()));
        }
        if self.cache_size_mb == 0 {
            return Err(MatchError::InvalidConfig(
                "cache_size_mb must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Settings specific to ISSL search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IsslConfig {
    /// Per-slice Hamming radius; masks with more set bits are not visited.
    pub max_distance: usize,
    /// Query documents scored together in one sweep.
    pub lookahead: usize,
}

impl Default for IsslConfig {
    fn default() -> Self {
        Self {
            max_distance: 3,
            lookahead: 1,
        }
    }
}

impl IsslConfig {
    pub fn with_max_distance(mut self, d: usize) -> Self {
        self.max_distance = d;
        self
    }

    pub fn with_lookahead(mut self, n: usize) -> Self {
        self.lookahead = n;
        self
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        if self.lookahead == 0 {
            return Err(MatchError::InvalidConfig("lookahead must be >= 1".into()));
        }
        Ok(())
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub docid: String,
    /// xxh3 of `docid`, compared before the string when deduplicating.
    pub docid_hash: u64,
    /// Record index in the searched signature file.
    pub record: usize,
    #[serde(skip)]
    pub bits: Vec<u8>,
    pub distance: u32,
    pub quality: i32,
    pub offset_begin: i32,
    pub offset_end: i32,
}

impl SearchResult {
    pub fn same_document(&self, other: &SearchResult) -> bool {
        self.docid_hash == other.docid_hash && self.docid == other.docid
    }

    /// Ranking order: lower distance, then higher quality, then docid.
    pub fn rank_cmp(&self, other: &SearchResult) -> Ordering {
        rank_order(
            (self.distance, self.quality, self.docid.as_bytes()),
            (other.distance, other.quality, other.docid.as_bytes()),
        )
    }
}

/// Compare two `(distance, quality, docid)` keys in ranking order.
#[inline]
pub fn rank_order(a: (u32, i32, &[u8]), b: (u32, i32, &[u8])) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.2.cmp(b.2))
}

pub fn docid_hash(docid: &[u8]) -> u64 {
    xxh3_64(docid)
}

/// A ranked result list, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    entries: Vec<SearchResult>,
}

impl Results {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort `entries` into ranking order.
    pub fn from_unsorted(mut entries: Vec<SearchResult>) -> Self {
        entries.sort_by(SearchResult::rank_cmp);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&SearchResult> {
        self.entries.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[SearchResult] {
        &self.entries
    }

    pub fn into_vec(self) -> Vec<SearchResult> {
        self.entries
    }

    pub fn docids(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.docid.as_str()).collect()
    }

    /// `(docid, rank, distance, quality)` for each entry, rank from 1.
    pub fn ranked(&self) -> impl Iterator<Item = (&str, usize, u32, i32)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, r)| (r.docid.as_str(), i + 1, r.distance, r.quality))
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Results {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Errors that can occur while searching.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MatchError {
    /// Invalid configuration.
    #[error("invalid search config: {0}")]
    InvalidConfig(String),
    /// A document named by the caller is not in the signature file.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    /// Signature file or ISSL read failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    /// Query signature could not be built.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    /// Query text could not be tokenized.
    #[error("tokenizer error: {0}")]
    Canonical(#[from] CanonicalError),
    /// A run or topic file line could not be parsed.
    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: usize, reason: String },
    /// Result output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
