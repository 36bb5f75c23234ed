//! # TopSig Matcher (`matcher`)
//!
//! ## Purpose
//!
//! `matcher` answers nearest-neighbour queries over a signature file written
//! by `index`. Queries are flattened signatures, built from text with a
//! [`QueryEncoder`] or taken from stored records, and results are ranked by
//! masked Hamming distance.
//!
//! ## Core Types
//!
//! - [`Searcher`]: exhaustive scan. The file is cached whole when it fits in
//!   `cache_size_mb`, otherwise read page by page with the per-page results
//!   merged. Each page is split across `threads` workers.
//! - [`IsslSearcher`]: approximate search through an [`index::IsslIndex`],
//!   with exact rescoring of the selected candidates and document-as-query
//!   batches.
//! - [`TopK`] and [`merge_results`]: bounded selection and deduplicating
//!   merge, both in the order distance, then quality (higher first), then
//!   docid.
//! - [`TrecWriter`]: TREC run output.
//!
//! ## Example Usage
//!
//! ```no_run
//! use canonical::TokenizeConfig;
//! use matcher::{QueryEncoder, SearchConfig, Searcher, TrecWriter};
//!
//! let mut searcher = Searcher::open("collection.sig", SearchConfig::default())?;
//! let sig_cfg = searcher.file().header().signature_config();
//! let mut encoder = QueryEncoder::new(&sig_cfg, &TokenizeConfig::default())?;
//!
//! let query = encoder.encode("401", "international organized crime")?;
//! let results = searcher.search(&query.signature, 10)?;
//!
//! let mut out = TrecWriter::new(std::io::stdout().lock(), "Topsig");
//! out.write_results(&query.id, &results)?;
//! # Ok::<(), matcher::MatchError>(())
//! ```

pub mod distance;
pub mod engine;
pub mod feedback;
pub mod issl;
pub mod merge;
pub mod query;
pub mod topk;
pub mod trec;
pub mod types;

pub use crate::distance::{document_distance, hamming};
pub use crate::engine::Searcher;
pub use crate::feedback::{blind_feedback, explicit_feedback, rerank_results};
pub use crate::issl::{extract_topk, extract_topk_by, IsslSearcher};
pub use crate::merge::{merge_results, SENTINEL_DISTANCE};
pub use crate::query::{Query, QueryEncoder};
pub use crate::topk::{Candidate, TopK};
pub use crate::trec::{read_run, RunTopic, TrecWriter, TREC_SCORE_BASE};
pub use crate::types::{IsslConfig, MatchError, Results, SearchConfig, SearchResult};
