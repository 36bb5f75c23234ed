//! Relevance feedback.
//!
//! Both variants build a new query from the bits of top-ranked documents
//! (earlier ranks weigh more) and re-rank an existing result list against
//! it. The feedback query is built from full stored signatures, so its mask
//! covers every bit.

use signature::{feedback_signature, FlatSignature};
use tracing::debug;

use crate::distance::document_distance;
use crate::types::{MatchError, Results};

/// Recompute every result's distance to `query` and sort again.
pub fn rerank_results(results: Results, query: &FlatSignature) -> Results {
    let mut entries = results.into_vec();
    for r in &mut entries {
        r.distance = document_distance(&r.bits, &query.bits, &query.mask);
    }
    Results::from_unsorted(entries)
}

/// Combine the top `sample` entries of `ranked` into one query.
pub fn feedback_query(ranked: &Results, sample: usize, width: usize) -> Result<FlatSignature, MatchError> {
    let bits: Vec<&[u8]> = ranked.iter().map(|r| r.bits.as_slice()).collect();
    let sig = feedback_signature("feedback", width, &bits, sample)?;
    Ok(sig.finalize())
}

/// Pseudo-relevance feedback: re-rank `results` against a query built from
/// their own top `sample` entries. A zero sample leaves them untouched.
pub fn blind_feedback(results: Results, sample: usize, width: usize) -> Result<Results, MatchError> {
    if sample == 0 || results.is_empty() {
        return Ok(results);
    }
    let query = feedback_query(&results, sample, width)?;
    debug!(sample, results = results.len(), "applying blind feedback");
    Ok(rerank_results(results, &query))
}

/// Explicit feedback: re-rank `results` against a query built from the top
/// `feedback_k` entries of `feedback`, the results of the feedback text.
pub fn explicit_feedback(
    results: Results,
    feedback: &Results,
    feedback_k: usize,
    width: usize,
) -> Result<Results, MatchError> {
    if feedback_k == 0 || feedback.is_empty() {
        return Ok(results);
    }
    let query = feedback_query(feedback, feedback_k, width)?;
    debug!(feedback_k, "applying explicit feedback");
    Ok(rerank_results(results, &query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{docid_hash, SearchResult};

    fn result(docid: &str, bits: Vec<u8>, distance: u32) -> SearchResult {
        SearchResult {
            docid: docid.into(),
            docid_hash: docid_hash(docid.as_bytes()),
            record: 0,
            bits,
            distance,
            quality: 0,
            offset_begin: 0,
            offset_end: 0,
        }
    }

    #[test]
    fn rerank_orders_by_new_distance() {
        let results = Results::from_unsorted(vec![
            result("a", vec![0x00, 0x00], 0),
            result("b", vec![0xFF, 0xFF], 1),
        ]);
        let query = FlatSignature::from_bits(vec![0xFF, 0xFF]);
        let reranked = rerank_results(results, &query);
        assert_eq!(reranked.docids(), vec!["b", "a"]);
        assert_eq!(reranked.get(1).unwrap().distance, 16);
    }

    #[test]
    fn blind_feedback_follows_the_top_result() {
        // The top result dominates the feedback query, so documents that
        // agree with it move ahead of ones that only matched the original.
        let results = Results::from_unsorted(vec![
            result("top", vec![0xF0, 0xF0], 0),
            result("near", vec![0xF0, 0xF1], 1),
            result("far", vec![0x0F, 0x0F], 1),
        ]);
        let reranked = blind_feedback(results, 1, 16).unwrap();
        assert_eq!(reranked.docids(), vec!["top", "near", "far"]);
        assert_eq!(reranked.get(0).unwrap().distance, 0);
        assert_eq!(reranked.get(2).unwrap().distance, 16);
    }

    #[test]
    fn zero_sample_is_a_no_op() {
        let results = Results::from_unsorted(vec![result("a", vec![1, 2], 3)]);
        let same = blind_feedback(results.clone(), 0, 16).unwrap();
        assert_eq!(same, results);
    }

    #[test]
    fn explicit_feedback_uses_the_feedback_results() {
        let results = Results::from_unsorted(vec![
            result("a", vec![0x00, 0x00], 0),
            result("b", vec![0xFF, 0x00], 2),
        ]);
        let feedback = Results::from_unsorted(vec![result("f", vec![0xFF, 0x00], 0)]);
        let reranked = explicit_feedback(results, &feedback, 1, 16).unwrap();
        assert_eq!(reranked.docids(), vec!["b", "a"]);
    }

    #[test]
    fn width_mismatch_surfaces() {
        let results = Results::from_unsorted(vec![result("a", vec![1, 2], 0)]);
        assert!(matches!(
            blind_feedback(results, 1, 32),
            Err(MatchError::Signature(_))
        ));
    }
}
