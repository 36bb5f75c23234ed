use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{Results, SearchResult};

/// Distance given to the losing copy of a duplicated document.
pub const SENTINEL_DISTANCE: u32 = u32::MAX;

/// Merge two ranked lists into one list of at most `k`.
///
/// Each document keeps only its best-ranked entry, whichever list (or lists)
/// it repeats in; every other copy is pushed to [`SENTINEL_DISTANCE`] and
/// dropped.
pub fn merge_results(a: Results, b: Results, k: usize) -> Results {
    let mut entries: Vec<SearchResult> = Vec::with_capacity(a.len() + b.len());
    let mut by_hash: HashMap<u64, Vec<usize>> = HashMap::with_capacity(a.len() + b.len());

    for r in a.into_vec().into_iter().chain(b.into_vec()) {
        let twin = by_hash.get(&r.docid_hash).and_then(|idx| {
            idx.iter()
                .copied()
                .find(|&i| entries[i].distance != SENTINEL_DISTANCE && entries[i].docid == r.docid)
        });
        match twin {
            Some(i) if r.rank_cmp(&entries[i]) != Ordering::Less => continue,
            Some(i) => entries[i].distance = SENTINEL_DISTANCE,
            None => {}
        }
        by_hash.entry(r.docid_hash).or_default().push(entries.len());
        entries.push(r);
    }

    entries.retain(|r| r.distance != SENTINEL_DISTANCE);
    let mut merged = Results::from_unsorted(entries).into_vec();
    merged.truncate(k);
    Results::from_unsorted(merged)
}
