//! Bounded best-k selection.
//!
//! The buffer fills to `k` and from then on only tracks its worst entry.
//! A candidate is compared against that entry alone; the worst is found
//! again only after a replacement has invalidated it.

use std::cmp::Ordering;

use index::RecordView;

use crate::types::{docid_hash, rank_order, Results, SearchResult};

/// A scored record that has not been copied out of its page yet.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub record: usize,
    pub docid: &'a [u8],
    pub bits: &'a [u8],
    pub distance: u32,
    pub quality: i32,
    pub offset_begin: i32,
    pub offset_end: i32,
}

impl<'a> Candidate<'a> {
    pub fn from_view(record: usize, view: &RecordView<'a>, distance: u32) -> Self {
        let meta = view.meta();
        Self {
            record,
            docid: view.name_bytes(),
            bits: view.bits(),
            distance,
            quality: meta.quality,
            offset_begin: meta.offset_begin,
            offset_end: meta.offset_end,
        }
    }

    fn key(&self) -> (u32, i32, &[u8]) {
        (self.distance, self.quality, self.docid)
    }

    fn to_result(self, hash: u64) -> SearchResult {
        SearchResult {
            docid: String::from_utf8_lossy(self.docid).into_owned(),
            docid_hash: hash,
            record: self.record,
            bits: self.bits.to_vec(),
            distance: self.distance,
            quality: self.quality,
            offset_begin: self.offset_begin,
            offset_end: self.offset_end,
        }
    }
}

fn key_of(r: &SearchResult) -> (u32, i32, &[u8]) {
    (r.distance, r.quality, r.docid.as_bytes())
}

#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    entries: Vec<SearchResult>,
    worst: Option<usize>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            entries: Vec::with_capacity(k),
            worst: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.k
    }

    fn worst_index(&mut self) -> usize {
        if let Some(w) = self.worst {
            return w;
        }
        let mut w = 0;
        for i in 1..self.entries.len() {
            if self.entries[i].rank_cmp(&self.entries[w]) == Ordering::Greater {
                w = i;
            }
        }
        self.worst = Some(w);
        w
    }

    /// Offer a candidate. Returns whether it entered the buffer.
    pub fn offer(&mut self, c: &Candidate<'_>) -> bool {
        if self.k == 0 {
            return false;
        }
        let slot = if self.is_full() {
            let w = self.worst_index();
            if rank_order(c.key(), key_of(&self.entries[w])) != Ordering::Less {
                return false;
            }
            Some(w)
        } else {
            None
        };

        let hash = docid_hash(c.docid);
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.docid_hash == hash && e.docid.as_bytes() == c.docid)
        {
            if rank_order(c.key(), key_of(&self.entries[pos])) == Ordering::Less {
                self.entries[pos] = c.to_result(hash);
                self.worst = None;
                return true;
            }
            return false;
        }

        match slot {
            Some(w) => self.entries[w] = c.to_result(hash),
            None => self.entries.push(c.to_result(hash)),
        }
        self.worst = None;
        true
    }

    /// Offer an already materialized result.
    pub fn offer_result(&mut self, r: SearchResult) -> bool {
        let c = Candidate {
            record: r.record,
            docid: r.docid.as_bytes(),
            bits: &r.bits,
            distance: r.distance,
            quality: r.quality,
            offset_begin: r.offset_begin,
            offset_end: r.offset_end,
        };
        self.offer(&c)
    }

    pub fn into_results(self) -> Results {
        Results::from_unsorted(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand<'a>(docid: &'a str, distance: u32, quality: i32) -> Candidate<'a> {
        Candidate {
            record: 0,
            docid: docid.as_bytes(),
            bits: &[],
            distance,
            quality,
            offset_begin: 0,
            offset_end: 0,
        }
    }

    #[test]
    fn keeps_the_best_k() {
        let mut top = TopK::new(3);
        for (i, d) in [9u32, 4, 7, 1, 8, 2, 6].iter().enumerate() {
            let name = format!("d{i}");
            top.offer(&cand(&name, *d, 0));
        }
        let results = top.into_results();
        let dists: Vec<u32> = results.iter().map(|r| r.distance).collect();
        assert_eq!(dists, vec![1, 2, 4]);
    }

    #[test]
    fn fewer_candidates_than_k() {
        let mut top = TopK::new(10);
        top.offer(&cand("a", 3, 0));
        top.offer(&cand("b", 1, 0));
        assert_eq!(top.len(), 2);
        assert_eq!(top.into_results().docids(), vec!["b", "a"]);
    }

    #[test]
    fn duplicate_docids_keep_the_better_entry() {
        let mut top = TopK::new(3);
        assert!(top.offer(&cand("a", 5, 0)));
        assert!(top.offer(&cand("a", 2, 0)));
        assert!(!top.offer(&cand("a", 4, 0)));
        top.offer(&cand("b", 3, 0));
        let results = top.into_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results.get(0).unwrap().distance, 2);
    }

    #[test]
    fn ties_resolve_by_quality_then_docid() {
        let mut top = TopK::new(2);
        top.offer(&cand("c", 1, 0));
        top.offer(&cand("b", 1, 0));
        top.offer(&cand("a", 1, 0));
        top.offer(&cand("z", 1, 3));
        assert_eq!(top.into_results().docids(), vec!["z", "a"]);
    }

    #[test]
    fn zero_k_accepts_nothing() {
        let mut top = TopK::new(0);
        assert!(!top.offer(&cand("a", 0, 0)));
        assert!(top.is_empty());
    }
}
