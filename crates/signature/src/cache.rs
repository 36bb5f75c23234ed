//! Bounded cache of recently projected term vectors.
//!
//! Projection dominates indexing cost when the same vocabulary recurs across
//! documents. The cache is a fixed ring of slots: a miss projects the term
//! and overwrites the oldest slot, regardless of how often that slot was hit.
//! A cache is owned by a single builder and is never shared between threads.

use fxhash::FxHashMap;

use crate::projector::RandomProjector;

#[derive(Debug)]
struct CacheSlot {
    term: Box<str>,
    vector: Box<[i8]>,
}

/// Ring-buffer term vector cache.
#[derive(Debug)]
pub struct TermVectorCache {
    capacity: usize,
    slots: Vec<CacheSlot>,
    lookup: FxHashMap<Box<str>, usize>,
    next: usize,
    scratch: Box<[i8]>,
    hits: u64,
    misses: u64,
}

impl TermVectorCache {
    /// Create a cache with `capacity` slots; `0` disables caching and every
    /// lookup projects into an internal scratch buffer.
    pub fn new(capacity: usize, width: usize) -> Self {
        Self {
            capacity,
            slots: Vec::with_capacity(capacity.min(1 << 16)),
            lookup: FxHashMap::default(),
            next: 0,
            scratch: vec![0i8; width].into_boxed_slice(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.lookup.contains_key(term)
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Return the vector for `term`, projecting it on a miss.
    pub fn vector(&mut self, projector: &RandomProjector, term: &str) -> &[i8] {
        if let Some(&idx) = self.lookup.get(term) {
            self.hits += 1;
            return &self.slots[idx].vector;
        }
        self.misses += 1;

        if self.capacity == 0 {
            projector.project_into(term, &mut self.scratch);
            return &self.scratch;
        }

        let idx = self.next;
        self.next = (self.next + 1) % self.capacity;

        if idx < self.slots.len() {
            let slot = &mut self.slots[idx];
            self.lookup.remove(&slot.term);
            projector.project_into(term, &mut slot.vector);
            slot.term = term.into();
        } else {
            self.slots.push(CacheSlot {
                term: term.into(),
                vector: projector.project(term),
            });
        }
        self.lookup.insert(term.into(), idx);
        &self.slots[idx].vector
    }
}
