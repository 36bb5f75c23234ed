//! Accumulating term vectors into document and query signatures.

use fxhash::FxHashMap;

use crate::cache::TermVectorCache;
use crate::config::{SignatureConfig, SignatureError};
use crate::projector::RandomProjector;
use crate::signature::{bit_at, Signature};

/// Builds signatures from terms, reusing a private term vector cache.
///
/// A builder is `Send` but deliberately not shared: every indexing worker owns
/// one, so the cache is mutated without locks.
#[derive(Debug)]
pub struct SignatureBuilder {
    config: SignatureConfig,
    projector: RandomProjector,
    cache: TermVectorCache,
}

impl SignatureBuilder {
    pub fn new(config: &SignatureConfig) -> Result<Self, SignatureError> {
        let projector = RandomProjector::new(config)?;
        let cache = TermVectorCache::new(config.term_cache_size, config.width);
        Ok(Self {
            config: config.clone(),
            projector,
            cache,
        })
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn cache(&self) -> &TermVectorCache {
        &self.cache
    }

    /// A zeroed accumulator for document `id`.
    pub fn new_accumulator(&self, id: impl Into<String>) -> Signature {
        Signature::new(id, self.config.width)
    }

    /// Add `count` copies of `term`'s vector into `sig`.
    pub fn add(&mut self, sig: &mut Signature, term: &str, count: i32) -> Result<(), SignatureError> {
        if sig.width() != self.config.width {
            return Err(SignatureError::WidthMismatch {
                expected: self.config.width,
                actual: sig.width(),
            });
        }
        let vector = self.cache.vector(&self.projector, term);
        sig.add_scaled(vector, count);
        Ok(())
    }

    /// Add a bag of terms, updating the unique and total term counts.
    pub fn add_terms<'a, I>(&mut self, sig: &mut Signature, terms: I) -> Result<(), SignatureError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: FxHashMap<&'a str, i32> = FxHashMap::default();
        for term in terms {
            *counts.entry(term).or_insert(0) += 1;
        }
        let mut total = 0i32;
        for (&term, &count) in &counts {
            self.add(sig, term, count)?;
            total += count;
        }
        sig.meta.unique_terms += counts.len() as i32;
        sig.meta.total_terms += total;
        Ok(())
    }

    /// Build a complete signature for `id` from its term stream.
    pub fn build<'a, I>(&mut self, id: impl Into<String>, terms: I) -> Result<Signature, SignatureError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sig = self.new_accumulator(id);
        self.add_terms(&mut sig, terms)?;
        Ok(sig)
    }
}

/// Combine the top-ranked flattened signatures into a feedback query.
///
/// Result `i` contributes `exp(-i^2 / (sample / 2))` times `+1` or `-1` per
/// bit, so the first results dominate. At most `sample` signatures are used.
pub fn feedback_signature(
    id: impl Into<String>,
    width: usize,
    ranked: &[&[u8]],
    sample: usize,
) -> Result<Signature, SignatureError> {
    let used = sample.min(ranked.len());
    let half = sample as f64 / 2.0;
    let mut weights = vec![0.0f64; width];
    for (i, bits) in ranked.iter().take(used).enumerate() {
        if bits.len() * 8 != width {
            return Err(SignatureError::WidthMismatch {
                expected: width,
                actual: bits.len() * 8,
            });
        }
        let di = i as f64;
        let decay = (-di * di / half).exp();
        for (j, w) in weights.iter_mut().enumerate() {
            *w += if bit_at(bits, j) { decay } else { -decay };
        }
    }
    Ok(Signature::from_weights(id, &weights))
}
