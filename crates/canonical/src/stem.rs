//! Stemming seam.
//!
//! Stemming algorithms are supplied by the caller. The tokenizer only needs a
//! way to rewrite a folded term in place.

use std::fmt;

/// Rewrites a folded term into its stem.
pub trait Stemmer: Send + Sync {
    fn stem(&self, term: &mut String);
}

/// Leaves terms unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, _term: &mut String) {}
}

impl<F> Stemmer for F
where
    F: Fn(&mut String) + Send + Sync,
{
    fn stem(&self, term: &mut String) {
        self(term)
    }
}

pub(crate) struct DynStemmer(pub(crate) Box<dyn Stemmer>);

impl fmt::Debug for DynStemmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stemmer")
    }
}
