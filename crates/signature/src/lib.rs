//! # Topsig Signatures
//!
//! Random-projection signatures for documents and queries.
//!
//! Every term is mapped to a sparse ternary vector of `W` slots by a
//! [`RandomProjector`] seeded from the term's bytes. A document's signature is
//! the sum of its term vectors weighted by term frequency; flattening keeps the
//! sign of every slot (`bits`) and whether it was touched at all (`mask`).
//! Similar documents share vocabulary, so their sums agree on most signs and
//! the Hamming distance between their bits is small.
//!
//! ## Contract
//!
//! - The crate consumes already-tokenized terms. It never reads files,
//!   tokenizes, or stems.
//! - For the same terms and the same [`SignatureConfig`] (ignoring the cache
//!   size) the flattened output is bit identical across processes.
//!
//! ## Example Usage
//!
//! ```
//! use signature::{signature_for_terms, SignatureConfig};
//!
//! let cfg = SignatureConfig::new().with_width(64).with_density(2);
//! let sig = signature_for_terms("doc-1", ["the", "quick", "brown", "fox"], &cfg).unwrap();
//! let flat = sig.finalize();
//!
//! assert_eq!(flat.bits.len(), 8);
//! assert_eq!(sig.meta.unique_terms, 4);
//! ```
pub mod builder;
pub mod cache;
pub mod config;
pub mod projector;
pub mod signature;

pub use crate::builder::{feedback_signature, SignatureBuilder};
pub use crate::cache::TermVectorCache;
pub use crate::config::{ProjectionMethod, SignatureConfig, SignatureError};
pub use crate::projector::{RandomProjector, TermVector};
pub use crate::signature::{bit_at, FlatSignature, Signature, SignatureMeta};

/// Build one signature without keeping a builder around.
///
/// Convenient for queries; indexing should hold a [`SignatureBuilder`] so the
/// term vector cache survives across documents.
pub fn signature_for_terms<'a, I>(
    id: impl Into<String>,
    terms: I,
    cfg: &SignatureConfig,
) -> Result<Signature, SignatureError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut builder = SignatureBuilder::new(&cfg.clone().with_term_cache_size(0))?;
    builder.build(id, terms)
}
