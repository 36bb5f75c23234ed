//! TopSig term extraction.
//!
//! Turns raw document text into the terms the signature layer projects.
//!
//! ## What we do
//!
//! - Optional NFKC normalization
//! - Character-class masking (`alpha`, `alnum`, `all`)
//! - Optional XML tag and entity skipping
//! - Lowercase folding, pluggable stemming, English stopword removal
//! - Byte offsets and sentence boundaries for document splitting
//!
//! Output depends only on text + config, so index and query sides agree.

mod config;
mod error;
mod stem;
mod stopwords;
mod token;
mod tokenizer;

pub use crate::config::{CharMask, MarkupFilter, TokenizeConfig};
pub use crate::error::CanonicalError;
pub use crate::stem::{IdentityStemmer, Stemmer};
pub use crate::stopwords::Stopwords;
pub use crate::token::Token;
pub use crate::tokenizer::Tokenizer;

/// Tokenize with a one-off [`Tokenizer`].
pub fn tokenize(text: &str, cfg: &TokenizeConfig) -> Result<Vec<Token>, CanonicalError> {
    Ok(Tokenizer::new(cfg)?.tokenize(text))
}
