//! Configuration types for the tokenizer.
//!
//! [`TokenizeConfig`] controls which characters form terms, whether markup is
//! skipped, and how terms are folded before they reach the signature layer.
//! Index-time and query-time tokenization must use the same configuration,
//! otherwise identical text produces different term vectors.
//!
//! # Examples
//!
//! ```rust
//! use canonical::{CharMask, TokenizeConfig};
//!
//! let config = TokenizeConfig::default();
//! assert_eq!(config.charmask, CharMask::Alpha);
//! assert!(config.lowercase);
//! assert!(config.stopwords);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CanonicalError;

/// Character class accepted inside a term. Everything else delimits terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CharMask {
    /// Alphabetic characters only.
    #[default]
    Alpha,
    /// Alphabetic characters and digits.
    Alnum,
    /// Every printable, non-whitespace character.
    All,
}

impl CharMask {
    #[inline]
    pub fn accepts(&self, ch: char) -> bool {
        match self {
            CharMask::Alpha => ch.is_alphabetic(),
            CharMask::Alnum => ch.is_alphanumeric(),
            CharMask::All => !ch.is_whitespace() && !ch.is_control(),
        }
    }
}

impl FromStr for CharMask {
    type Err = CanonicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(CharMask::Alpha),
            "alnum" => Ok(CharMask::Alnum),
            "all" => Ok(CharMask::All),
            other => Err(CanonicalError::InvalidConfig(format!(
                "unknown charmask {other:?}; expected alpha, alnum or all"
            ))),
        }
    }
}

impl fmt::Display for CharMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CharMask::Alpha => "alpha",
            CharMask::Alnum => "alnum",
            CharMask::All => "all",
        })
    }
}

/// Markup handling applied before the character mask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkupFilter {
    #[default]
    None,
    /// Skip `<...>` tags and `&...;` entities; both act as delimiters.
    Xml,
}

impl FromStr for MarkupFilter {
    type Err = CanonicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(MarkupFilter::None),
            "xml" => Ok(MarkupFilter::Xml),
            other => Err(CanonicalError::InvalidConfig(format!(
                "unknown markup filter {other:?}; expected none or xml"
            ))),
        }
    }
}

/// Configuration for turning document text into terms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenizeConfig {
    /// Characters that may appear inside a term.
    pub charmask: CharMask,
    /// Markup filter applied to the raw text.
    pub filter: MarkupFilter,
    /// Fold terms to lowercase.
    pub lowercase: bool,
    /// Apply Unicode NFKC normalization before scanning.
    pub normalize_unicode: bool,
    /// Terms longer than this many bytes are dropped rather than clipped.
    pub max_term_len: usize,
    /// Drop terms found in the built-in English stopword list.
    pub stopwords: bool,
}

impl TokenizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_charmask(mut self, charmask: CharMask) -> Self {
        self.charmask = charmask;
        self
    }

    pub fn with_filter(mut self, filter: MarkupFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_normalize_unicode(mut self, normalize: bool) -> Self {
        self.normalize_unicode = normalize;
        self
    }

    pub fn with_max_term_len(mut self, len: usize) -> Self {
        self.max_term_len = len;
        self
    }

    pub fn with_stopwords(mut self, stopwords: bool) -> Self {
        self.stopwords = stopwords;
        self
    }

    pub fn validate(&self) -> Result<(), CanonicalError> {
        if self.max_term_len == 0 {
            return Err(CanonicalError::InvalidConfig(
                "max_term_len must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TokenizeConfig {
    fn default() -> Self {
        Self {
            charmask: CharMask::Alpha,
            filter: MarkupFilter::None,
            lowercase: true,
            normalize_unicode: true,
            max_term_len: 32,
            stopwords: true,
        }
    }
}
