use std::io;

use canonical::CanonicalError;
use index::IndexError;
use ingest::IngestError;
use matcher::MatchError;
use signature::SignatureError;
use thiserror::Error;

use crate::config::ConfigLoadError;

/// Errors that can abort an indexing or search run.
///
/// There is no partial-results mode: the first error stops the run and is
/// returned to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopsigError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigLoadError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("signature failure: {0}")]
    Signature(#[from] SignatureError),

    #[error("tokenization failure: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("ingest failure: {0}")]
    Ingest(#[from] IngestError),

    #[error("signature file failure: {0}")]
    Index(#[from] IndexError),

    #[error("search failure: {0}")]
    Match(#[from] MatchError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A run file names a topic the topic file does not define.
    #[error("topic {0} is not in the topic file")]
    UnknownTopic(String),

    /// A pipeline thread stopped before its work was written.
    #[error("indexing pipeline stopped: {0}")]
    Pipeline(String),
}

impl TopsigError {
    /// Whether the error comes from a malformed or incompatible file.
    pub fn is_format(&self) -> bool {
        match self {
            TopsigError::Index(e) => e.is_format(),
            TopsigError::Match(MatchError::Index(e)) => e.is_format(),
            _ => false,
        }
    }
}
