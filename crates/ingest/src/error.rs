//! Error types produced by the ingest crate.
//!
//! Readers never skip malformed input silently: a record that cannot be
//! framed aborts the archive with [`IngestError::Format`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while enumerating targets or reading archives.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    /// Reading a target failed at the OS level.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive does not follow its declared format.
    #[error("malformed {format} archive: {reason}")]
    Format { format: &'static str, reason: String },

    /// Invalid or incomplete ingest configuration.
    #[error("invalid ingest configuration: {0}")]
    InvalidConfig(String),
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(format: &'static str, reason: impl Into<String>) -> Self {
        IngestError::Format {
            format,
            reason: reason.into(),
        }
    }
}
