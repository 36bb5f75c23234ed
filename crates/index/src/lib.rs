//! # TopSig Index
//!
//! Persistent storage for document signatures and the inverted slice-list
//! (ISSL) index built over them.
//!
//! ## Core Features
//!
//! - **Signature files**: a fixed header followed by fixed-size records, so
//!   record `i` lives at `header_size + i * record_size` and can be read
//!   without scanning. [`SignatureFileWriter`] appends, [`SignatureFile`]
//!   reads single records, pages, or streams the whole file.
//! - **ISSL**: [`IsslIndex`] buckets every 16-bit slice of every signature
//!   by value. Scoring a query visits only the buckets within a per-slice
//!   Hamming radius, making approximate search sub-linear.
//! - **Bounded allocation retry**: page caches and slice tables are sized
//!   by the collection. [`acquire_buffer`] retries failed reservations with
//!   a yield and reports [`IndexError::ResourceExhausted`] past the cap.
//!
//! ## Example Usage
//!
//! ```
//! use index::{IsslIndex, SignatureFile, SignatureFileWriter};
//! use signature::{SignatureConfig, SignatureMeta};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("collection.sig");
//! let cfg = SignatureConfig::new().with_width(32).with_density(4);
//!
//! let mut writer = SignatureFileWriter::create(&path, &cfg).unwrap();
//! writer
//!     .append_record("doc-1", &SignatureMeta::default(), &[0xDE, 0xAD, 0xBE, 0xEF])
//!     .unwrap();
//! writer.finish().unwrap();
//!
//! let file = SignatureFile::open(&path).unwrap();
//! let issl = IsslIndex::build(&file, 0).unwrap();
//! let scores = issl.score(&[0xDE, 0xAD, 0xBE, 0xEF], 0, 0).unwrap();
//! assert_eq!(scores, vec![32]);
//! ```

use std::io;
use std::path::Path;

use signature::SignatureError;
use thiserror::Error;

pub mod alloc;
mod format;
mod issl;
mod reader;
mod writer;

pub use crate::alloc::{acquire_buffer, acquire_buffer_with, DEFAULT_ALLOC_RETRIES};
pub use crate::format::{
    FileHeader, RecordLayout, RecordView, SignatureRecord, FORMAT_VERSION, METHOD_FIELD_LEN,
};
pub use crate::issl::{slice_value, IsslIndex, MaskTable, BUCKETS, SLICE_BITS};
pub use crate::reader::{RecordPage, SignatureFile};
pub use crate::writer::SignatureFileWriter;

/// Errors from reading, writing or indexing signature files.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed signature data: {reason}")]
    Format { reason: String },

    #[error("signature width mismatch: expected {expected} bits, found {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("truncated signature data: {0}")]
    Truncated(String),

    #[error("incompatible index: {0}")]
    IncompatibleIndex(String),

    #[error("could not allocate {bytes} bytes after {attempts} retries")]
    ResourceExhausted { bytes: usize, attempts: u32 },

    #[error("record {index} out of range (file holds {len})")]
    OutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl IndexError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        IndexError::Format {
            reason: reason.into(),
        }
    }

    /// Attach `path` to format errors and turn early EOF into truncation.
    pub(crate) fn in_file(self, path: &Path) -> Self {
        match self {
            IndexError::Format { reason } => IndexError::Format {
                reason: format!("{}: {reason}", path.display()),
            },
            IndexError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                IndexError::Truncated(format!("{}: unexpected end of file", path.display()))
            }
            other => other,
        }
    }

    /// True for the errors that mean the data on disk cannot be trusted.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            IndexError::Format { .. }
                | IndexError::WidthMismatch { .. }
                | IndexError::Truncated(_)
                | IndexError::IncompatibleIndex(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_becomes_truncation() {
        let err = IndexError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))
            .in_file(Path::new("x.sig"));
        assert!(matches!(err, IndexError::Truncated(ref m) if m.contains("x.sig")));
        assert!(err.is_format());
    }

    #[test]
    fn format_reason_names_the_file() {
        let err = IndexError::format("bad").in_file(Path::new("y.issl"));
        assert_eq!(err.to_string(), "malformed signature data: y.issl: bad");
    }
}
