//! TopSig Ingest Layer
//!
//! This is where documents enter TopSig. A run selects one archive format,
//! lists its targets, and streams `(id, text)` documents into whatever sink
//! the caller provides, usually the indexing pipeline.
//!
//! ## What we do here
//!
//! - **Enumerate targets** - files as given, directories one level deep.
//! - **Frame archives** - plain files, tar, WARC, WSJ SGML, one-per-line and
//!   crawl dumps, all streamed through a buffered reader.
//! - **Name documents** - path, basename or an XML field for formats that do
//!   not carry their own identifiers.
//!
//! ## Example
//!
//! ```
//! use ingest::{ArchiveFormat, ArchiveReader, Document, IngestConfig, IngestError};
//!
//! let cfg = IngestConfig::new().with_format(ArchiveFormat::Newline);
//! let mut docs: Vec<Document> = Vec::new();
//! ArchiveReader::new(&cfg)
//!     .read("inline", &b"first line\nsecond line\n"[..], |doc| {
//!         docs.push(doc);
//!         Ok::<(), IngestError>(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(docs[0].id, "0001");
//! assert_eq!(docs[1].text, "second line");
//! ```

mod config;
mod document;
mod error;
mod readers;
mod targets;

pub use crate::config::{ArchiveFormat, DocIdFormat, IngestConfig};
pub use crate::document::{document_id, Document};
pub use crate::error::IngestError;
pub use crate::readers::ArchiveReader;
pub use crate::targets::{enumerate_targets, read_targets};
