//! Workspace umbrella crate for TopSig signature search.
//!
//! TopSig represents every document as a short binary signature built by
//! random projection of its terms. Similar documents get signatures that are
//! close in Hamming distance, so retrieval is a nearest-neighbour search over
//! bit strings, either exhaustive or through the ISSL bit-slice index.
//!
//! This crate wires the stage crates together:
//!
//! - [`config`]: one YAML file for a whole run, validated up front.
//! - [`pipeline`]: concurrent indexing of documents into a signature file,
//!   with optional document splitting.
//! - [`topics`] and [`run`]: topic files and the drivers behind each
//!   `topsig` command.
//!
//! ```no_run
//! use topsig::{index_collection, run_topics, TopsigConfig};
//!
//! let cfg = TopsigConfig::from_file("topsig.yaml")?;
//! let stats = index_collection(&cfg)?;
//! println!("{} signatures written", stats.signatures);
//! run_topics(&cfg, std::io::stdout().lock())?;
//! # Ok::<(), topsig::TopsigError>(())
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod run;
pub mod split;
pub mod topics;

pub use canonical::{CanonicalError, CharMask, MarkupFilter, Token, TokenizeConfig, Tokenizer};
pub use index::{IndexError, IsslIndex, SignatureFile, SignatureFileWriter, SignatureRecord};
pub use ingest::{ArchiveFormat, DocIdFormat, Document, IngestConfig, IngestError};
pub use matcher::{
    IsslConfig, IsslSearcher, MatchError, QueryEncoder, Results, SearchConfig, SearchResult,
    Searcher, TrecWriter,
};
pub use signature::{
    FlatSignature, ProjectionMethod, Signature, SignatureBuilder, SignatureConfig, SignatureError,
    SignatureMeta,
};

pub use crate::config::{ConfigLoadError, TopicFormat, TopsigConfig};
pub use crate::error::TopsigError;
pub use crate::pipeline::{IndexingPipeline, PipelineConfig, PipelineStats};
pub use crate::run::{
    build_issl, index_collection, run_issl_search, run_rerank, run_topics, search_text,
};
pub use crate::split::{SplitPolicy, SplitType, TermSpan};
pub use crate::topics::{load_topics, read_topics, Topic};
