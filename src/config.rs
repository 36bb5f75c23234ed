//! YAML Configuration File Support for TopSig
//!
//! One YAML file describes a whole run: how signatures are built, how text
//! is tokenized, where documents come from, how the indexing pipeline is
//! sized and how searches are answered. The file is parsed and validated
//! once; the per-crate configs handed to the pipeline and searchers are then
//! derived from it and never change during the run.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "wsj collection"
//!
//! signature:
//!   width: 1024
//!   density: 21
//!   method: "traditional"
//!   seed: 0
//!   term_cache_size: 100000
//!   max_name_len: 255
//!
//! tokenize:
//!   charmask: "alpha"
//!   filter: "xml"
//!   max_term_len: 32
//!
//! ingest:
//!   format: "wsj"
//!   targets: ["/data/wsj"]
//!
//! pipeline:
//!   threads: 8
//!   queue_capacity: 512
//!   split:
//!     type: "sentence"
//!     min: 64
//!     max: 256
//!
//! search:
//!   k: 1000
//!   threads: 8
//!   cache_size_mb: 1024
//!
//! issl:
//!   max_distance: 3
//!   lookahead: 16
//!
//! topic:
//!   path: "/data/topics.txt"
//!   format: "wsj"
//!   run_id: "Topsig"
//!
//! paths:
//!   signature: "wsj.sig"
//!   issl: "wsj.issl"
//!   results: "run.txt"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use canonical::{CharMask, MarkupFilter, TokenizeConfig};
use ingest::{ArchiveFormat, DocIdFormat, IngestConfig};
use matcher::{IsslConfig, SearchConfig};
use serde::{Deserialize, Serialize};
use signature::{ProjectionMethod, SignatureConfig};
use thiserror::Error;

use crate::pipeline::{PipelineConfig, SplitPolicy, SplitType};

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown value {value:?} for {field}")]
    UnknownVariant { field: &'static str, value: String },

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

fn parse_variant<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigLoadError> {
    value.parse().map_err(|_| ConfigLoadError::UnknownVariant {
        field,
        value: value.to_string(),
    })
}

/// Top-level YAML configuration for a TopSig run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TopsigConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub signature: SignatureSection,

    #[serde(default)]
    pub tokenize: TokenizeSection,

    #[serde(default)]
    pub ingest: IngestSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub issl: IsslSection,

    #[serde(default)]
    pub topic: TopicSection,

    #[serde(default)]
    pub paths: PathsSection,
}

impl TopsigConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: TopsigConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section, including the enum-valued strings.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.signature_config()?;
        self.tokenize_config()?;
        self.ingest_config()?;
        self.pipeline_config()?;
        self.topic.validate()?;
        self.search
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("search: {e}")))?;
        self.issl_config()?;
        if let (Some(first), Some(last)) = (self.issl.first, self.issl.last) {
            if first > last {
                return Err(ConfigLoadError::Validation(format!(
                    "issl.first ({first}) is after issl.last ({last})"
                )));
            }
        }
        Ok(())
    }

    pub fn signature_config(&self) -> Result<SignatureConfig, ConfigLoadError> {
        let s = &self.signature;
        let cfg = SignatureConfig::new()
            .with_width(s.width)
            .with_density(s.density)
            .with_method(parse_variant::<ProjectionMethod>("signature.method", &s.method)?)
            .with_seed(s.seed)
            .with_term_cache_size(s.term_cache_size)
            .with_max_name_len(s.max_name_len);
        cfg.validate()
            .map_err(|e| ConfigLoadError::Validation(format!("signature: {e}")))?;
        Ok(cfg)
    }

    pub fn tokenize_config(&self) -> Result<TokenizeConfig, ConfigLoadError> {
        let t = &self.tokenize;
        let cfg = TokenizeConfig::new()
            .with_charmask(parse_variant::<CharMask>("tokenize.charmask", &t.charmask)?)
            .with_filter(parse_variant::<MarkupFilter>("tokenize.filter", &t.filter)?)
            .with_lowercase(t.lowercase)
            .with_normalize_unicode(t.normalize_unicode)
            .with_max_term_len(t.max_term_len)
            .with_stopwords(t.stopwords);
        cfg.validate()
            .map_err(|e| ConfigLoadError::Validation(format!("tokenize: {e}")))?;
        Ok(cfg)
    }

    /// The ingest settings. Targets are checked when a run reads them.
    pub fn ingest_config(&self) -> Result<IngestConfig, ConfigLoadError> {
        let i = &self.ingest;
        let mut cfg = IngestConfig::new()
            .with_format(parse_variant::<ArchiveFormat>("ingest.format", &i.format)?)
            .with_docid_format(parse_variant::<DocIdFormat>(
                "ingest.docid_format",
                &i.docid_format,
            )?);
        if let Some(field) = &i.xml_docid_field {
            cfg = cfg.with_xml_docid_field(field.clone());
        }
        for target in &i.targets {
            cfg = cfg.with_target(target.clone());
        }
        Ok(cfg)
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigLoadError> {
        let p = &self.pipeline;
        let kind = parse_variant::<SplitType>("pipeline.split.type", &p.split.kind)?;
        let cfg = PipelineConfig::new()
            .with_threads(p.threads)
            .with_queue_capacity(p.queue_capacity)
            .with_split(SplitPolicy::new(kind, p.split.min, p.split.max));
        cfg.validate()
            .map_err(|e| ConfigLoadError::Validation(format!("pipeline: {e}")))?;
        Ok(cfg)
    }

    pub fn search_config(&self) -> SearchConfig {
        self.search.clone()
    }

    pub fn issl_config(&self) -> Result<IsslConfig, ConfigLoadError> {
        let cfg = IsslConfig::default()
            .with_max_distance(self.issl.max_distance)
            .with_lookahead(self.issl.lookahead);
        cfg.validate()
            .map_err(|e| ConfigLoadError::Validation(format!("issl: {e}")))?;
        Ok(cfg)
    }

    /// Path of the signature file; every run needs one.
    pub fn signature_path(&self) -> Result<&Path, ConfigLoadError> {
        self.paths
            .signature
            .as_deref()
            .ok_or_else(|| ConfigLoadError::MissingField("paths.signature".into()))
    }

    pub fn issl_path(&self) -> Result<&Path, ConfigLoadError> {
        self.paths
            .issl
            .as_deref()
            .ok_or_else(|| ConfigLoadError::MissingField("paths.issl".into()))
    }
}

impl Default for TopsigConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            signature: SignatureSection::default(),
            tokenize: TokenizeSection::default(),
            ingest: IngestSection::default(),
            pipeline: PipelineSection::default(),
            search: SearchConfig::default(),
            issl: IsslSection::default(),
            topic: TopicSection::default(),
            paths: PathsSection::default(),
        }
    }
}

/// Signature construction YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSection {
    #[serde(default = "default_width")]
    pub width: usize,

    #[serde(default = "default_density")]
    pub density: usize,

    /// `traditional` or `skip`
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub seed: u32,

    #[serde(default = "default_term_cache_size")]
    pub term_cache_size: usize,

    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl Default for SignatureSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            density: default_density(),
            method: default_method(),
            seed: 0,
            term_cache_size: default_term_cache_size(),
            max_name_len: default_max_name_len(),
        }
    }
}

/// Tokenizer YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeSection {
    /// `alpha`, `alnum` or `all`
    #[serde(default = "default_charmask")]
    pub charmask: String,

    /// `none` or `xml`
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default = "true_value")]
    pub lowercase: bool,

    #[serde(default = "true_value")]
    pub normalize_unicode: bool,

    #[serde(default = "default_max_term_len")]
    pub max_term_len: usize,

    #[serde(default = "true_value")]
    pub stopwords: bool,
}

impl Default for TokenizeSection {
    fn default() -> Self {
        Self {
            charmask: default_charmask(),
            filter: default_filter(),
            lowercase: true,
            normalize_unicode: true,
            max_term_len: default_max_term_len(),
            stopwords: true,
        }
    }
}

/// Document source YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSection {
    /// `file`, `tar`, `warc`, `wsj`, `newline` or `customcrawl`
    #[serde(default = "default_format")]
    pub format: String,

    /// `path`, `basename.ext`, `basename` or `xmlfield`
    #[serde(default = "default_docid_format")]
    pub docid_format: String,

    #[serde(default)]
    pub xml_docid_field: Option<String>,

    #[serde(default)]
    pub targets: Vec<PathBuf>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            format: default_format(),
            docid_format: default_docid_format(),
            xml_docid_field: None,
            targets: Vec::new(),
        }
    }
}

/// Indexing pipeline YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Worker threads; `0` indexes on the calling thread.
    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub split: SplitSection,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            queue_capacity: default_queue_capacity(),
            split: SplitSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSection {
    /// `none`, `hard` or `sentence`
    #[serde(rename = "type", default = "default_split_type")]
    pub kind: String,

    #[serde(default)]
    pub min: usize,

    #[serde(default)]
    pub max: usize,
}

impl Default for SplitSection {
    fn default() -> Self {
        Self {
            kind: default_split_type(),
            min: 0,
            max: 0,
        }
    }
}

/// ISSL YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsslSection {
    #[serde(default = "default_max_distance")]
    pub max_distance: usize,

    #[serde(default = "default_lookahead")]
    pub lookahead: usize,

    /// First source record used as a query.
    #[serde(default)]
    pub first: Option<usize>,

    /// Last source record used as a query, inclusive.
    #[serde(default)]
    pub last: Option<usize>,

    /// Signature file the query documents come from; defaults to the
    /// indexed file.
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl IsslSection {
    /// Query record range over a source file of `len` records.
    pub fn query_range(&self, len: usize) -> std::ops::Range<usize> {
        let first = self.first.unwrap_or(0);
        let end = self.last.map(|l| l.saturating_add(1)).unwrap_or(len);
        first..end
    }
}

impl Default for IsslSection {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            lookahead: default_lookahead(),
            first: None,
            last: None,
            source: None,
        }
    }
}

/// Topic file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicFormat {
    /// `topic_id query text...` per line.
    Wsj,
    /// `topic_id path` per line; the file's first line is the query and the
    /// whole file is relevance feedback.
    FilelistRf,
}

impl FromStr for TopicFormat {
    type Err = ConfigLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wsj" => Ok(TopicFormat::Wsj),
            "filelist_rf" => Ok(TopicFormat::FilelistRf),
            other => Err(ConfigLoadError::UnknownVariant {
                field: "topic.format",
                value: other.to_string(),
            }),
        }
    }
}

/// Topic run YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSection {
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// `wsj` or `filelist_rf`
    #[serde(default = "default_topic_format")]
    pub format: String,

    #[serde(default = "default_run_id")]
    pub run_id: String,

    /// Search with the feedback text and refine with the query instead.
    #[serde(default)]
    pub refine_invert: bool,

    /// Existing TREC run to rerank.
    #[serde(default)]
    pub rerank_run: Option<PathBuf>,
}

impl TopicSection {
    pub fn topic_format(&self) -> Result<TopicFormat, ConfigLoadError> {
        self.format.parse()
    }

    pub fn topic_path(&self) -> Result<&Path, ConfigLoadError> {
        self.path
            .as_deref()
            .ok_or_else(|| ConfigLoadError::MissingField("topic.path".into()))
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.topic_format()?;
        if self.run_id.split_whitespace().count() != 1 {
            return Err(ConfigLoadError::Validation(
                "topic.run_id must be a single non-empty word".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TopicSection {
    fn default() -> Self {
        Self {
            path: None,
            format: default_topic_format(),
            run_id: default_run_id(),
            refine_invert: false,
            rerank_run: None,
        }
    }
}

/// File locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default)]
    pub signature: Option<PathBuf>,

    #[serde(default)]
    pub issl: Option<PathBuf>,

    /// TREC output; standard output when unset.
    #[serde(default)]
    pub results: Option<PathBuf>,
}

fn true_value() -> bool {
    true
}
fn default_width() -> usize {
    1024
}
fn default_density() -> usize {
    21
}
fn default_method() -> String {
    "traditional".to_string()
}
fn default_term_cache_size() -> usize {
    100_000
}
fn default_max_name_len() -> usize {
    255
}
fn default_charmask() -> String {
    "alpha".to_string()
}
fn default_filter() -> String {
    "none".to_string()
}
fn default_max_term_len() -> usize {
    32
}
fn default_format() -> String {
    "file".to_string()
}
fn default_docid_format() -> String {
    "path".to_string()
}
fn default_threads() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    512
}
fn default_split_type() -> String {
    "none".to_string()
}
fn default_max_distance() -> usize {
    3
}
fn default_lookahead() -> usize {
    1
}
fn default_topic_format() -> String {
    "wsj".to_string()
}
fn default_run_id() -> String {
    "Topsig".to_string()
}
