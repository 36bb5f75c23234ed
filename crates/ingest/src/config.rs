//! Configuration types for document ingestion.
//!
//! [`IngestConfig`] selects one archive reader for the whole run and decides
//! how identifiers are derived for formats that do not carry their own.
//!
//! ```rust
//! use ingest::{ArchiveFormat, DocIdFormat, IngestConfig};
//!
//! let config = IngestConfig::new()
//!     .with_format(ArchiveFormat::Tar)
//!     .with_docid_format(DocIdFormat::Basename)
//!     .with_target("corpus.tar");
//! config.validate().expect("valid config");
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Container format of every target path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Each target file is one document.
    #[default]
    File,
    /// POSIX tar archive, one document per regular entry.
    Tar,
    /// WARC archive; only `response` records are documents.
    Warc,
    /// TREC/WSJ SGML: `<DOC>` blocks identified by `<DOCNO>`.
    Wsj,
    /// One document per line, numbered from `0001`.
    Newline,
    /// Crawl dump of `#UID:` / `#CONTENT:` / `#EOR` records.
    #[serde(alias = "khresmoi")]
    CustomCrawl,
}

impl ArchiveFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveFormat::File => "file",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Warc => "warc",
            ArchiveFormat::Wsj => "wsj",
            ArchiveFormat::Newline => "newline",
            ArchiveFormat::CustomCrawl => "customcrawl",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchiveFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(ArchiveFormat::File),
            "tar" => Ok(ArchiveFormat::Tar),
            "warc" => Ok(ArchiveFormat::Warc),
            "wsj" => Ok(ArchiveFormat::Wsj),
            "newline" => Ok(ArchiveFormat::Newline),
            "customcrawl" | "khresmoi" => Ok(ArchiveFormat::CustomCrawl),
            other => Err(IngestError::InvalidConfig(format!(
                "unknown target format {other:?}"
            ))),
        }
    }
}

/// How `File` and `Tar` documents are named.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DocIdFormat {
    /// The full path (or tar entry name).
    #[default]
    #[serde(rename = "path")]
    Path,
    /// Final path component.
    #[serde(rename = "basename.ext")]
    BasenameExt,
    /// Final path component without its last extension.
    #[serde(rename = "basename")]
    Basename,
    /// Content of the first `<field>...</field>` element, falling back to
    /// the path when the element is absent.
    #[serde(rename = "xmlfield")]
    XmlField,
}

impl FromStr for DocIdFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(DocIdFormat::Path),
            "basename.ext" => Ok(DocIdFormat::BasenameExt),
            "basename" => Ok(DocIdFormat::Basename),
            "xmlfield" => Ok(DocIdFormat::XmlField),
            other => Err(IngestError::InvalidConfig(format!(
                "unknown docid format {other:?}"
            ))),
        }
    }
}

/// Runtime configuration for reading documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IngestConfig {
    /// Reader applied to every target.
    pub format: ArchiveFormat,
    /// Identifier derivation for `File` and `Tar` targets.
    pub docid_format: DocIdFormat,
    /// Element name used by [`DocIdFormat::XmlField`].
    pub xml_docid_field: Option<String>,
    /// Files or directories to read. Directories are listed one level deep.
    pub targets: Vec<PathBuf>,
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_docid_format(mut self, docid_format: DocIdFormat) -> Self {
        self.docid_format = docid_format;
        self
    }

    pub fn with_xml_docid_field(mut self, field: impl Into<String>) -> Self {
        self.xml_docid_field = Some(field.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.docid_format == DocIdFormat::XmlField
            && self
                .xml_docid_field
                .as_deref()
                .map_or(true, |f| f.trim().is_empty())
        {
            return Err(IngestError::InvalidConfig(
                "docid_format xmlfield requires xml_docid_field".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("WARC".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Warc);
        assert_eq!(
            "khresmoi".parse::<ArchiveFormat>().unwrap(),
            ArchiveFormat::CustomCrawl
        );
        assert!("zip".parse::<ArchiveFormat>().is_err());
        assert_eq!(
            "basename.ext".parse::<DocIdFormat>().unwrap(),
            DocIdFormat::BasenameExt
        );
        assert!("uuid".parse::<DocIdFormat>().is_err());
    }

    #[test]
    fn xmlfield_requires_field_name() {
        let cfg = IngestConfig::new().with_docid_format(DocIdFormat::XmlField);
        assert!(matches!(cfg.validate(), Err(IngestError::InvalidConfig(_))));
        assert!(cfg.with_xml_docid_field("DOCNO").validate().is_ok());
    }

    #[test]
    fn serde_names_match_config_values() {
        let cfg = IngestConfig::new()
            .with_format(ArchiveFormat::CustomCrawl)
            .with_docid_format(DocIdFormat::BasenameExt);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"customcrawl\""));
        assert!(json.contains("\"basename.ext\""));
    }
}
