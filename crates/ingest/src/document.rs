use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::DocIdFormat;

/// A document handed to the indexing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    /// Document text. Invalid UTF-8 sequences are replaced on read.
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub(crate) fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            id: id.into(),
            text: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Length of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Derive a document identifier from its path and content.
pub fn document_id(format: DocIdFormat, path: &str, text: &str, xml_field: Option<&str>) -> String {
    match format {
        DocIdFormat::Path => path.to_string(),
        DocIdFormat::BasenameExt => basename(path).to_string(),
        DocIdFormat::Basename => {
            let base = basename(path);
            match base.rfind('.') {
                Some(dot) => base[..dot].to_string(),
                None => base.to_string(),
            }
        }
        DocIdFormat::XmlField => xml_field
            .and_then(|field| xml_element(text, field))
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string()),
    }
}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Trimmed content of the first `<field>...</field>` element.
pub(crate) fn xml_element<'a>(text: &'a str, field: &str) -> Option<&'a str> {
    let open = format!("<{field}>");
    let close = format!("</{field}>");
    let start = text.find(&open)? + open.len();
    let end = start + text[start..].find(&close)?;
    Some(text[start..end].trim())
}
