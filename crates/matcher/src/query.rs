use canonical::{TokenizeConfig, Tokenizer};
use index::SignatureRecord;
use signature::{FlatSignature, SignatureBuilder, SignatureConfig};

use crate::types::MatchError;

/// A flattened query signature and the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub id: String,
    pub signature: FlatSignature,
}

impl Query {
    pub fn new(id: impl Into<String>, signature: FlatSignature) -> Self {
        Self {
            id: id.into(),
            signature,
        }
    }

    /// Use a stored record as the query. Stored records carry no mask, so
    /// every bit counts.
    pub fn from_record(record: SignatureRecord) -> Self {
        Self {
            id: record.id,
            signature: FlatSignature::from_bits(record.bits),
        }
    }

    pub fn width(&self) -> usize {
        self.signature.width()
    }
}

/// Turns query text into signatures compatible with an index.
///
/// The signature settings must be the ones the index was built with; take
/// them from the file header with `FileHeader::signature_config`.
pub struct QueryEncoder {
    tokenizer: Tokenizer,
    builder: SignatureBuilder,
}

impl QueryEncoder {
    pub fn new(sig_cfg: &SignatureConfig, tok_cfg: &TokenizeConfig) -> Result<Self, MatchError> {
        Ok(Self {
            tokenizer: Tokenizer::new(tok_cfg)?,
            builder: SignatureBuilder::new(sig_cfg)?,
        })
    }

    /// Replace the tokenizer, e.g. to install a stemmer.
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn width(&self) -> usize {
        self.builder.width()
    }

    pub fn encode(&mut self, id: &str, text: &str) -> Result<Query, MatchError> {
        let terms = self.tokenizer.terms(text);
        let sig = self
            .builder
            .build(id, terms.iter().map(String::as_str))?;
        Ok(Query::new(id, sig.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_encodes_identically() {
        let sig_cfg = SignatureConfig::new().with_width(64).with_density(4);
        let mut enc = QueryEncoder::new(&sig_cfg, &TokenizeConfig::default()).unwrap();
        let a = enc.encode("q1", "Rust signatures for search").unwrap();
        let b = enc.encode("q2", "rust SIGNATURES for search").unwrap();
        assert_eq!(a.signature, b.signature);
        assert_eq!(a.width(), 64);
        assert_eq!(b.id, "q2");
    }

    #[test]
    fn empty_text_has_an_empty_mask() {
        let sig_cfg = SignatureConfig::new().with_width(32).with_density(4);
        let mut enc = QueryEncoder::new(&sig_cfg, &TokenizeConfig::default()).unwrap();
        let q = enc.encode("q", "").unwrap();
        assert!(q.signature.mask.iter().all(|&b| b == 0));
    }

    #[test]
    fn record_queries_use_every_bit() {
        let rec = SignatureRecord {
            id: "d".into(),
            meta: Default::default(),
            bits: vec![1, 2],
        };
        let q = Query::from_record(rec);
        assert_eq!(q.signature.mask, vec![0xFF, 0xFF]);
    }
}
