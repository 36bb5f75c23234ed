use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

use crate::config::{MarkupFilter, TokenizeConfig};
use crate::error::CanonicalError;
use crate::stem::{DynStemmer, IdentityStemmer, Stemmer};
use crate::stopwords::Stopwords;
use crate::token::Token;

/// Turns raw document text into folded terms.
///
/// Construction validates the configuration once; tokenizing never fails.
#[derive(Debug)]
pub struct Tokenizer {
    cfg: TokenizeConfig,
    stopwords: Option<Stopwords>,
    stemmer: DynStemmer,
}

impl Tokenizer {
    pub fn new(cfg: &TokenizeConfig) -> Result<Self, CanonicalError> {
        cfg.validate()?;
        Ok(Self {
            cfg: cfg.clone(),
            stopwords: cfg.stopwords.then(Stopwords::english),
            stemmer: DynStemmer(Box::new(IdentityStemmer)),
        })
    }

    /// Replace the identity stemmer.
    pub fn with_stemmer(mut self, stemmer: impl Stemmer + 'static) -> Self {
        self.stemmer = DynStemmer(Box::new(stemmer));
        self
    }

    pub fn config(&self) -> &TokenizeConfig {
        &self.cfg
    }

    /// Tokenize `text`. Offsets index the scanned text, which is `text`
    /// itself unless NFKC normalization changed it.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let scanned: Cow<str> = if self.cfg.normalize_unicode && !text.is_ascii() {
            Cow::Owned(text.nfkc().collect::<String>())
        } else {
            Cow::Borrowed(text)
        };
        let text = scanned.as_ref();

        let mut tokens: Vec<Token> = Vec::with_capacity(text.len() / 6 + 1);
        let mut term_start: Option<usize> = None;
        let mut in_tag = false;
        let mut in_entity = false;

        for (idx, ch) in text.char_indices() {
            let mut keep = true;
            if self.cfg.filter == MarkupFilter::Xml {
                if ch == '&' {
                    in_entity = true;
                }
                if ch == '<' {
                    in_tag = true;
                }
                if in_entity && ch == ';' {
                    in_entity = false;
                    keep = false;
                }
                if in_tag && ch == '>' {
                    in_tag = false;
                    keep = false;
                }
                if in_tag || in_entity {
                    keep = false;
                }
            }

            if keep && self.cfg.charmask.accepts(ch) {
                if term_start.is_none() {
                    term_start = Some(idx);
                }
            } else if let Some(start) = term_start.take() {
                self.emit(text, start, idx, &mut tokens);
            }

            if ch == '.' {
                if let Some(last) = tokens.last_mut() {
                    last.sentence_end = true;
                }
            }
        }
        if let Some(start) = term_start {
            self.emit(text, start, text.len(), &mut tokens);
        }
        tokens
    }

    /// Convenience: only the term strings.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|t| t.text).collect()
    }

    fn emit(&self, text: &str, start: usize, end: usize, tokens: &mut Vec<Token>) {
        if end - start > self.cfg.max_term_len {
            return;
        }
        let raw = &text[start..end];
        let mut term = if self.cfg.lowercase {
            raw.to_lowercase()
        } else {
            raw.to_string()
        };
        self.stemmer.0.stem(&mut term);
        if term.is_empty() {
            return;
        }
        if let Some(stop) = &self.stopwords {
            if stop.contains(&term) {
                return;
            }
        }
        tokens.push(Token {
            text: term,
            start,
            end,
            sentence_end: false,
        });
    }
}
