//! Splitting long documents into several signatures.
//!
//! A document is cut into spans by counting its unique terms. A finished span
//! is held back until the next one is known: if either of the two is too
//! small (`< min_terms`) and together they stay under `max_terms`, they are
//! written as one signature. Spans without terms are never written.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use canonical::Token;
use serde::{Deserialize, Serialize};

use crate::error::TopsigError;

/// When a document is cut into spans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// One signature per document.
    #[default]
    None,
    /// Cut once a span reaches `max_terms` unique terms.
    Hard,
    /// Also cut at a sentence end once a span has `min_terms` unique terms.
    Sentence,
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplitType::None => "none",
            SplitType::Hard => "hard",
            SplitType::Sentence => "sentence",
        })
    }
}

impl FromStr for SplitType {
    type Err = TopsigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(SplitType::None),
            "hard" => Ok(SplitType::Hard),
            "sentence" => Ok(SplitType::Sentence),
            other => Err(TopsigError::InvalidConfig(format!(
                "unknown split type {other:?}; expected none, hard or sentence"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SplitPolicy {
    pub kind: SplitType,
    pub min_terms: usize,
    pub max_terms: usize,
}

impl SplitPolicy {
    pub fn new(kind: SplitType, min_terms: usize, max_terms: usize) -> Self {
        Self {
            kind,
            min_terms,
            max_terms,
        }
    }

    pub fn validate(&self) -> Result<(), TopsigError> {
        if self.kind == SplitType::None {
            return Ok(());
        }
        if self.max_terms == 0 {
            return Err(TopsigError::InvalidConfig(format!(
                "split type {} needs max >= 1",
                self.kind
            )));
        }
        if self.min_terms > self.max_terms {
            return Err(TopsigError::InvalidConfig(format!(
                "split min ({}) exceeds max ({})",
                self.min_terms, self.max_terms
            )));
        }
        Ok(())
    }

    fn is_boundary(&self, span: &TermSpan<'_>, token: &Token) -> bool {
        match self.kind {
            SplitType::None => false,
            SplitType::Hard => span.unique() >= self.max_terms,
            SplitType::Sentence => {
                (token.sentence_end && span.unique() >= self.min_terms)
                    || span.unique() >= self.max_terms
            }
        }
    }

    /// A held span still under `min_terms` absorbs the next one, as long as
    /// the pair stays under `max_terms`. A short next span is never pulled
    /// back on its own account.
    fn should_merge(&self, held: &TermSpan<'_>, next: &TermSpan<'_>) -> bool {
        held.unique() < self.min_terms && held.unique() + next.unique() < self.max_terms
    }

    /// Cut `tokens` into the spans that become signatures, in document order.
    pub fn split<'a>(&self, tokens: &'a [Token]) -> Vec<TermSpan<'a>> {
        let mut out = Vec::new();
        let mut held: Option<TermSpan<'a>> = None;
        let mut current = TermSpan::default();
        for token in tokens {
            current.push(token);
            if self.is_boundary(&current, token) {
                self.close(std::mem::take(&mut current), &mut held, &mut out);
            }
        }
        self.close(current, &mut held, &mut out);
        out.extend(held);
        out
    }

    fn close<'a>(
        &self,
        span: TermSpan<'a>,
        held: &mut Option<TermSpan<'a>>,
        out: &mut Vec<TermSpan<'a>>,
    ) {
        match held.take() {
            Some(mut last) if self.should_merge(&last, &span) => {
                last.absorb(span);
                out.push(last);
            }
            Some(last) => {
                out.push(last);
                if !span.is_empty() {
                    *held = Some(span);
                }
            }
            None if !span.is_empty() => *held = Some(span),
            None => {}
        }
    }
}

/// Term counts of one span with the byte range it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSpan<'a> {
    counts: HashMap<&'a str, i32>,
    total: usize,
    begin: usize,
    end: usize,
}

impl<'a> TermSpan<'a> {
    fn push(&mut self, token: &'a Token) {
        if self.total == 0 {
            self.begin = token.start;
        }
        self.end = token.end;
        self.total += 1;
        *self.counts.entry(token.text.as_str()).or_insert(0) += 1;
    }

    fn absorb(&mut self, other: TermSpan<'a>) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other;
            return;
        }
        self.begin = self.begin.min(other.begin);
        self.end = self.end.max(other.end);
        self.total += other.total;
        for (term, count) in other.counts {
            *self.counts.entry(term).or_insert(0) += count;
        }
    }

    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Distinct terms with their counts, in no particular order.
    pub fn terms(&self) -> impl Iterator<Item = (&'a str, i32)> + '_ {
        self.counts.iter().map(|(&t, &c)| (t, c))
    }

    /// Byte offset of the first term.
    pub fn offset_begin(&self) -> usize {
        self.begin
    }

    /// Byte offset just past the last term.
    pub fn offset_end(&self) -> usize {
        self.end
    }
}
