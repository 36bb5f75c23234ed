//! Topic files: the queries of a TREC-style run.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use matcher::MatchError;

use crate::config::TopicFormat;
use crate::error::TopsigError;

/// One query of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub query: String,
    /// Relevance feedback text, when the topic format carries one.
    pub feedback: Option<String>,
}

impl Topic {
    /// Use the feedback text as the query and the query as feedback.
    pub fn inverted(self) -> Self {
        match self.feedback {
            Some(feedback) => Topic {
                id: self.id,
                query: feedback,
                feedback: Some(self.query),
            },
            None => self,
        }
    }
}

/// Read the topics of `path`.
///
/// For `filelist_rf`, the listed paths are opened as given.
pub fn load_topics(path: &Path, format: TopicFormat) -> Result<Vec<Topic>, TopsigError> {
    let file = File::open(path)?;
    read_topics(BufReader::new(file), format)
}

pub fn read_topics<R: BufRead>(reader: R, format: TopicFormat) -> Result<Vec<Topic>, TopsigError> {
    let mut topics = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (id, rest) = line
            .split_once(char::is_whitespace)
            .map(|(id, rest)| (id, rest.trim()))
            .filter(|(_, rest)| !rest.is_empty())
            .ok_or_else(|| MatchError::MalformedInput {
                line: n + 1,
                reason: "expected a topic id followed by text".into(),
            })?;
        let topic = match format {
            TopicFormat::Wsj => Topic {
                id: id.to_string(),
                query: rest.to_string(),
                feedback: None,
            },
            TopicFormat::FilelistRf => {
                let text = fs::read_to_string(rest)?;
                Topic {
                    id: id.to_string(),
                    query: text.lines().next().unwrap_or_default().to_string(),
                    feedback: Some(text),
                }
            }
        };
        topics.push(topic);
    }
    Ok(topics)
}
