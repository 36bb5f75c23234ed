use std::io::{BufRead, Write};

use crate::types::{MatchError, Results};

/// Base of the TREC score column; rank `i` (from 0) scores `BASE - i`.
pub const TREC_SCORE_BASE: i64 = 1_000_000;

/// Writes ranked results as TREC run lines:
///
/// `topic Q0 docid rank score run_id distance offset_begin offset_end`
pub struct TrecWriter<W: Write> {
    out: W,
    run_id: String,
    lines: usize,
}

impl<W: Write> TrecWriter<W> {
    pub fn new(out: W, run_id: impl Into<String>) -> Self {
        Self {
            out,
            run_id: run_id.into(),
            lines: 0,
        }
    }

    pub fn write_results(&mut self, topic: &str, results: &Results) -> Result<(), MatchError> {
        for (i, r) in results.iter().enumerate() {
            writeln!(
                self.out,
                "{} Q0 {} {} {} {} {} {} {}",
                topic,
                r.docid,
                i + 1,
                TREC_SCORE_BASE - i as i64,
                self.run_id,
                r.distance,
                r.offset_begin,
                r.offset_end
            )?;
        }
        self.lines += results.len();
        Ok(())
    }

    /// Lines written so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn finish(mut self) -> Result<W, MatchError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// One topic of an existing run: the topic id and its docids in run order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTopic {
    pub topic: String,
    pub docids: Vec<String>,
}

/// Read a TREC run file, grouping consecutive lines by topic.
///
/// Only the topic and docid columns are used. Blank lines are skipped.
pub fn read_run<R: BufRead>(reader: R) -> Result<Vec<RunTopic>, MatchError> {
    let mut topics: Vec<RunTopic> = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let mut cols = line.split_whitespace();
        let Some(topic) = cols.next() else {
            continue;
        };
        let docid = cols.nth(1).ok_or_else(|| MatchError::MalformedInput {
            line: n + 1,
            reason: "expected at least three columns".into(),
        })?;
        match topics.last_mut() {
            Some(last) if last.topic == topic => last.docids.push(docid.to_string()),
            _ => topics.push(RunTopic {
                topic: topic.to_string(),
                docids: vec![docid.to_string()],
            }),
        }
    }
    Ok(topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{docid_hash, SearchResult};

    fn result(docid: &str, distance: u32) -> SearchResult {
        SearchResult {
            docid: docid.into(),
            docid_hash: docid_hash(docid.as_bytes()),
            record: 0,
            bits: Vec::new(),
            distance,
            quality: 0,
            offset_begin: 4,
            offset_end: 90,
        }
    }

    #[test]
    fn writes_trec_lines() {
        let results = Results::from_unsorted(vec![result("WSJ-2", 7), result("WSJ-1", 3)]);
        let mut w = TrecWriter::new(Vec::new(), "Topsig");
        w.write_results("401", &results).unwrap();
        assert_eq!(w.lines(), 2);
        let text = String::from_utf8(w.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "401 Q0 WSJ-1 1 1000000 Topsig 3 4 90");
        assert_eq!(lines[1], "401 Q0 WSJ-2 2 999999 Topsig 7 4 90");
    }

    #[test]
    fn reads_runs_grouped_by_topic() {
        let run = "401 Q0 a 1 1000000 x\n401 Q0 b 2 999999 x\n\n402 Q0 c 1 1000000 x\n";
        let topics = read_run(run.as_bytes()).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].docids, vec!["a", "b"]);
        assert_eq!(topics[1].topic, "402");
    }

    #[test]
    fn short_lines_are_rejected() {
        let err = read_run("401 Q0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MatchError::MalformedInput { line: 1, .. }));
    }
}
