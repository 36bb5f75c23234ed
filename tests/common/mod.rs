#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use topsig::TopsigConfig;

/// Eight short documents on unrelated subjects, named by subject.
pub const CORPUS: &[(&str, &str)] = &[
    (
        "astronomy",
        "The telescope tracked a distant galaxy. Astronomers logged each comet \
         and nebula from the observatory, charting the orbit of every planet.",
    ),
    (
        "cooking",
        "Knead the dough, fold in butter and sugar, then bake the pastry in a hot \
         oven. The kitchen smelled of flour and fresh bread.",
    ),
    (
        "finance",
        "Investors moved their portfolio from equity into bonds. The bank raised \
         its dividend while stock trading on the market slowed.",
    ),
    (
        "football",
        "The striker scored a late goal past the keeper. The referee awarded a \
         penalty and the stadium roared as the league match ended.",
    ),
    (
        "gardening",
        "Dig compost into the soil, sow each seed in rows, prune the roses and \
         water the flower beds before the frost arrives.",
    ),
    (
        "medicine",
        "The doctor examined the patient at the clinic. After the diagnosis the \
         nurse scheduled surgery and a course of therapy at the hospital.",
    ),
    (
        "music",
        "The orchestra tuned each violin and cello. The pianist set the tempo, \
         the guitar carried the melody and the chord progression built rhythm.",
    ),
    (
        "sailing",
        "The crew raised the sail and checked the mast and keel. Wind filled the \
         canvas as the boat left the harbor for an ocean voyage.",
    ),
];

pub fn text_of(name: &str) -> &'static str {
    CORPUS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, t)| *t)
        .unwrap_or_else(|| panic!("no corpus document {name}"))
}

/// Write `docs` as `<name>.txt` files under `dir/docs`.
pub fn write_docs(dir: &Path, docs: &[(&str, &str)]) -> PathBuf {
    let root = dir.join("docs");
    fs::create_dir_all(&root).expect("create corpus dir");
    for (name, text) in docs {
        fs::write(root.join(format!("{name}.txt")), text).expect("write corpus doc");
    }
    root
}

pub fn write_corpus(dir: &Path) -> PathBuf {
    write_docs(dir, CORPUS)
}

/// A small-width configuration indexing `targets` into files under `dir`.
pub fn config(dir: &Path, targets: PathBuf, threads: usize) -> TopsigConfig {
    let mut cfg = TopsigConfig::default();
    cfg.signature.width = 256;
    cfg.signature.density = 8;
    cfg.signature.seed = 7;
    cfg.ingest.docid_format = "basename".into();
    cfg.ingest.targets = vec![targets];
    cfg.pipeline.threads = threads;
    cfg.pipeline.queue_capacity = 4;
    cfg.search.k = 10;
    cfg.paths.signature = Some(dir.join("collection.sig"));
    cfg.paths.issl = Some(dir.join("collection.issl"));
    cfg.validate().expect("test config is valid");
    cfg
}

/// One parsed TREC run line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLine {
    pub topic: String,
    pub docid: String,
    pub rank: usize,
    pub score: i64,
    pub run_id: String,
    pub distance: u32,
}

pub fn parse_run(out: &[u8]) -> Vec<RunLine> {
    let text = std::str::from_utf8(out).expect("run output is utf-8");
    text.lines()
        .map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            assert_eq!(cols.len(), 9, "unexpected run line: {line}");
            assert_eq!(cols[1], "Q0");
            RunLine {
                topic: cols[0].to_string(),
                docid: cols[2].to_string(),
                rank: cols[3].parse().expect("rank"),
                score: cols[4].parse().expect("score"),
                run_id: cols[5].to_string(),
                distance: cols[6].parse().expect("distance"),
            }
        })
        .collect()
}

/// Lines of `run` for `topic`, in file order.
pub fn topic_lines<'a>(run: &'a [RunLine], topic: &str) -> Vec<&'a RunLine> {
    run.iter().filter(|l| l.topic == topic).collect()
}
