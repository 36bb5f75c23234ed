mod common;

use std::collections::BTreeMap;
use std::fs;

use proptest::prelude::*;
use tempfile::TempDir;
use topsig::{
    index_collection, search_text, SignatureFile, SignatureMeta, SplitPolicy, SplitType,
    TokenizeConfig, Tokenizer,
};

use common::{config, write_corpus};

/// Records keyed by docid, spans in file order.
fn records_by_id(file: &SignatureFile) -> BTreeMap<String, Vec<(Vec<u8>, SignatureMeta)>> {
    let mut map: BTreeMap<String, Vec<_>> = BTreeMap::new();
    for i in 0..file.len() {
        let rec = file.read_record(i).unwrap();
        map.entry(rec.id).or_default().push((rec.bits, rec.meta));
    }
    map
}

#[test]
fn reindexing_produces_identical_files() {
    let dir = TempDir::new().unwrap();
    let docs = write_corpus(dir.path());
    let mut cfg = config(dir.path(), docs, 0);

    index_collection(&cfg).unwrap();
    let first = fs::read(cfg.signature_path().unwrap()).unwrap();

    cfg.paths.signature = Some(dir.path().join("again.sig"));
    index_collection(&cfg).unwrap();
    let second = fs::read(cfg.signature_path().unwrap()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn thread_count_does_not_change_signatures() {
    let dir = TempDir::new().unwrap();
    let docs = write_corpus(dir.path());

    let mut baseline = None;
    for threads in [0, 1, 4] {
        let mut cfg = config(dir.path(), docs.clone(), threads);
        cfg.pipeline.split.kind = "hard".into();
        cfg.pipeline.split.max = 6;
        cfg.paths.signature = Some(dir.path().join(format!("t{threads}.sig")));
        index_collection(&cfg).unwrap();

        let records = records_by_id(&SignatureFile::open(cfg.signature_path().unwrap()).unwrap());
        match &baseline {
            None => baseline = Some(records),
            Some(expected) => assert_eq!(&records, expected, "threads = {threads}"),
        }
    }
}

#[test]
fn seed_changes_the_projection() {
    let dir = TempDir::new().unwrap();
    let docs = write_corpus(dir.path());
    let a = config(dir.path(), docs.clone(), 0);
    let mut b = config(dir.path(), docs, 0);
    b.signature.seed = a.signature.seed + 1;
    b.paths.signature = Some(dir.path().join("seeded.sig"));
    index_collection(&a).unwrap();
    index_collection(&b).unwrap();

    let a = records_by_id(&SignatureFile::open(a.signature_path().unwrap()).unwrap());
    let b = records_by_id(&SignatureFile::open(b.signature_path().unwrap()).unwrap());
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    assert!(a.iter().zip(&b).any(|((_, x), (_, y))| x[0].0 != y[0].0));
}

#[test]
fn repeated_queries_give_identical_results() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), write_corpus(dir.path()), 2);
    index_collection(&cfg).unwrap();

    let first = search_text(&cfg, "q", "stadium referee penalty").unwrap();
    let second = search_text(&cfg, "q", "stadium referee penalty").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.get(0).unwrap().docid, "football");
}

const VOCAB: &[&str] = &[
    "river", "stone", "lamp", "cedar", "quartz", "violet", "engine", "harbor", "meadow", "copper",
    "lantern", "falcon",
];

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec((0..VOCAB.len(), prop::bool::weighted(0.2)), 0..120).prop_map(|words| {
        let mut text = String::new();
        for (w, stop) in words {
            text.push_str(VOCAB[w]);
            text.push_str(if stop { ". " } else { " " });
        }
        text
    })
}

proptest! {
    #[test]
    fn splitting_keeps_every_term(
        text in text_strategy(),
        sentence in any::<bool>(),
        min in 0usize..6,
        extra in 1usize..10,
    ) {
        let tokenizer = Tokenizer::new(&TokenizeConfig::new()).unwrap();
        let tokens = tokenizer.tokenize(&text);
        let kind = if sentence { SplitType::Sentence } else { SplitType::Hard };
        let max = min + extra;
        let policy = SplitPolicy::new(kind, min, max);
        prop_assert!(policy.validate().is_ok());

        let spans = policy.split(&tokens);
        let total: usize = spans.iter().map(|s| s.total()).sum();
        prop_assert_eq!(total, tokens.len());
        prop_assert_eq!(spans.is_empty(), tokens.is_empty());

        let mut end = 0;
        for span in &spans {
            prop_assert!(!span.is_empty());
            prop_assert!(span.unique() <= max);
            prop_assert!(span.offset_begin() >= end);
            prop_assert!(span.offset_begin() < span.offset_end());
            end = span.offset_end();
        }
    }
}
