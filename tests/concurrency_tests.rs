//! Threaded indexing and concurrent readers of one signature file.

mod common;

use std::collections::HashMap;
use std::path::Path;
use std::thread;

use tempfile::TempDir;
use topsig::{
    index_collection, Document, IndexingPipeline, PipelineConfig, SearchConfig, Searcher,
    SignatureConfig, SignatureFile, SplitPolicy, SplitType, TokenizeConfig, Tokenizer,
};

use common::{config, write_corpus, CORPUS};

const WORDS: &[&str] = &[
    "amber", "basalt", "cobalt", "delta", "ember", "fjord", "glacier", "heron", "iris", "juniper",
    "kelp", "lichen", "marble", "nectar", "onyx", "pollen", "quill", "raven", "saffron", "tundra",
];

fn generated_docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            let text: Vec<&str> = (0..12).map(|j| WORDS[(i * 7 + j * j) % WORDS.len()]).collect();
            Document::new(format!("gen-{i:04}"), text.join(" "))
        })
        .collect()
}

fn sig_config() -> SignatureConfig {
    SignatureConfig::new().with_width(256).with_density(8).with_seed(3)
}

fn index_docs(path: &Path, docs: &[Document], pipeline: PipelineConfig) -> HashMap<String, Vec<u8>> {
    let tokenizer = Tokenizer::new(&TokenizeConfig::new()).unwrap();
    let mut p = IndexingPipeline::create(path, &sig_config(), tokenizer, &pipeline).unwrap();
    for doc in docs {
        p.submit(doc.clone()).unwrap();
    }
    let stats = p.finish().unwrap();
    assert_eq!(stats.documents, docs.len() as u64);

    let file = SignatureFile::open(path).unwrap();
    let mut out = HashMap::new();
    for i in 0..file.len() {
        let rec = file.read_record(i).unwrap();
        assert!(out.insert(rec.id.clone(), rec.bits).is_none(), "{} written twice", rec.id);
    }
    out
}

#[test]
fn small_queues_do_not_lose_documents() {
    let dir = TempDir::new().unwrap();
    let docs = generated_docs(300);

    let inline = index_docs(
        &dir.path().join("inline.sig"),
        &docs,
        PipelineConfig::new().with_threads(0),
    );
    let threaded = index_docs(
        &dir.path().join("threaded.sig"),
        &docs,
        PipelineConfig::new().with_threads(4).with_queue_capacity(1),
    );

    assert_eq!(inline.len(), docs.len());
    assert_eq!(threaded, inline);
}

#[test]
fn split_spans_stay_together_under_threads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("split.sig");
    let docs = generated_docs(64);
    let cfg = PipelineConfig::new()
        .with_threads(4)
        .with_queue_capacity(2)
        .with_split(SplitPolicy::new(SplitType::Hard, 0, 4));
    let tokenizer = Tokenizer::new(&TokenizeConfig::new()).unwrap();
    let mut p = IndexingPipeline::create(&path, &sig_config(), tokenizer, &cfg).unwrap();
    for doc in &docs {
        p.submit(doc.clone()).unwrap();
    }
    let stats = p.finish().unwrap();
    assert!(stats.signatures > stats.documents);

    let file = SignatureFile::open(&path).unwrap();
    let ids: Vec<String> = (0..file.len())
        .map(|i| file.read_record(i).unwrap().id)
        .collect();
    let mut seen = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 && ids[i - 1] == *id {
            continue;
        }
        assert!(!seen.contains(id), "spans of {id} are interleaved");
        seen.push(id.clone());
    }
    assert_eq!(seen.len(), docs.len());
}

#[test]
fn dropping_an_unfinished_pipeline_returns() {
    let dir = TempDir::new().unwrap();
    let tokenizer = Tokenizer::new(&TokenizeConfig::new()).unwrap();
    let mut p = IndexingPipeline::create(
        dir.path().join("dropped.sig"),
        &sig_config(),
        tokenizer,
        &PipelineConfig::new().with_threads(2).with_queue_capacity(1),
    )
    .unwrap();
    for doc in generated_docs(10) {
        p.submit(doc).unwrap();
    }
    drop(p);
}

#[test]
fn searchers_on_many_threads_agree() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), write_corpus(dir.path()), 2);
    index_collection(&cfg).unwrap();
    let path = cfg.signature_path().unwrap();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = CORPUS
            .iter()
            .map(|(name, _)| {
                scope.spawn(move || {
                    let mut searcher = Searcher::open(path, SearchConfig::default()).unwrap();
                    let query = searcher.document_query(name).unwrap();
                    (*name, searcher.search(&query.signature, 5).unwrap())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut serial = Searcher::open(path, SearchConfig::default()).unwrap();
    for (name, threaded) in results {
        let query = serial.document_query(name).unwrap();
        assert_eq!(threaded, serial.search(&query.signature, 5).unwrap());
        assert_eq!(threaded.get(0).unwrap().docid, name);
    }
}

#[test]
fn parallel_scan_matches_single_thread() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), write_corpus(dir.path()), 2);
    index_collection(&cfg).unwrap();
    let path = cfg.signature_path().unwrap();

    let single = SearchConfig {
        threads: 1,
        ..SearchConfig::default()
    };
    let parallel = SearchConfig {
        threads: 4,
        ..SearchConfig::default()
    };
    let mut a = Searcher::open(path, single).unwrap();
    let mut b = Searcher::open(path, parallel).unwrap();
    let query = a.document_query("medicine").unwrap();
    let expected = a.search(&query.signature, CORPUS.len()).unwrap();
    assert_eq!(b.search(&query.signature, CORPUS.len()).unwrap(), expected);
    assert_eq!(expected.get(0).unwrap().docid, "medicine");
}
