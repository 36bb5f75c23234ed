use super::*;
use std::path::PathBuf;

use index::{IndexError, SignatureFileWriter};
use signature::{SignatureConfig, SignatureMeta};

const WIDTH: usize = 64;

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn bits_for(i: usize) -> Vec<u8> {
    splitmix(i as u64).to_le_bytes().to_vec()
}

/// Write `n` pseudo-random records named `d00000`.. and return the path.
fn write_collection(dir: &Path, n: usize, quality: impl Fn(usize) -> i32) -> PathBuf {
    let cfg = SignatureConfig::new()
        .with_width(WIDTH)
        .with_density(4)
        .with_max_name_len(8);
    let path = dir.join("collection.sig");
    let mut w = SignatureFileWriter::create(&path, &cfg).unwrap();
    for i in 0..n {
        let meta = SignatureMeta {
            quality: quality(i),
            ..SignatureMeta::default()
        };
        w.append_record(&format!("d{i:05}"), &meta, &bits_for(i))
            .unwrap();
    }
    w.finish().unwrap();
    path
}

fn brute_force(n: usize, query: &[u8], k: usize) -> Vec<String> {
    let mut all: Vec<(u32, String)> = (0..n)
        .map(|i| (crate::hamming(&bits_for(i), query), format!("d{i:05}")))
        .collect();
    all.sort();
    all.into_iter().take(k).map(|(_, d)| d).collect()
}

fn owned(results: &Results) -> Vec<String> {
    results.iter().map(|r| r.docid.clone()).collect()
}

#[test]
fn stored_document_ranks_itself_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 200, |_| 0);
    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();

    let query = searcher.document_query("d00017").unwrap();
    let results = searcher.search(&query.signature, 5).unwrap();
    assert!(searcher.is_fully_cached());
    assert_eq!(results.len(), 5);
    assert_eq!(results.get(0).unwrap().docid, "d00017");
    assert_eq!(results.get(0).unwrap().distance, 0);
    assert_eq!(owned(&results), brute_force(200, &bits_for(17), 5));
}

#[test]
fn result_count_is_min_of_k_and_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 3, |_| 0);
    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    let results = searcher
        .search(&FlatSignature::from_bits(vec![0; 8]), 10)
        .unwrap();
    assert_eq!(results.len(), 3);
}

#[test]
fn paged_scan_matches_brute_force() {
    let dir = tempfile::tempdir().unwrap();
    // 49-byte records: 1 MiB holds 21,399 of them.
    let n = 22_000;
    let path = write_collection(dir.path(), n, |_| 0);
    let cfg = SearchConfig::new().with_cache_size_mb(1);
    let mut searcher = Searcher::open(&path, cfg).unwrap();

    let query = bits_for(n + 5);
    let results = searcher
        .search(&FlatSignature::from_bits(query.clone()), 10)
        .unwrap();
    assert!(!searcher.is_fully_cached());
    assert_eq!(owned(&results), brute_force(n, &query, 10));
}

#[test]
fn threaded_scan_matches_single_thread() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 1_000, |i| (i % 3) as i32);
    let query = FlatSignature::from_bits(bits_for(4242));

    let mut single = Searcher::open(&path, SearchConfig::new().with_threads(1)).unwrap();
    let mut multi = Searcher::open(&path, SearchConfig::new().with_threads(4)).unwrap();
    assert_eq!(
        single.search(&query, 25).unwrap(),
        multi.search(&query, 25).unwrap()
    );
}

#[test]
fn quality_breaks_distance_ties() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SignatureConfig::new().with_width(16).with_density(2);
    let path = dir.path().join("ties.sig");
    let mut w = SignatureFileWriter::create(&path, &cfg).unwrap();
    for (name, quality) in [("low", 1), ("high", 9), ("mid", 5)] {
        let meta = SignatureMeta {
            quality,
            ..SignatureMeta::default()
        };
        w.append_record(name, &meta, &[0xAA, 0x55]).unwrap();
    }
    w.finish().unwrap();

    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    let results = searcher
        .search(&FlatSignature::from_bits(vec![0xAA, 0x55]), 3)
        .unwrap();
    assert_eq!(results.docids(), vec!["high", "mid", "low"]);
}

#[test]
fn repeated_docids_appear_once() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SignatureConfig::new().with_width(16).with_density(2);
    let path = dir.path().join("dups.sig");
    let mut w = SignatureFileWriter::create(&path, &cfg).unwrap();
    w.append_record("dup", &SignatureMeta::default(), &[0xFF, 0x00])
        .unwrap();
    w.append_record("dup", &SignatureMeta::default(), &[0xFF, 0x01])
        .unwrap();
    w.append_record("other", &SignatureMeta::default(), &[0x00, 0x00])
        .unwrap();
    w.finish().unwrap();

    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    let results = searcher
        .search(&FlatSignature::from_bits(vec![0xFF, 0x00]), 3)
        .unwrap();
    assert_eq!(results.docids(), vec!["dup", "other"]);
    assert_eq!(results.get(0).unwrap().distance, 0);
    assert_eq!(results.get(0).unwrap().record, 0);
}

#[test]
fn missing_document_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 10, |_| 0);
    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    assert_eq!(searcher.find_document("d00009").unwrap(), 9);
    match searcher.find_document("nope") {
        Err(MatchError::DocumentNotFound(id)) => assert_eq!(id, "nope"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn rerank_orders_listed_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 50, |_| 0);
    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    let query = FlatSignature::from_bits(bits_for(30));

    let listed = vec!["d00001".to_string(), "d00030".to_string(), "d00001".to_string()];
    let results = searcher.rerank(&query, &listed).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results.get(0).unwrap().docid, "d00030");

    let err = searcher
        .rerank(&query, &["d00002".to_string(), "ghost".to_string()])
        .unwrap_err();
    assert!(matches!(err, MatchError::DocumentNotFound(ref id) if id == "ghost"));
}

#[test]
fn query_width_must_match_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 4, |_| 0);
    let mut searcher = Searcher::open(&path, SearchConfig::default()).unwrap();
    let err = searcher
        .search(&FlatSignature::from_bits(vec![0; 4]), 3)
        .unwrap_err();
    assert!(matches!(
        err,
        MatchError::Index(IndexError::WidthMismatch { expected: 64, actual: 32 })
    ));
}

#[test]
fn explicit_feedback_reranks_toward_feedback_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 100, |_| 0);
    let cfg = SearchConfig::new().with_feedback_k(1);
    let mut searcher = Searcher::open(&path, cfg).unwrap();

    let query = FlatSignature::from_bits(bits_for(10));
    let plain = searcher.search(&query, 10).unwrap();
    // Feedback text that is exactly the 5th plain result pulls it to the top.
    let target = plain.get(4).unwrap().clone();
    let feedback = FlatSignature::from_bits(target.bits.clone());
    let boosted = searcher.search_with_feedback(&query, 10, &feedback).unwrap();
    assert_eq!(boosted.get(0).unwrap().docid, target.docid);
    assert_eq!(boosted.get(0).unwrap().distance, 0);
    let mut a = plain.docids();
    let mut b = boosted.docids();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn blind_feedback_keeps_the_result_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_collection(dir.path(), 100, |_| 0);
    let query = FlatSignature::from_bits(bits_for(3));

    let mut plain = Searcher::open(&path, SearchConfig::default()).unwrap();
    let mut blind = Searcher::open(&path, SearchConfig::new().with_feedback_sample(3)).unwrap();
    let a = plain.search(&query, 10).unwrap();
    let b = blind.search(&query, 10).unwrap();
    let mut da = a.docids();
    let mut db = b.docids();
    da.sort();
    db.sort();
    assert_eq!(da, db);
}
