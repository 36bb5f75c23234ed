use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use index::SignatureFileWriter;
use matcher::{document_distance, hamming, SearchConfig, Searcher};
use signature::{FlatSignature, SignatureBuilder, SignatureConfig, SignatureMeta};
use tempfile::TempDir;

fn terms(n: usize, salt: usize) -> Vec<String> {
    (0..n).map(|i| format!("term{}", (i * 31 + salt) % (n / 2 + 1))).collect()
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    for width in [1024usize, 4096] {
        let cfg = SignatureConfig::new().with_width(width);
        for n in [64usize, 1024] {
            let words = terms(n, 0);
            group.throughput(Throughput::Elements(n as u64));
            group.bench_with_input(BenchmarkId::new(format!("w{width}"), n), &words, |b, words| {
                let mut builder = SignatureBuilder::new(&cfg).expect("builder");
                b.iter(|| {
                    let sig = builder
                        .build("bench", words.iter().map(String::as_str))
                        .expect("build");
                    black_box(sig.finalize())
                })
            });
        }
    }
    group.finish();
}

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");
    let a: Vec<u8> = (0..128).map(|i| (i * 37) as u8).collect();
    let b: Vec<u8> = (0..128).map(|i| (i * 91 + 5) as u8).collect();
    let mask: Vec<u8> = (0..128).map(|i| if i % 3 == 0 { 0 } else { 0xFF }).collect();
    group.throughput(Throughput::Bytes(a.len() as u64));
    group.bench_function("hamming_1024", |bench| {
        bench.iter(|| hamming(black_box(&a), black_box(&b)))
    });
    group.bench_function("masked_1024", |bench| {
        bench.iter(|| document_distance(black_box(&a), black_box(&b), black_box(&mask)))
    });
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let records = 20_000usize;
    let cfg = SignatureConfig::new().with_width(1024);
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bench.sig");

    let mut builder = SignatureBuilder::new(&cfg).expect("builder");
    let mut writer = SignatureFileWriter::create(&path, &cfg).expect("create");
    for i in 0..records {
        let words = terms(40, i);
        let sig = builder
            .build(format!("doc-{i:06}"), words.iter().map(String::as_str))
            .expect("build");
        writer
            .append_record(sig.id(), &SignatureMeta::default(), &sig.finalize().bits)
            .expect("append");
    }
    writer.finish().expect("finish");

    let query = {
        let words = terms(40, 7);
        builder
            .build("query", words.iter().map(String::as_str))
            .expect("build")
            .finalize()
    };
    let full = FlatSignature::from_bits(query.bits.clone());

    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Elements(records as u64));
    group.sample_size(20);
    for threads in [1usize, 4] {
        let search = SearchConfig {
            threads,
            ..SearchConfig::default()
        };
        let mut searcher = Searcher::open(&path, search).expect("open");
        group.bench_with_input(BenchmarkId::new("masked_top10", threads), &query, |b, q| {
            b.iter(|| black_box(searcher.search(q, 10).expect("search")))
        });
        group.bench_with_input(BenchmarkId::new("full_top10", threads), &full, |b, q| {
            b.iter(|| black_box(searcher.search(q, 10).expect("search")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_projection, bench_distance, bench_scan);
criterion_main!(benches);
