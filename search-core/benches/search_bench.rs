use criterion::{criterion_group, criterion_main, Criterion};
use search_core::{Analyzer, IndexBuilder, IndexConfig, NewDocument, QueryParser, Searcher, Similarity};

const WORDS: &[&str] = &[
    "index", "posting", "term", "query", "rank", "score", "document", "collection", "token", "commit",
    "reader", "writer", "frequency", "inverse", "boolean", "retrieval", "corpus", "analyzer",
];

fn synthetic_doc(seed: usize, len: usize) -> String {
    (0..len).map(|i| WORDS[(seed * 31 + i * 7 + i / 3) % WORDS.len()]).collect::<Vec<_>>().join(" ")
}

fn bench_tokenize(c: &mut Criterion) {
    let analyzer = Analyzer::default();
    let text = synthetic_doc(1, 2_000);
    c.bench_function("tokenize_2k_words", |b| b.iter(|| analyzer.tokenize(&text).count()));
}

fn bench_search(c: &mut Criterion) {
    let mut builder = IndexBuilder::new(IndexConfig::default());
    for i in 0..5_000 {
        builder.add_text(NewDocument::new(format!("doc{i}")), &synthetic_doc(i, 120)).unwrap();
    }
    let index = builder.into_index();
    let parser = QueryParser::new(Analyzer::default());
    let query = parser.parse("posting frequency retrieval").unwrap();
    c.bench_function("search_5k_docs_tfidf", |b| {
        let searcher = Searcher::new(&index, Similarity::default());
        b.iter(|| searcher.search(&query, 100).unwrap())
    });
    c.bench_function("search_5k_docs_bm25", |b| {
        let searcher = Searcher::new(&index, Similarity::bm25());
        b.iter(|| searcher.search(&query, 100).unwrap())
    });
    c.bench_function("search_5k_docs_ql", |b| {
        let searcher = Searcher::new(&index, Similarity::query_likelihood());
        b.iter(|| searcher.search(&query, 100).unwrap())
    });
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
