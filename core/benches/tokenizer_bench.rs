use criterion::{criterion_group, criterion_main, Criterion};
use sri_core::store::MemoryIndexStore;
use sri_core::tokenizer::tokenize;
use sri_core::{Bm25Params, Model, ModelIndex, NewDocument};

const TEXT: &str = "Inverted indices map every normalized term to the documents containing it. \
    Ranking functions such as TF-IDF and BM25 weigh term frequency against document frequency, \
    and BM25 additionally normalizes by document length relative to the corpus average.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_paragraph", |b| b.iter(|| tokenize(TEXT)));
}

fn bench_search(c: &mut Criterion) {
    let index = ModelIndex::open(Model::Bm25, Bm25Params::default(), Box::new(MemoryIndexStore::new())).expect("open");
    let words: Vec<&str> = TEXT.split_whitespace().collect();
    for i in 0..2_000u64 {
        let body: Vec<&str> = words.iter().cycle().skip(i as usize % words.len()).take(12 + (i as usize % 30)).copied().collect();
        index.add_document(&NewDocument::new(format!("doc {i}"), body.join(" ")).with_id(i)).expect("add");
    }
    c.bench_function("bm25_search_two_terms", |b| b.iter(|| index.search("document frequency", 10)));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
