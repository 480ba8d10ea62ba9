use criterion::{Criterion, criterion_group, criterion_main};
use rag_pipeline::access::{filter_documents, sample_users};
use rag_pipeline::corpus::DocumentCorpus;
use rag_pipeline::embeddings::{Embedder, HashingEmbedder};
use rag_pipeline::models::NewDocument;
use rag_pipeline::search::SimilarityRanker;
use std::hint::black_box;

const TOPICS: [&str; 4] = ["policy", "architecture", "success", "security"];
const LEVELS: [&str; 3] = ["public", "internal", "engineering"];

pub fn criterion_benchmark(c: &mut Criterion) {
    let embedder = HashingEmbedder::default();
    let corpus = DocumentCorpus::new();
    for i in 0..1000 {
        let topic = TOPICS[i % TOPICS.len()];
        corpus
            .ingest(
                NewDocument {
                    title: format!("{} note {}", topic, i),
                    content: format!(
                        "Document {} discusses {} guidelines, reviews and follow-up actions.",
                        i, topic
                    ),
                    source: "bench".to_string(),
                    tags: vec![topic.to_string()],
                    access_level: LEVELS[i % LEVELS.len()].to_string(),
                },
                &embedder,
            )
            .expect("can ingest bench document");
    }
    let snapshot = corpus.snapshot().expect("can snapshot corpus");
    let query = embedder
        .embed("What are the security guidelines?")
        .expect("can embed query");
    let ranker = SimilarityRanker::new(5);

    c.bench_function("rank_1000", |b| {
        b.iter(|| ranker.rank(black_box(Some(query.as_slice())), black_box(&snapshot), None));
    });

    let users = sample_users();
    c.bench_function("filter_1000", |b| {
        b.iter(|| filter_documents(black_box(&users[1]), black_box(&snapshot)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
