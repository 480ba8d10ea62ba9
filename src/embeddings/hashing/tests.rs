use super::*;
use crate::search::cosine_similarity;

#[test]
fn embedding_has_configured_dimension() {
    let embedder = HashingEmbedder::new(64);
    let vector = embedder
        .embed("remote work policy")
        .expect("can embed text");
    assert_eq!(vector.len(), 64);
    assert_eq!(embedder.dimension(), 64);
}

#[test]
fn embedding_is_deterministic_and_normalized() {
    let embedder = HashingEmbedder::default();
    let first = embedder.embed("Technical architecture guide").expect("can embed");
    let second = embedder.embed("technical ARCHITECTURE guide!").expect("can embed");
    assert_eq!(first, second);

    let norm = first.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn blank_text_is_rejected() {
    let embedder = HashingEmbedder::default();
    assert_eq!(embedder.embed(""), Err(EmbeddingError::EmptyInput));
    assert_eq!(embedder.embed("  \n\t "), Err(EmbeddingError::EmptyInput));
}

#[test]
fn stop_words_and_punctuation_embed_to_zero_vector() {
    let embedder = HashingEmbedder::new(16);
    for text in ["What is it?", "???", "what is the"] {
        let vector = embedder.embed(text).expect("can embed tokenless text");
        assert_eq!(vector.len(), 16, "{}", text);
        assert!(vector.iter().all(|x| *x == 0.0), "{}", text);
    }
}

#[test]
fn shared_vocabulary_scores_higher() {
    let embedder = HashingEmbedder::default();
    let query = embedder.embed("company policy integrity").expect("can embed");
    let related = embedder
        .embed("Company Policy Manual: our company values integrity and conduct")
        .expect("can embed");
    let unrelated = embedder
        .embed("Microservices follow domain driven design with service boundaries")
        .expect("can embed");

    assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
}

#[test]
fn tokenizer_drops_punctuation_and_stop_words() {
    assert_eq!(
        tokenize("What is our remote-work policy?"),
        vec!["remote", "work", "policy"]
    );
}
