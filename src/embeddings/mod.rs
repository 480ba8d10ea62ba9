// Embeddings module
// Query and document embedding behind a swappable trait

pub mod hashing;

use thiserror::Error;

pub use hashing::HashingEmbedder;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("Cannot embed empty text")]
    EmptyInput,
    #[error("Embedding backend failed: {0}")]
    Backend(String),
}

/// Turns text into a fixed-dimension vector
///
/// Implementations must be deterministic for a given input so that the
/// ranking stage can be reproduced in tests.
pub trait Embedder: Send + Sync {
    /// Vector length produced by [`Embedder::embed`]
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
