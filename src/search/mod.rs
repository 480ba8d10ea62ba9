//! Similarity ranking
//!
//! Brute-force cosine similarity over a corpus snapshot. The ranker never
//! drops documents for lacking an embedding; they score `0.0` and may still
//! surface when nothing scores higher, so downstream stages must not treat
//! rank as proof of relevance.


use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::SharedDocument;

/// Ranked results returned when the caller does not specify a limit
pub const DEFAULT_RESULT_LIMIT: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// A document paired with its similarity to the query
#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub document: SharedDocument,
    /// Cosine similarity in `[-1.0, 1.0]`
    pub score: f32,
}

/// Corpus statistics reported alongside search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub total_documents: usize,
    pub embedded_documents: usize,
    /// Dimension of the first embedded document, `0` if none are embedded
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityRanker {
    default_limit: usize,
}

impl Default for SimilarityRanker {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_LIMIT)
    }
}

impl SimilarityRanker {
    #[inline]
    pub fn new(default_limit: usize) -> Self {
        Self { default_limit }
    }

    #[inline]
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Rank `documents` against `query_vector`, keeping at most `limit`
    ///
    /// Results are ordered by descending similarity. Documents with equal
    /// scores keep their input order.
    #[inline]
    pub fn rank(
        &self,
        query_vector: Option<&[f32]>,
        documents: &[SharedDocument],
        limit: Option<usize>,
    ) -> Result<Vec<RankedDocument>, RankError> {
        let query_vector = query_vector
            .ok_or_else(|| RankError::InvalidInput("query embedding not provided".to_string()))?;
        let limit = limit.unwrap_or(self.default_limit);

        let mut ranked: Vec<RankedDocument> = documents
            .iter()
            .map(|document| RankedDocument {
                score: document
                    .embedding
                    .as_deref()
                    .map_or(0.0, |embedding| cosine_similarity(query_vector, embedding)),
                document: Arc::clone(document),
            })
            .collect();

        // `sort_by` is stable, which gives first-seen-wins on ties
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(limit);

        debug!(
            "Ranked {} documents, returning top {}",
            documents.len(),
            ranked.len()
        );
        Ok(ranked)
    }

    /// Same as [`SimilarityRanker::rank`] but returns only the documents
    #[inline]
    pub fn rank_documents(
        &self,
        query_vector: Option<&[f32]>,
        documents: &[SharedDocument],
        limit: Option<usize>,
    ) -> Result<Vec<SharedDocument>, RankError> {
        Ok(self
            .rank(query_vector, documents, limit)?
            .into_iter()
            .map(|ranked| ranked.document)
            .collect())
    }

    #[inline]
    pub fn stats(&self, documents: &[SharedDocument]) -> SearchStats {
        let mut embedded = documents.iter().filter_map(|doc| doc.embedding.as_ref());
        let embedding_dimension = embedded.next().map_or(0, Vec::len);

        SearchStats {
            total_documents: documents.len(),
            embedded_documents: documents
                .iter()
                .filter(|doc| doc.embedding.is_some())
                .count(),
            embedding_dimension,
        }
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns `0.0` instead of dividing by zero: for empty vectors, vectors of
/// different lengths, zero-magnitude vectors, and any non-finite result.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    let similarity = dot / denom;
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
