//! Shared document corpus
//!
//! Readers take a snapshot (`Arc` clone) that stays consistent for the whole
//! query; ingestion appends copy-on-write and never touches stored documents.


use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::embeddings::{Embedder, EmbeddingError};
use crate::models::{Document, DocumentMetadata, NewDocument, SharedDocument, generate_id};

/// Default maximum characters per ingested chunk
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Embedding dimension mismatch: corpus uses {expected}, document has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Document content is empty")]
    EmptyContent,
    #[error("Failed to embed document: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Corpus lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Immutable view of the corpus at a point in time
pub type CorpusSnapshot = Arc<Vec<SharedDocument>>;

#[derive(Debug)]
pub struct DocumentCorpus {
    documents: RwLock<CorpusSnapshot>,
    chunk_size: usize,
}

impl Default for DocumentCorpus {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentCorpus {
    #[inline]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    #[inline]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            documents: RwLock::new(Arc::new(Vec::new())),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Build a corpus from existing documents, keeping their order
    #[inline]
    pub fn from_documents<I>(documents: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = Document>,
    {
        let corpus = Self::new();
        for document in documents {
            corpus.append(document)?;
        }
        Ok(corpus)
    }

    /// Consistent view of every document stored so far
    #[inline]
    pub fn snapshot(&self) -> Result<CorpusSnapshot, CorpusError> {
        let guard = self
            .documents
            .read()
            .map_err(|e| CorpusError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(&*guard))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |snapshot| snapshot.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension shared by every embedded document, once one exists
    #[inline]
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.snapshot().ok().and_then(|snapshot| {
            snapshot
                .iter()
                .find_map(|doc| doc.embedding.as_ref().map(Vec::len))
        })
    }

    /// Append a fully formed document
    ///
    /// Rejects embeddings whose length differs from the corpus dimension.
    #[inline]
    pub fn append(&self, document: Document) -> Result<SharedDocument, CorpusError> {
        let shared = Arc::new(document);
        self.publish(std::slice::from_ref(&shared))?;
        Ok(shared)
    }

    /// Publish `documents` under one write lock, all of them or none
    fn publish(&self, documents: &[SharedDocument]) -> Result<(), CorpusError> {
        let mut guard = self
            .documents
            .write()
            .map_err(|e| CorpusError::LockPoisoned(e.to_string()))?;

        let mut expected = guard
            .iter()
            .find_map(|doc| doc.embedding.as_ref().map(Vec::len));
        for actual in documents
            .iter()
            .filter_map(|doc| doc.embedding.as_ref().map(Vec::len))
        {
            match expected {
                Some(expected) if expected != actual => {
                    return Err(CorpusError::DimensionMismatch { expected, actual });
                }
                Some(_) => {}
                None => expected = Some(actual),
            }
        }

        // Clones the vector only while some reader still holds the old snapshot
        Arc::make_mut(&mut *guard).extend(documents.iter().cloned());
        for document in documents {
            debug!("Appended document {} ({})", document.id, document.title);
        }
        Ok(())
    }

    /// Embed and store a new document, splitting long content into chunks
    #[inline]
    pub fn ingest(
        &self,
        new_document: NewDocument,
        embedder: &dyn Embedder,
    ) -> Result<Vec<SharedDocument>, CorpusError> {
        if new_document.content.trim().is_empty() {
            return Err(CorpusError::EmptyContent);
        }

        let chunks = chunk_text(&new_document.content, self.chunk_size);
        let total = chunks.len();
        let created_at = Utc::now();

        let mut prepared = Vec::with_capacity(total);
        for (index, chunk) in chunks.into_iter().enumerate() {
            let title = if total > 1 {
                format!("{} (part {}/{})", new_document.title, index + 1, total)
            } else {
                new_document.title.clone()
            };
            let embedding = embedder.embed(&format!("{}\n{}", title, chunk))?;

            prepared.push(Arc::new(Document {
                id: generate_id(),
                title,
                content: chunk,
                embedding: Some(embedding),
                metadata: DocumentMetadata {
                    source: new_document.source.clone(),
                    tags: new_document.tags.clone(),
                    access_level: new_document.access_level.clone(),
                    created_at,
                },
            }));
        }

        self.publish(&prepared)?;
        info!(
            "Ingested '{}' as {} document(s)",
            new_document.title,
            prepared.len()
        );
        Ok(prepared)
    }

    /// Load the built-in demonstration documents
    #[inline]
    pub fn seed_samples(&self, embedder: &dyn Embedder) -> Result<Vec<SharedDocument>, CorpusError> {
        let mut stored = Vec::new();
        for sample in sample_documents() {
            stored.extend(self.ingest(sample, embedder)?);
        }
        Ok(stored)
    }
}

/// The three demonstration documents, one per access level
#[inline]
pub fn sample_documents() -> Vec<NewDocument> {
    vec![
        NewDocument {
            title: "Company Policy Manual".to_string(),
            content: "Our company values integrity, innovation, and customer satisfaction. We maintain the highest standards of professional conduct...".to_string(),
            source: "hr-docs".to_string(),
            tags: vec!["policy".to_string(), "hr".to_string(), "conduct".to_string()],
            access_level: "internal".to_string(),
        },
        NewDocument {
            title: "Technical Architecture Guide".to_string(),
            content: "Our microservices architecture follows domain-driven design principles with clear service boundaries...".to_string(),
            source: "tech-docs".to_string(),
            tags: vec![
                "architecture".to_string(),
                "microservices".to_string(),
                "technical".to_string(),
            ],
            access_level: "engineering".to_string(),
        },
        NewDocument {
            title: "Customer Success Stories".to_string(),
            content: "Client feedback shows 98% satisfaction rate with our RAG implementation, reducing query response time by 75%...".to_string(),
            source: "marketing".to_string(),
            tags: vec![
                "success".to_string(),
                "client".to_string(),
                "case-study".to_string(),
            ],
            access_level: "public".to_string(),
        },
    ]
}

/// Split text into pieces of at most `max_chars` characters
///
/// Prefers breaking at whitespace; a single word longer than `max_chars` is
/// split mid-word.
#[inline]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word_chars: Vec<char> = word.chars().collect();

        while word_chars.len() > max_chars {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word_chars.split_off(max_chars);
            chunks.push(word_chars.into_iter().collect());
            word_chars = rest;
        }

        let separator = usize::from(current_len > 0);
        if current_len + separator + word_chars.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word_chars.len();
        current.extend(word_chars);
    }

    if current_len > 0 {
        chunks.push(current);
    }

    chunks
}
