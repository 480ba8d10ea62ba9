//! Answer synthesis
//!
//! The pipeline only depends on the [`AnswerSynthesizer`] contract. The
//! bundled [`TemplateSynthesizer`] stands in for language-model inference:
//! it is deterministic, quotes the authorized sources, and can simulate
//! inference latency.


use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::models::{Query, SharedDocument};

/// Confidence reported when no authorized source backs the answer
pub const NO_CONTEXT_CONFIDENCE: f32 = 0.2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),
    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Answer text and the synthesizer's confidence in it
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    /// Expected within `[0.0, 1.0]`; the orchestrator clamps it regardless
    pub confidence: f32,
}

/// Produces an answer from a query and the documents the user may read
///
/// Implementations are shared between concurrent queries and must not keep
/// per-query mutable state.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        query: &Query,
        documents: &[SharedDocument],
    ) -> Result<Synthesis, SynthesisError>;
}

#[derive(Debug, Clone)]
pub struct TemplateSynthesizer {
    latency: Duration,
    excerpt_chars: usize,
}

impl Default for TemplateSynthesizer {
    #[inline]
    fn default() -> Self {
        Self::new(&SynthesisConfig::default())
    }
}

impl TemplateSynthesizer {
    #[inline]
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            latency: Duration::from_millis(config.simulated_latency_ms),
            excerpt_chars: config.excerpt_chars,
        }
    }

    #[inline]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// One-paragraph summary of a document set and the topics it covers
    #[inline]
    pub fn summarize(&self, documents: &[SharedDocument]) -> String {
        let topics: BTreeSet<&str> = documents
            .iter()
            .flat_map(|doc| doc.metadata.tags.iter().map(String::as_str))
            .collect();

        if topics.is_empty() {
            return format!(
                "Summary of {} documents with no tagged topics.",
                documents.len()
            );
        }

        format!(
            "Summary of {} documents covering topics: {}.",
            documents.len(),
            topics.into_iter().collect::<Vec<_>>().join(", ")
        )
    }

    fn excerpt(&self, documents: &[SharedDocument]) -> String {
        let context = documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut excerpt: String = context.chars().take(self.excerpt_chars).collect();
        if context.chars().count() > self.excerpt_chars {
            excerpt.push_str("...");
        }
        excerpt
    }
}

#[async_trait]
impl AnswerSynthesizer for TemplateSynthesizer {
    #[inline]
    async fn synthesize(
        &self,
        query: &Query,
        documents: &[SharedDocument],
    ) -> Result<Synthesis, SynthesisError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        if documents.is_empty() {
            debug!("No authorized context for query {}", query.id);
            return Ok(Synthesis {
                answer: format!(
                    "I could not find any documents you are authorized to read that relate to \"{}\".",
                    query.text.trim()
                ),
                confidence: NO_CONTEXT_CONFIDENCE,
            });
        }

        let text = query.text.to_lowercase();
        let titles = documents
            .iter()
            .map(|doc| doc.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let lead = if text.contains("policy") {
            "our company policy emphasizes"
        } else if text.contains("architecture") {
            "our microservices architecture involves"
        } else if text.contains("success") {
            "client outcomes show"
        } else {
            "the relevant material states"
        };

        let answer = format!(
            "Based on {} ({}), {}: {}",
            pluralize_sources(documents.len()),
            titles,
            lead,
            self.excerpt(documents)
        );

        // More corroborating sources, more confidence, capped below certainty
        let corroboration = documents.len().min(5) as f32 / 5.0;
        let confidence = 0.85 + 0.1 * corroboration;

        Ok(Synthesis { answer, confidence })
    }
}

fn pluralize_sources(count: usize) -> String {
    if count == 1 {
        "1 source".to_string()
    } else {
        format!("{} sources", count)
    }
}
