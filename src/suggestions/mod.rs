//! Follow-up question generation


use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use thiserror::Error;
use tokio::time::sleep;

use crate::config::SuggestionsConfig;
use crate::models::{Query, SharedDocument};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuggestionError {
    #[error("Suggestion backend unavailable: {0}")]
    Unavailable(String),
    #[error("Suggestion generation failed: {0}")]
    Generation(String),
}

/// Produces follow-up questions for an answered query
///
/// Must tolerate an empty source list. Shared across concurrent queries.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn suggest(
        &self,
        query: &Query,
        answer: &str,
        sources: &[SharedDocument],
    ) -> Result<Vec<String>, SuggestionError>;
}

struct KeywordRule {
    keywords: &'static [&'static str],
    suggestions: [&'static str; 3],
}

const KEYWORD_RULES: [KeywordRule; 3] = [
    KeywordRule {
        keywords: &["policy"],
        suggestions: [
            "What are the specific compliance requirements?",
            "How are policy violations handled?",
            "When was this policy last updated?",
        ],
    },
    KeywordRule {
        keywords: &["architecture", "technical"],
        suggestions: [
            "What are the scalability considerations?",
            "How do you handle service failures?",
            "What monitoring tools are recommended?",
        ],
    },
    KeywordRule {
        keywords: &["performance", "success"],
        suggestions: [
            "What metrics were used to measure success?",
            "How does this compare to industry standards?",
            "What were the main challenges overcome?",
        ],
    },
];

const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Can you provide more specific examples?",
    "What are the implementation steps?",
    "Are there any potential limitations?",
];

const TAG_SUGGESTIONS: [(&str, &str); 2] = [
    ("security", "What are the security implications?"),
    ("performance", "How can performance be optimized?"),
];

const POPULAR_QUERIES: [&str; 5] = [
    "What is our company policy on remote work?",
    "How does the microservices architecture work?",
    "What are our latest client success stories?",
    "What are the security best practices?",
    "How do we handle data privacy?",
];

/// Deterministic rule-based generator keyed on query keywords and source tags
#[derive(Debug, Clone)]
pub struct TopicSuggestionGenerator {
    max_suggestions: usize,
    latency: Duration,
}

impl Default for TopicSuggestionGenerator {
    #[inline]
    fn default() -> Self {
        Self::new(&SuggestionsConfig::default())
    }
}

impl TopicSuggestionGenerator {
    #[inline]
    pub fn new(config: &SuggestionsConfig) -> Self {
        Self {
            max_suggestions: config.max_suggestions,
            latency: Duration::from_millis(config.simulated_latency_ms),
        }
    }

    #[inline]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[inline]
    pub fn popular_queries(&self) -> Vec<String> {
        POPULAR_QUERIES.iter().map(ToString::to_string).collect()
    }

    /// Candidate suggestions in priority order, before de-duplication and truncation
    fn candidates(query_text: &str, sources: &[SharedDocument]) -> Vec<&'static str> {
        let text = query_text.to_lowercase();

        let tagged = TAG_SUGGESTIONS
            .iter()
            .filter(|(tag, _)| sources.iter().any(|doc| doc.has_tag(tag)))
            .map(|(_, suggestion)| *suggestion);

        let keyword = KEYWORD_RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| text.contains(k)))
            .map_or(GENERIC_SUGGESTIONS, |rule| rule.suggestions);

        tagged.chain(keyword).collect()
    }
}

#[async_trait]
impl SuggestionGenerator for TopicSuggestionGenerator {
    #[inline]
    async fn suggest(
        &self,
        query: &Query,
        _answer: &str,
        sources: &[SharedDocument],
    ) -> Result<Vec<String>, SuggestionError> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        Ok(Self::candidates(&query.text, sources)
            .into_iter()
            .unique()
            .take(self.max_suggestions)
            .map(ToString::to_string)
            .collect())
    }
}
