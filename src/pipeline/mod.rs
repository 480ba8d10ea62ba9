//! Query orchestration
//!
//! [`QueryOrchestrator`] drives one query through ranking, authorization,
//! synthesis and suggestion, recording audit events at each milestone:
//!
//! ```text
//! Initiated -> Ranked -> Authorized -> Synthesized -> Suggested -> Completed
//!     \___________\___________\______________\______________> Failed
//! ```
//!
//! Ranking, authorization and synthesis failures are fatal. A suggestion
//! failure only leaves the suggestion list empty. Every call ends in a
//! [`QueryOutcome`]; no error or panic crosses this boundary.

#[cfg(test)]
mod tests;

mod cancel;
mod errors;

pub use cancel::CancellationToken;
pub use errors::{PipelineError, PipelineStage};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::access::{AccessError, AccessFilter, InMemoryUserDirectory, UserDirectory};
use crate::audit::{AuditError, AuditRecorder, InMemoryAuditLog};
use crate::config::{Config, PipelineConfig};
use crate::corpus::{CorpusError, DocumentCorpus};
use crate::embeddings::{Embedder, HashingEmbedder};
use crate::models::{
    AuditAction, AuditEvent, NewAuditEvent, NewDocument, Query, QueryOutcome, RagResponse,
    SharedDocument, User, generate_id,
};
use crate::search::{SearchStats, SimilarityRanker};
use crate::suggestions::{SuggestionGenerator, TopicSuggestionGenerator};
use crate::synthesis::{AnswerSynthesizer, TemplateSynthesizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Initiated,
    Ranked,
    Authorized,
    Synthesized,
    Suggested,
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiated => "initiated",
            Self::Ranked => "ranked",
            Self::Authorized => "authorized",
            Self::Synthesized => "synthesized",
            Self::Suggested => "suggested",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-call overrides of the configured pipeline behaviour
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub max_results: Option<usize>,
    pub synthesis_timeout: Option<Duration>,
    pub suggestion_timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl QueryOptions {
    #[inline]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    #[inline]
    pub fn with_synthesis_timeout(mut self, synthesis_timeout: Duration) -> Self {
        self.synthesis_timeout = Some(synthesis_timeout);
        self
    }

    #[inline]
    pub fn with_suggestion_timeout(mut self, suggestion_timeout: Duration) -> Self {
        self.suggestion_timeout = Some(suggestion_timeout);
        self
    }

    #[inline]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Pipeline controller shared by every concurrent query
#[derive(Clone)]
pub struct QueryOrchestrator {
    config: PipelineConfig,
    corpus: Arc<DocumentCorpus>,
    embedder: Arc<dyn Embedder>,
    ranker: SimilarityRanker,
    access: AccessFilter,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    suggester: Arc<dyn SuggestionGenerator>,
    audit: Arc<dyn AuditRecorder>,
}

impl QueryOrchestrator {
    /// Orchestrator with default pipeline settings and the bundled
    /// synthesizer and suggestion generator
    #[inline]
    pub fn new(
        corpus: Arc<DocumentCorpus>,
        embedder: Arc<dyn Embedder>,
        directory: Arc<dyn UserDirectory>,
        audit: Arc<dyn AuditRecorder>,
    ) -> Self {
        let config = PipelineConfig::default();
        Self {
            ranker: SimilarityRanker::new(config.max_results),
            config,
            corpus,
            embedder,
            access: AccessFilter::new(directory),
            synthesizer: Arc::new(TemplateSynthesizer::default()),
            suggester: Arc::new(TopicSuggestionGenerator::default()),
            audit,
        }
    }

    /// Wire up the in-memory pipeline described by `config`
    #[inline]
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(HashingEmbedder::new(config.embedding.dimension));
        let corpus = Arc::new(DocumentCorpus::with_chunk_size(config.corpus.chunk_size));

        if config.corpus.seed_samples {
            let seeded = corpus.seed_samples(embedder.as_ref())?;
            info!("Seeded corpus with {} sample documents", seeded.len());
        }

        Ok(Self::new(
            corpus,
            embedder,
            Arc::new(InMemoryUserDirectory::with_sample_users()),
            Arc::new(InMemoryAuditLog::new()),
        )
        .with_config(config.pipeline.clone())
        .with_synthesizer(Arc::new(TemplateSynthesizer::new(&config.synthesis)))
        .with_suggester(Arc::new(TopicSuggestionGenerator::new(&config.suggestions))))
    }

    #[inline]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.ranker = SimilarityRanker::new(config.max_results);
        self.config = config;
        self
    }

    #[inline]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    #[inline]
    pub fn with_suggester(mut self, suggester: Arc<dyn SuggestionGenerator>) -> Self {
        self.suggester = suggester;
        self
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    pub fn corpus(&self) -> &Arc<DocumentCorpus> {
        &self.corpus
    }

    /// Answer `query_text` on behalf of `user_id` with configured settings
    #[inline]
    pub async fn process_query(&self, user_id: &str, query_text: &str) -> QueryOutcome {
        self.process_query_with_options(user_id, query_text, QueryOptions::default())
            .await
    }

    #[inline]
    pub async fn process_query_with_options(
        &self,
        user_id: &str,
        query_text: &str,
        options: QueryOptions,
    ) -> QueryOutcome {
        let query_id = generate_id();
        info!("Processing query {} for user {}", query_id, user_id);

        let initiated = NewAuditEvent::new(user_id, AuditAction::QueryInitiated)
            .with_query_id(&query_id)
            .with_metadata("query_text", query_text);
        if let Err(e) = self.audit.record(initiated).await {
            warn!("Could not record query_initiated for {}: {}", query_id, e);
        }

        let result = self
            .run_stages(&query_id, user_id, query_text, options)
            .await;

        match &result {
            Ok(response) => {
                info!(
                    "Query {} completed with {} sources and {} suggestions",
                    query_id,
                    response.sources.len(),
                    response.suggestions.len()
                );
                let completed = NewAuditEvent::new(user_id, AuditAction::QueryCompleted)
                    .with_query_id(&query_id)
                    .with_metadata("query_id", query_id.as_str())
                    .with_metadata("response_id", response.id.as_str())
                    .with_metadata("source_count", response.sources.len());
                if let Err(e) = self.audit.record(completed).await {
                    error!("Could not record query_completed for {}: {}", query_id, e);
                }
            }
            Err(err) => {
                warn!("Query {} failed: {}", query_id, err);
                debug!("Query {} -> {}", query_id, PipelineState::Failed);
                let failed = NewAuditEvent::new(user_id, AuditAction::QueryFailed)
                    .with_query_id(&query_id)
                    .with_metadata("query_text", query_text)
                    .with_metadata("error", err.to_string());
                if let Err(e) = self.audit.record(failed).await {
                    error!("Could not record query_failed for {}: {}", query_id, e);
                }
            }
        }

        QueryOutcome {
            query_id,
            timestamp: Utc::now(),
            result,
        }
    }

    async fn run_stages(
        &self,
        query_id: &str,
        user_id: &str,
        query_text: &str,
        options: QueryOptions,
    ) -> Result<RagResponse, PipelineError> {
        let cancellation = options.cancellation.as_ref();
        let mut state = PipelineState::Initiated;

        self.validate(query_text)?;
        let query = Query {
            id: query_id.to_string(),
            user_id: user_id.to_string(),
            text: query_text.to_string(),
            embedding: self.embed(query_id, query_text),
            created_at: Utc::now(),
        };

        ensure_active(cancellation, PipelineStage::Ranking)?;
        let snapshot = self
            .corpus
            .snapshot()
            .map_err(|e| PipelineError::stage_failure(PipelineStage::Ranking, e))?;
        let limit = options.max_results.unwrap_or(self.config.max_results);
        let ranked = self
            .ranker
            .rank_documents(query.embedding.as_deref(), &snapshot, Some(limit))
            .map_err(|e| PipelineError::stage_failure(PipelineStage::Ranking, e))?;
        state = advance(query_id, state, PipelineState::Ranked);

        ensure_active(cancellation, PipelineStage::Authorization)?;
        let authorized = self
            .access
            .filter(user_id, &ranked)
            .await
            .map_err(|e| match e {
                AccessError::UserNotFound(id) => PipelineError::UserNotFound(id),
                other => PipelineError::stage_failure(PipelineStage::Authorization, other),
            })?;
        state = advance(query_id, state, PipelineState::Authorized);

        ensure_active(cancellation, PipelineStage::Synthesis)?;
        let synthesis = guarded_stage(
            PipelineStage::Synthesis,
            options
                .synthesis_timeout
                .unwrap_or_else(|| self.config.synthesis_timeout()),
            cancellation,
            self.synthesizer.synthesize(&query, &authorized),
        )
        .await?;
        state = advance(query_id, state, PipelineState::Synthesized);

        ensure_active(cancellation, PipelineStage::Suggestion)?;
        let suggestions = match guarded_stage(
            PipelineStage::Suggestion,
            options
                .suggestion_timeout
                .unwrap_or_else(|| self.config.suggestion_timeout()),
            cancellation,
            self.suggester
                .suggest(&query, &synthesis.answer, &authorized),
        )
        .await
        {
            Ok(suggestions) => suggestions,
            Err(err @ PipelineError::Cancelled { .. }) => return Err(err),
            Err(err) => {
                warn!("Continuing query {} without suggestions: {}", query_id, err);
                Vec::new()
            }
        };
        state = advance(query_id, state, PipelineState::Suggested);

        let response = RagResponse {
            id: generate_id(),
            query_id: query.id,
            answer: synthesis.answer,
            sources: authorized,
            suggestions,
            confidence: clamp_confidence(synthesis.confidence),
            timestamp: Utc::now(),
        };
        advance(query_id, state, PipelineState::Completed);

        Ok(response)
    }

    fn validate(&self, query_text: &str) -> Result<(), PipelineError> {
        if query_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "query text is empty".to_string(),
            ));
        }

        let length = query_text.chars().count();
        if length > self.config.max_query_length {
            return Err(PipelineError::InvalidInput(format!(
                "query text is {} characters, maximum is {}",
                length, self.config.max_query_length
            )));
        }

        Ok(())
    }

    /// A failed embedding leaves the query without a vector; ranking rejects it
    fn embed(&self, query_id: &str, query_text: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(query_text) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!("Could not embed query {}: {}", query_id, e);
                None
            }
        }
    }

    #[inline]
    pub async fn lookup_user(&self, user_id: &str) -> Result<User, AccessError> {
        self.access.lookup_user(user_id).await
    }

    #[inline]
    pub async fn get_user_info(&self, user_id: &str) -> Result<User, AccessError> {
        self.lookup_user(user_id).await
    }

    #[inline]
    pub async fn list_users(&self) -> Result<Vec<User>, AccessError> {
        self.access.list_users().await
    }

    #[inline]
    pub async fn check_permission(
        &self,
        user_id: &str,
        permission: &str,
    ) -> Result<bool, AccessError> {
        self.access.check_permission(user_id, permission).await
    }

    /// Events for `user_id` in the order they were recorded
    #[inline]
    pub async fn get_audit_trail(&self, user_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        self.audit.query_by_user(user_id).await
    }

    /// Up to `limit` events, most recent first
    #[inline]
    pub async fn get_recent_activity(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        self.audit.recent(limit).await
    }

    #[inline]
    pub async fn get_all_activity(&self) -> Result<Vec<AuditEvent>, AuditError> {
        self.audit.all().await
    }

    #[inline]
    pub fn corpus_stats(&self) -> Result<SearchStats, CorpusError> {
        let snapshot = self.corpus.snapshot()?;
        Ok(self.ranker.stats(&snapshot))
    }

    /// Embed and append a document on behalf of `user_id`
    ///
    /// Queries already running keep the snapshot they started with.
    #[inline]
    pub async fn ingest_document(
        &self,
        user_id: &str,
        document: NewDocument,
    ) -> Result<Vec<SharedDocument>, CorpusError> {
        let title = document.title.clone();
        let stored = self.corpus.ingest(document, self.embedder.as_ref())?;
        debug!(
            "User {} ingested \"{}\" as {} documents",
            user_id,
            title,
            stored.len()
        );

        let ids: Vec<serde_json::Value> = stored
            .iter()
            .map(|doc| serde_json::Value::from(doc.id.as_str()))
            .collect();
        let event = NewAuditEvent::new(user_id, AuditAction::DocumentIngested)
            .with_metadata("title", title)
            .with_metadata("document_ids", ids);
        if let Err(e) = self.audit.record(event).await {
            warn!("Could not record document_ingested for {}: {}", user_id, e);
        }

        Ok(stored)
    }
}

fn advance(query_id: &str, from: PipelineState, to: PipelineState) -> PipelineState {
    debug!("Query {}: {} -> {}", query_id, from, to);
    to
}

fn ensure_active(
    cancellation: Option<&CancellationToken>,
    stage: PipelineStage,
) -> Result<(), PipelineError> {
    match cancellation {
        Some(token) if token.is_cancelled() => Err(PipelineError::Cancelled { stage }),
        _ => Ok(()),
    }
}

/// Run a collaborator call under a deadline, racing it against cancellation
async fn guarded_stage<T, E, F>(
    stage: PipelineStage,
    deadline: Duration,
    cancellation: Option<&CancellationToken>,
    call: F,
) -> Result<T, PipelineError>
where
    E: fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let timed = timeout(deadline, call);
    let outcome = match cancellation {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => return Err(PipelineError::Cancelled { stage }),
                outcome = timed => outcome,
            }
        }
        None => timed.await,
    };

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::stage_failure(stage, e)),
        Err(_) => Err(PipelineError::Timeout {
            stage,
            timeout: deadline,
        }),
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
