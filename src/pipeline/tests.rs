use super::*;
use crate::audit::AuditError;
use crate::config::{SuggestionsConfig, SynthesisConfig};
use crate::embeddings::EmbeddingError;
use crate::models::{Document, DocumentMetadata};
use crate::suggestions::SuggestionError;
use crate::synthesis::{Synthesis, SynthesisError};
use async_trait::async_trait;
use tokio::time::sleep;

/// Three-axis embedder: policy, architecture, success
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let text = text.to_lowercase();
        let axis = |keyword: &str| if text.contains(keyword) { 1.0 } else { 0.0 };
        Ok(vec![axis("policy"), axis("architecture"), axis("success")])
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dimension(&self) -> usize {
        3
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Backend("model offline".to_string()))
    }
}

struct FailingSuggester;

#[async_trait]
impl SuggestionGenerator for FailingSuggester {
    async fn suggest(
        &self,
        _query: &Query,
        _answer: &str,
        _sources: &[SharedDocument],
    ) -> Result<Vec<String>, SuggestionError> {
        Err(SuggestionError::Generation("boom".to_string()))
    }
}

struct SlowSuggester;

#[async_trait]
impl SuggestionGenerator for SlowSuggester {
    async fn suggest(
        &self,
        _query: &Query,
        _answer: &str,
        _sources: &[SharedDocument],
    ) -> Result<Vec<String>, SuggestionError> {
        sleep(Duration::from_secs(60)).await;
        Ok(vec!["too late".to_string()])
    }
}

struct FailingSynthesizer;

#[async_trait]
impl AnswerSynthesizer for FailingSynthesizer {
    async fn synthesize(
        &self,
        _query: &Query,
        _documents: &[SharedDocument],
    ) -> Result<Synthesis, SynthesisError> {
        Err(SynthesisError::Unavailable("no capacity".to_string()))
    }
}

struct SlowSynthesizer;

#[async_trait]
impl AnswerSynthesizer for SlowSynthesizer {
    async fn synthesize(
        &self,
        _query: &Query,
        _documents: &[SharedDocument],
    ) -> Result<Synthesis, SynthesisError> {
        sleep(Duration::from_secs(120)).await;
        Ok(Synthesis {
            answer: "eventually".to_string(),
            confidence: 0.9,
        })
    }
}

/// Reports whatever confidence it was built with
struct FixedConfidenceSynthesizer(f32);

#[async_trait]
impl AnswerSynthesizer for FixedConfidenceSynthesizer {
    async fn synthesize(
        &self,
        _query: &Query,
        _documents: &[SharedDocument],
    ) -> Result<Synthesis, SynthesisError> {
        Ok(Synthesis {
            answer: "fixed".to_string(),
            confidence: self.0,
        })
    }
}

struct UnavailableAudit;

#[async_trait]
impl AuditRecorder for UnavailableAudit {
    async fn record(&self, _event: NewAuditEvent) -> Result<AuditEvent, AuditError> {
        Err(AuditError::Unavailable("disk full".to_string()))
    }

    async fn query_by_user(&self, _user_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }

    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(Vec::new())
    }
}

fn document(id: &str, access_level: &str, embedding: [f32; 3]) -> Document {
    Document {
        id: id.to_string(),
        title: format!("{} document", id),
        content: format!("Details about {}.", id),
        embedding: Some(embedding.to_vec()),
        metadata: DocumentMetadata {
            source: "tests".to_string(),
            tags: vec![id.to_string()],
            access_level: access_level.to_string(),
            created_at: Utc::now(),
        },
    }
}

fn corpus() -> Arc<DocumentCorpus> {
    Arc::new(
        DocumentCorpus::from_documents([
            document("policy", "internal", [1.0, 0.0, 0.0]),
            document("architecture", "engineering", [0.0, 1.0, 0.0]),
            document("success", "public", [0.0, 0.0, 1.0]),
        ])
        .expect("can build corpus"),
    )
}

fn orchestrator_with(
    embedder: Arc<dyn Embedder>,
    audit: Arc<dyn AuditRecorder>,
) -> QueryOrchestrator {
    QueryOrchestrator::new(
        corpus(),
        embedder,
        Arc::new(InMemoryUserDirectory::with_sample_users()),
        audit,
    )
    .with_synthesizer(Arc::new(TemplateSynthesizer::new(&SynthesisConfig {
        simulated_latency_ms: 0,
        excerpt_chars: 200,
    })))
    .with_suggester(Arc::new(TopicSuggestionGenerator::new(
        &SuggestionsConfig {
            max_suggestions: 3,
            simulated_latency_ms: 0,
        },
    )))
}

fn orchestrator() -> QueryOrchestrator {
    orchestrator_with(Arc::new(KeywordEmbedder), Arc::new(InMemoryAuditLog::new()))
}

fn actions(events: &[AuditEvent]) -> Vec<AuditAction> {
    events.iter().map(|event| event.action).collect()
}

#[tokio::test]
async fn happy_path_returns_best_match_and_records_completion() {
    let pipeline = orchestrator();
    let outcome = pipeline
        .process_query("user-2", "What is our company policy?")
        .await;

    let response = outcome.response().expect("query succeeds");
    assert_eq!(response.sources[0].id, "policy");
    assert!(!response.answer.is_empty());
    assert_eq!(response.query_id, outcome.query_id);
    assert_eq!(response.suggestions.len(), 3);
    assert!((0.0..=1.0).contains(&response.confidence));

    let trail = pipeline
        .get_audit_trail("user-2")
        .await
        .expect("can read trail");
    assert_eq!(
        actions(&trail),
        vec![AuditAction::QueryInitiated, AuditAction::QueryCompleted]
    );
    let completed = &trail[1];
    assert_eq!(completed.query_id.as_deref(), Some(outcome.query_id.as_str()));
    assert_eq!(
        completed.metadata.get("query_id"),
        Some(&serde_json::Value::from(outcome.query_id.as_str()))
    );
    assert_eq!(
        completed.metadata.get("response_id"),
        Some(&serde_json::Value::from(response.id.as_str()))
    );
    assert_eq!(
        completed.metadata.get("source_count"),
        Some(&serde_json::Value::from(response.sources.len()))
    );
}

#[tokio::test]
async fn sources_are_limited_to_what_the_user_may_read() {
    let pipeline = orchestrator();
    let admin = pipeline.process_query("user-1", "architecture").await;
    let guest = pipeline.process_query("user-3", "architecture").await;

    let admin_ids: Vec<_> = admin
        .response()
        .expect("admin query succeeds")
        .sources
        .iter()
        .map(|doc| doc.id.clone())
        .collect();
    assert_eq!(admin_ids[0], "architecture");
    assert_eq!(admin_ids.len(), 3);

    let guest_ids: Vec<_> = guest
        .response()
        .expect("guest query succeeds")
        .sources
        .iter()
        .map(|doc| doc.id.clone())
        .collect();
    assert_eq!(guest_ids, vec!["success"]);
}

#[tokio::test]
async fn suggestion_failure_is_not_fatal() {
    let pipeline = orchestrator().with_suggester(Arc::new(FailingSuggester));
    let outcome = pipeline.process_query("user-1", "policy").await;

    let response = outcome.response().expect("query still succeeds");
    assert!(response.suggestions.is_empty());
    assert!(!response.answer.is_empty());
}

#[tokio::test(start_paused = true)]
async fn suggestion_timeout_is_not_fatal() {
    let pipeline = orchestrator().with_suggester(Arc::new(SlowSuggester));
    let outcome = pipeline
        .process_query_with_options(
            "user-1",
            "policy",
            QueryOptions::default().with_suggestion_timeout(Duration::from_millis(50)),
        )
        .await;

    assert!(
        outcome
            .response()
            .expect("query still succeeds")
            .suggestions
            .is_empty()
    );
}

#[tokio::test]
async fn zero_authorized_documents_is_a_degraded_success() {
    let pipeline = orchestrator().with_config(PipelineConfig {
        max_results: 1,
        ..PipelineConfig::default()
    });

    // Only the internal policy document survives ranking; the guest cannot read it
    let outcome = pipeline.process_query("user-3", "policy").await;
    let response = outcome.response().expect("degraded query succeeds");
    assert!(response.sources.is_empty());
    assert!(!response.answer.is_empty());
    assert!(response.confidence < 0.5);

    let trail = pipeline
        .get_audit_trail("user-3")
        .await
        .expect("can read trail");
    assert_eq!(
        actions(&trail),
        vec![AuditAction::QueryInitiated, AuditAction::QueryCompleted]
    );
    assert_eq!(
        trail[1].metadata.get("source_count"),
        Some(&serde_json::Value::from(0_usize))
    );
}

#[tokio::test]
async fn unknown_user_fails_authorization() {
    let pipeline = orchestrator();
    let outcome = pipeline.process_query("ghost", "policy").await;

    assert!(!outcome.is_success());
    assert_eq!(
        outcome.error(),
        Some(&PipelineError::UserNotFound("ghost".to_string()))
    );
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("authorization failed: user ghost not found")
    );

    let trail = pipeline
        .get_audit_trail("ghost")
        .await
        .expect("can read trail");
    assert_eq!(
        actions(&trail),
        vec![AuditAction::QueryInitiated, AuditAction::QueryFailed]
    );
    assert_eq!(
        trail[1].metadata.get("query_text"),
        Some(&serde_json::Value::from("policy"))
    );
    assert_eq!(
        trail[1].metadata.get("error"),
        Some(&serde_json::Value::from(
            "authorization failed: user ghost not found"
        ))
    );
}

#[tokio::test]
async fn invalid_query_text_is_rejected() {
    let pipeline = orchestrator().with_config(PipelineConfig {
        max_query_length: 10,
        ..PipelineConfig::default()
    });

    let empty = pipeline.process_query("user-1", "   ").await;
    assert!(matches!(empty.error(), Some(PipelineError::InvalidInput(_))));

    let long = pipeline
        .process_query("user-1", "an overly long policy question")
        .await;
    assert!(matches!(long.error(), Some(PipelineError::InvalidInput(_))));

    let trail = pipeline
        .get_audit_trail("user-1")
        .await
        .expect("can read trail");
    assert_eq!(
        actions(&trail),
        vec![
            AuditAction::QueryInitiated,
            AuditAction::QueryFailed,
            AuditAction::QueryInitiated,
            AuditAction::QueryFailed,
        ]
    );
}

#[tokio::test]
async fn missing_embedding_fails_ranking() {
    let pipeline = orchestrator_with(Arc::new(BrokenEmbedder), Arc::new(InMemoryAuditLog::new()));
    let outcome = pipeline.process_query("user-1", "policy").await;

    let error = outcome.error().expect("query fails");
    assert_eq!(error.stage(), Some(PipelineStage::Ranking));
    assert!(error.to_string().starts_with("ranking failed"));
}

#[tokio::test]
async fn stop_word_query_is_answered_in_corpus_order() {
    let pipeline = orchestrator_with(
        Arc::new(HashingEmbedder::new(3)),
        Arc::new(InMemoryAuditLog::new()),
    );

    for text in ["What is it?", "???"] {
        let outcome = pipeline.process_query("user-1", text).await;
        let ids: Vec<_> = outcome
            .response()
            .expect("tokenless query succeeds")
            .sources
            .iter()
            .map(|doc| doc.id.clone())
            .collect();
        assert_eq!(ids, vec!["policy", "architecture", "success"], "{}", text);
    }
}

#[tokio::test]
async fn synthesis_failure_is_fatal() {
    let pipeline = orchestrator().with_synthesizer(Arc::new(FailingSynthesizer));
    let outcome = pipeline.process_query("user-1", "policy").await;

    let message = outcome.error_message().expect("query fails");
    assert_eq!(message, "synthesis failed: Model unavailable: no capacity");
}

#[tokio::test(start_paused = true)]
async fn synthesis_timeout_is_fatal() {
    let pipeline = orchestrator().with_synthesizer(Arc::new(SlowSynthesizer));
    let outcome = pipeline
        .process_query_with_options(
            "user-1",
            "policy",
            QueryOptions::default().with_synthesis_timeout(Duration::from_secs(2)),
        )
        .await;

    assert_eq!(
        outcome.error(),
        Some(&PipelineError::Timeout {
            stage: PipelineStage::Synthesis,
            timeout: Duration::from_secs(2),
        })
    );
    assert_eq!(
        outcome.error_message().as_deref(),
        Some("synthesis failed: timed out after 2000ms")
    );
}

#[tokio::test]
async fn audit_outage_does_not_change_the_result() {
    let pipeline = orchestrator_with(Arc::new(KeywordEmbedder), Arc::new(UnavailableAudit));

    let ok = pipeline.process_query("user-1", "policy").await;
    assert!(ok.is_success());

    let failed = pipeline.process_query("ghost", "policy").await;
    assert_eq!(
        failed.error(),
        Some(&PipelineError::UserNotFound("ghost".to_string()))
    );
}

#[tokio::test]
async fn confidence_is_clamped() {
    let high = orchestrator()
        .with_synthesizer(Arc::new(FixedConfidenceSynthesizer(7.5)))
        .process_query("user-1", "policy")
        .await;
    assert_eq!(high.response().expect("succeeds").confidence, 1.0);

    let nan = orchestrator()
        .with_synthesizer(Arc::new(FixedConfidenceSynthesizer(f32::NAN)))
        .process_query("user-1", "policy")
        .await;
    assert_eq!(nan.response().expect("succeeds").confidence, 0.0);
}

#[tokio::test]
async fn cancelled_before_start_stops_at_ranking() {
    let pipeline = orchestrator();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline
        .process_query_with_options(
            "user-2",
            "policy",
            QueryOptions::default().with_cancellation(token),
        )
        .await;
    assert_eq!(
        outcome.error(),
        Some(&PipelineError::Cancelled {
            stage: PipelineStage::Ranking
        })
    );

    let trail = pipeline
        .get_audit_trail("user-2")
        .await
        .expect("can read trail");
    assert_eq!(
        actions(&trail),
        vec![AuditAction::QueryInitiated, AuditAction::QueryFailed]
    );
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_slow_synthesis() {
    let pipeline = orchestrator().with_synthesizer(Arc::new(SlowSynthesizer));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let outcome = pipeline
        .process_query_with_options(
            "user-1",
            "policy",
            QueryOptions::default().with_cancellation(token),
        )
        .await;
    assert_eq!(
        outcome.error(),
        Some(&PipelineError::Cancelled {
            stage: PipelineStage::Synthesis
        })
    );
}

#[tokio::test]
async fn options_override_result_limit() {
    let pipeline = orchestrator();
    let outcome = pipeline
        .process_query_with_options(
            "user-1",
            "policy",
            QueryOptions::default().with_max_results(2),
        )
        .await;
    assert_eq!(outcome.response().expect("succeeds").sources.len(), 2);
}

#[tokio::test]
async fn ingested_documents_are_searchable_and_audited() {
    let pipeline = orchestrator();
    let stored = pipeline
        .ingest_document(
            "user-1",
            NewDocument {
                title: "Success metrics".to_string(),
                content: "Quarterly success review.".to_string(),
                source: "marketing".to_string(),
                tags: vec!["success".to_string()],
                access_level: "public".to_string(),
            },
        )
        .await
        .expect("can ingest");
    assert_eq!(stored.len(), 1);

    let stats = pipeline.corpus_stats().expect("can read stats");
    assert_eq!(stats.total_documents, 4);
    assert_eq!(stats.embedding_dimension, 3);

    let outcome = pipeline.process_query("user-3", "success").await;
    let sources = &outcome.response().expect("succeeds").sources;
    assert!(sources.iter().any(|doc| doc.id == stored[0].id));

    let trail = pipeline
        .get_audit_trail("user-1")
        .await
        .expect("can read trail");
    assert_eq!(actions(&trail), vec![AuditAction::DocumentIngested]);
}

#[tokio::test]
async fn user_lookup_and_permissions() {
    let pipeline = orchestrator();
    let user = pipeline.get_user_info("user-2").await.expect("user exists");
    assert_eq!(user.role, crate::models::Role::User);
    assert!(
        pipeline
            .check_permission("user-2", "read:engineering")
            .await
            .expect("can check")
    );
    assert_eq!(pipeline.list_users().await.expect("can list").len(), 3);
    assert!(pipeline.lookup_user("ghost").await.is_err());
}

#[tokio::test]
async fn recent_activity_is_newest_first() {
    let pipeline = orchestrator();
    pipeline.process_query("user-1", "policy").await;
    pipeline.process_query("user-2", "architecture").await;

    let recent = pipeline
        .get_recent_activity(3)
        .await
        .expect("can read recent activity");
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].user_id, "user-2");
    assert_eq!(recent[0].action, AuditAction::QueryCompleted);

    let all = pipeline.get_all_activity().await.expect("can read all");
    assert_eq!(all.len(), 4);
}

#[test]
fn stage_names_lead_error_messages() {
    let error = PipelineError::stage_failure(PipelineStage::Ranking, "no vector");
    assert_eq!(error.to_string(), "ranking failed: no vector");
    assert_eq!(PipelineError::InvalidInput("x".into()).stage(), None);
    assert_eq!(PipelineState::Synthesized.to_string(), "synthesized");
}
