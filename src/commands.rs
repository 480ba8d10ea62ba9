use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use dialoguer::Input;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{info, warn};

use crate::models::{AuditEvent, QueryOutcome};
use crate::pipeline::QueryOrchestrator;
use crate::suggestions::TopicSuggestionGenerator;
use crate::synthesis::TemplateSynthesizer;

/// One line of a batch file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub line: usize,
    pub user_id: String,
    pub query: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Answer a single query and print the response
#[inline]
pub async fn run_query(
    orchestrator: &QueryOrchestrator,
    user_id: &str,
    query: &str,
    as_json: bool,
) -> Result<()> {
    let outcome = orchestrator.process_query(user_id, query).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);
    } else {
        print_outcome(&outcome);
    }

    match outcome.error_message() {
        Some(message) => Err(anyhow!("Query failed: {}", message)),
        None => Ok(()),
    }
}

/// Interactive question/answer loop for one user
#[inline]
pub async fn run_chat(
    orchestrator: &QueryOrchestrator,
    user_id: &str,
    recent_limit: usize,
) -> Result<()> {
    let user = orchestrator
        .get_user_info(user_id)
        .await
        .with_context(|| format!("Cannot start chat for {}", user_id))?;

    eprintln!(
        "{}",
        style(format!("💬 Chatting as {} ({})", user.email, user.role))
            .bold()
            .cyan()
    );
    eprintln!("Type /audit for your trail, /recent for recent activity, /quit to leave.");
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Quit => break,
            ChatCommand::Help => {
                eprintln!("Commands: /audit, /recent, /quit");
            }
            ChatCommand::Audit => {
                let trail = orchestrator.get_audit_trail(user_id).await?;
                print_events(&format!("Audit trail for {}", user_id), &trail);
            }
            ChatCommand::Recent => {
                let recent = orchestrator.get_recent_activity(recent_limit).await?;
                print_events("Recent activity", &recent);
            }
            ChatCommand::Ask(query) => {
                let outcome = orchestrator.process_query(user_id, query).await;
                print_outcome(&outcome);
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatCommand<'a> {
    Empty,
    Quit,
    Help,
    Audit,
    Recent,
    Ask(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/quit" | "/exit" => Self::Quit,
            "/help" => Self::Help,
            "/audit" => Self::Audit,
            "/recent" => Self::Recent,
            query => Self::Ask(query),
        }
    }
}

/// Parse `user<TAB>query` lines, skipping blanks and `#` comments
#[inline]
pub fn parse_batch(content: &str) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((user_id, query)) = trimmed.split_once('\t') else {
            bail!("Line {}: expected <user>\\t<query>", line);
        };
        let (user_id, query) = (user_id.trim(), query.trim());
        if user_id.is_empty() || query.is_empty() {
            bail!("Line {}: user and query must both be present", line);
        }

        entries.push(BatchEntry {
            line,
            user_id: user_id.to_string(),
            query: query.to_string(),
        });
    }

    Ok(entries)
}

/// Run every query in a batch file concurrently
#[inline]
pub async fn run_batch(orchestrator: &QueryOrchestrator, path: &Path) -> Result<BatchSummary> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let entries = parse_batch(&content)?;
    info!("Running {} queries from {}", entries.len(), path.display());

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(entries.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] {msg}")
                .context("Invalid progress template")?,
        )
    } else {
        ProgressBar::hidden()
    };

    let runs = entries.iter().map(|entry| {
        let bar = bar.clone();
        async move {
            let outcome = orchestrator
                .process_query(&entry.user_id, &entry.query)
                .await;
            bar.inc(1);
            bar.set_message(entry.user_id.clone());
            (entry, outcome)
        }
    });
    let results = join_all(runs).await;
    bar.finish_and_clear();

    let mut summary = BatchSummary::default();
    for (entry, outcome) in &results {
        match outcome.response() {
            Some(response) => {
                summary.succeeded += 1;
                println!(
                    "{} line {} [{}] {} ({} sources)",
                    style("✓").green(),
                    entry.line,
                    entry.user_id,
                    entry.query,
                    response.sources.len()
                );
            }
            None => {
                summary.failed += 1;
                let message = outcome.error_message().unwrap_or_default();
                warn!("Batch line {} failed: {}", entry.line, message);
                println!(
                    "{} line {} [{}] {}: {}",
                    style("✗").red(),
                    entry.line,
                    entry.user_id,
                    entry.query,
                    message
                );
            }
        }
    }

    println!();
    println!(
        "Batch finished: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );

    Ok(summary)
}

/// List the users known to the directory
#[inline]
pub async fn list_users(orchestrator: &QueryOrchestrator) -> Result<()> {
    let users = orchestrator.list_users().await?;

    println!("Users ({} total):", users.len());
    println!();
    for user in &users {
        println!("👤 {} ({})", user.id, user.email);
        println!("   Role: {}", user.role);
        let permissions: Vec<&str> = user.permissions.iter().map(String::as_str).collect();
        println!("   Permissions: {}", permissions.join(", "));
        println!();
    }

    Ok(())
}

/// Corpus statistics and a topic summary
#[inline]
pub fn show_stats(orchestrator: &QueryOrchestrator, synthesizer: &TemplateSynthesizer) -> Result<()> {
    let stats = orchestrator.corpus_stats()?;
    let snapshot = orchestrator.corpus().snapshot()?;

    println!("📊 Corpus Statistics");
    println!("{}", "=".repeat(40));
    println!("   Documents: {}", stats.total_documents);
    println!("   With embeddings: {}", stats.embedded_documents);
    println!("   Embedding dimension: {}", stats.embedding_dimension);
    println!();
    println!("   {}", synthesizer.summarize(&snapshot));
    println!();

    for document in snapshot.iter() {
        println!(
            "   • {} [{}] from {}",
            document.title, document.metadata.access_level, document.metadata.source
        );
    }

    Ok(())
}

#[inline]
pub fn show_popular(suggester: &TopicSuggestionGenerator) {
    println!("🔥 Popular queries:");
    for query in suggester.popular_queries() {
        println!("   • {}", query);
    }
}

fn outcome_json(outcome: &QueryOutcome) -> serde_json::Value {
    match &outcome.result {
        Ok(response) => json!({
            "success": true,
            "data": response,
            "timestamp": outcome.timestamp,
        }),
        Err(error) => json!({
            "success": false,
            "query_id": outcome.query_id,
            "error": error.to_string(),
            "timestamp": outcome.timestamp,
        }),
    }
}

fn print_outcome(outcome: &QueryOutcome) {
    match &outcome.result {
        Ok(response) => {
            println!();
            println!("{}", style("Answer").bold().green());
            println!("{}", response.answer);
            println!();
            println!(
                "Confidence: {}",
                style(format!("{:.0}%", response.confidence * 100.0)).cyan()
            );

            if response.sources.is_empty() {
                println!("Sources: {}", style("none accessible").yellow());
            } else {
                println!("Sources:");
                for source in &response.sources {
                    println!("   • {} [{}]", source.title, source.metadata.access_level);
                }
            }

            if !response.suggestions.is_empty() {
                println!("You could also ask:");
                for suggestion in &response.suggestions {
                    println!("   • {}", suggestion);
                }
            }
            println!();
        }
        Err(error) => {
            println!("{} {}", style("Query failed:").bold().red(), error);
        }
    }
}

fn print_events(title: &str, events: &[AuditEvent]) {
    println!("{}", style(title).bold().yellow());
    if events.is_empty() {
        println!("   (no events)");
        return;
    }

    for event in events {
        println!(
            "   #{} {} {} {}",
            event.sequence,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.user_id,
            event.action
        );
    }
}
