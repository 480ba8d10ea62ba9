
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, ConfigError, PipelineConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 RAG Pipeline Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Pipeline Settings").bold().yellow());
    eprintln!("Control how many documents are ranked and how long each stage may take.");
    eprintln!();

    configure_pipeline(&mut config.pipeline)?;

    eprintln!();
    eprintln!("{}", style("Collaborator Settings").bold().yellow());
    configure_collaborators(&mut config)?;

    config
        .validate()
        .context("Configuration failed validation")?;

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Pipeline:").bold().yellow());
    eprintln!(
        "  Max Results: {}",
        style(config.pipeline.max_results).cyan()
    );
    eprintln!(
        "  Max Query Length: {}",
        style(config.pipeline.max_query_length).cyan()
    );
    eprintln!(
        "  Synthesis Timeout: {}",
        style(format!("{}ms", config.pipeline.synthesis_timeout_ms)).cyan()
    );
    eprintln!(
        "  Suggestion Timeout: {}",
        style(format!("{}ms", config.pipeline.suggestion_timeout_ms)).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Collaborators:").bold().yellow());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.embedding.dimension).cyan()
    );
    eprintln!(
        "  Synthesis Latency: {}",
        style(format!("{}ms", config.synthesis.simulated_latency_ms)).cyan()
    );
    eprintln!(
        "  Excerpt Length: {}",
        style(config.synthesis.excerpt_chars).cyan()
    );
    eprintln!(
        "  Max Suggestions: {}",
        style(config.suggestions.max_suggestions).cyan()
    );
    eprintln!(
        "  Seed Sample Documents: {}",
        style(config.corpus.seed_samples).cyan()
    );
    eprintln!("  Chunk Size: {}", style(config.corpus.chunk_size).cyan());
    eprintln!(
        "  Recent Activity Limit: {}",
        style(config.audit.recent_limit).cyan()
    );

    eprintln!();
    match config.validate() {
        Ok(()) => eprintln!("  Status: {}", style("valid").green()),
        Err(e) => eprintln!("  Status: {} ({})", style("invalid").red(), e),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join("config.toml").exists() {
        let config = Config::load(config_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(config_dir)
    }
}

/// Check a candidate pipeline section without touching the rest of the config
fn check_pipeline(candidate: PipelineConfig) -> Result<(), ConfigError> {
    Config {
        pipeline: candidate,
        ..Config::default()
    }
    .validate()
}

fn configure_pipeline(pipeline: &mut PipelineConfig) -> Result<()> {
    let current = pipeline.clone();

    let max_results: usize = Input::new()
        .with_prompt("Maximum ranked documents per query")
        .default(current.max_results)
        .validate_with(|input: &usize| {
            check_pipeline(PipelineConfig {
                max_results: *input,
                ..current.clone()
            })
        })
        .interact_text()?;

    let max_query_length: usize = Input::new()
        .with_prompt("Maximum query length (characters)")
        .default(current.max_query_length)
        .validate_with(|input: &usize| {
            check_pipeline(PipelineConfig {
                max_query_length: *input,
                ..current.clone()
            })
        })
        .interact_text()?;

    let synthesis_timeout_ms: u64 = Input::new()
        .with_prompt("Synthesis timeout (ms)")
        .default(current.synthesis_timeout_ms)
        .validate_with(|input: &u64| {
            check_pipeline(PipelineConfig {
                synthesis_timeout_ms: *input,
                ..current.clone()
            })
        })
        .interact_text()?;

    let suggestion_timeout_ms: u64 = Input::new()
        .with_prompt("Suggestion timeout (ms)")
        .default(current.suggestion_timeout_ms)
        .validate_with(|input: &u64| {
            check_pipeline(PipelineConfig {
                suggestion_timeout_ms: *input,
                ..current.clone()
            })
        })
        .interact_text()?;

    *pipeline = PipelineConfig {
        max_results,
        max_query_length,
        synthesis_timeout_ms,
        suggestion_timeout_ms,
    };

    Ok(())
}

fn configure_collaborators(config: &mut Config) -> Result<()> {
    config.synthesis.simulated_latency_ms = Input::new()
        .with_prompt("Simulated synthesis latency (ms)")
        .default(config.synthesis.simulated_latency_ms)
        .interact_text()?;

    config.suggestions.max_suggestions = Input::new()
        .with_prompt("Follow-up suggestions per answer")
        .default(config.suggestions.max_suggestions)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input > 20 {
                Err("At most 20 suggestions are supported")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    config.corpus.seed_samples = Confirm::new()
        .with_prompt("Load the sample documents at startup?")
        .default(config.corpus.seed_samples)
        .interact()?;

    Ok(())
}
