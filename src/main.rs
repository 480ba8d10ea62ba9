use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rag_pipeline::commands::{
    list_users, run_batch, run_chat, run_query, show_popular, show_stats,
};
use rag_pipeline::config::{Config, get_config_dir, run_interactive_config, show_config};
use rag_pipeline::pipeline::QueryOrchestrator;
use rag_pipeline::suggestions::TopicSuggestionGenerator;
use rag_pipeline::synthesis::TemplateSynthesizer;
use rag_pipeline::{RagError, Result};

#[derive(Parser)]
#[command(name = "rag-pipeline")]
#[command(about = "Permission-aware retrieval-augmented question answering")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to $RAG_PIPELINE_HOME or ~/.rag-pipeline)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Query {
        /// User the question is asked on behalf of
        #[arg(long, short)]
        user: String,
        /// Question text
        text: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive question and answer session
    Chat {
        #[arg(long, short)]
        user: String,
    },
    /// Run tab-separated `user<TAB>query` lines concurrently
    Batch {
        file: PathBuf,
    },
    /// List known users and their permissions
    Users,
    /// Show corpus statistics
    Stats,
    /// Show popular example queries
    Popular,
    /// View or edit configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a default config.toml without prompting
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| RagError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show, init } => {
            if show {
                show_config(&Config::load(&config_dir)?)?;
            } else if init {
                let config = Config::load(&config_dir)?;
                config.save()?;
                println!("Wrote {}", config.config_file_path().display());
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Popular => {
            let config = Config::load(&config_dir)?;
            show_popular(&TopicSuggestionGenerator::new(&config.suggestions));
        }
        command => {
            let config = Config::load(&config_dir)?;
            let orchestrator = QueryOrchestrator::from_config(&config)?;

            match command {
                Commands::Query { user, text, json } => {
                    run_query(&orchestrator, &user, &text, json).await?;
                }
                Commands::Chat { user } => {
                    run_chat(&orchestrator, &user, config.audit.recent_limit).await?;
                }
                Commands::Batch { file } => {
                    let summary = run_batch(&orchestrator, &file).await?;
                    if summary.failed > 0 {
                        return Err(RagError::Other(anyhow::anyhow!(
                            "{} of {} batch queries failed",
                            summary.failed,
                            summary.failed + summary.succeeded
                        )));
                    }
                }
                Commands::Users => {
                    list_users(&orchestrator).await?;
                }
                Commands::Stats => {
                    show_stats(&orchestrator, &TemplateSynthesizer::new(&config.synthesis))?;
                }
                Commands::Config { .. } | Commands::Popular => {}
            }
        }
    }

    Ok(())
}
