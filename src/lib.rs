use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(#[from] corpus::CorpusError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("Audit error: {0}")]
    Audit(#[from] audit::AuditError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod access;
pub mod audit;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod suggestions;
pub mod synthesis;
