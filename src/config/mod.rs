// Configuration management module
// TOML-backed settings for the pipeline, collaborators and CLI

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AuditConfig, Config, ConfigError, CorpusConfig, EmbeddingConfig, HOME_ENV_VAR,
    PipelineConfig, SuggestionsConfig, SynthesisConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
