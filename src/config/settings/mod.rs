
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the default configuration directory
pub const HOME_ENV_VAR: &str = "RAG_PIPELINE_HOME";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum ranked documents per query
    pub max_results: usize,
    pub max_query_length: usize,
    pub synthesis_timeout_ms: u64,
    pub suggestion_timeout_ms: u64,
}

impl Default for PipelineConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_results: 5,
            max_query_length: 1000,
            synthesis_timeout_ms: 30_000,
            suggestion_timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    #[inline]
    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    #[inline]
    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Artificial inference delay of the template synthesizer
    pub simulated_latency_ms: u64,
    /// Characters of source content quoted in the answer
    pub excerpt_chars: usize,
}

impl Default for SynthesisConfig {
    #[inline]
    fn default() -> Self {
        Self {
            simulated_latency_ms: 1500,
            excerpt_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub max_suggestions: usize,
    pub simulated_latency_ms: u64,
}

impl Default for SuggestionsConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            simulated_latency_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    /// Load the built-in sample documents at startup
    pub seed_samples: bool,
    /// Maximum characters per ingested document before it is split
    pub chunk_size: usize,
}

impl Default for CorpusConfig {
    #[inline]
    fn default() -> Self {
        Self {
            seed_samples: true,
            chunk_size: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    /// Default number of events shown as recent activity
    pub recent_limit: usize,
}

impl Default for AuditConfig {
    #[inline]
    fn default() -> Self {
        Self { recent_limit: 10 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid max results: {0} (must be between 1 and 100)")]
    InvalidMaxResults(usize),
    #[error("Invalid max query length: {0} (must be between 1 and 100000)")]
    InvalidMaxQueryLength(usize),
    #[error("Invalid {stage} timeout: {timeout_ms}ms (must be between 1 and 600000)")]
    InvalidTimeout { stage: &'static str, timeout_ms: u64 },
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid excerpt length: {0} (must be between 1 and 10000)")]
    InvalidExcerptChars(usize),
    #[error("Invalid max suggestions: {0} (must be between 0 and 20)")]
    InvalidMaxSuggestions(usize),
    #[error("Invalid chunk size: {0} (must be between 50 and 100000)")]
    InvalidChunkSize(usize),
    #[error("Invalid recent activity limit: {0} (must be between 1 and 1000)")]
    InvalidRecentLimit(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

const MAX_TIMEOUT_MS: u64 = 600_000;

impl Config {
    /// Default configuration directory, honouring `RAG_PIPELINE_HOME`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        dirs::home_dir()
            .map(|home| home.join(".rag-pipeline"))
            .or_else(|| dirs::data_dir().map(|data| data.join("rag-pipeline")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pipeline_config()?;

        if !(8..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        if !(1..=10_000).contains(&self.synthesis.excerpt_chars) {
            return Err(ConfigError::InvalidExcerptChars(
                self.synthesis.excerpt_chars,
            ));
        }

        if self.suggestions.max_suggestions > 20 {
            return Err(ConfigError::InvalidMaxSuggestions(
                self.suggestions.max_suggestions,
            ));
        }

        if !(50..=100_000).contains(&self.corpus.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(self.corpus.chunk_size));
        }

        if !(1..=1000).contains(&self.audit.recent_limit) {
            return Err(ConfigError::InvalidRecentLimit(self.audit.recent_limit));
        }

        Ok(())
    }

    fn validate_pipeline_config(&self) -> Result<(), ConfigError> {
        let config = &self.pipeline;

        if !(1..=100).contains(&config.max_results) {
            return Err(ConfigError::InvalidMaxResults(config.max_results));
        }

        if !(1..=100_000).contains(&config.max_query_length) {
            return Err(ConfigError::InvalidMaxQueryLength(config.max_query_length));
        }

        if !(1..=MAX_TIMEOUT_MS).contains(&config.synthesis_timeout_ms) {
            return Err(ConfigError::InvalidTimeout {
                stage: "synthesis",
                timeout_ms: config.synthesis_timeout_ms,
            });
        }

        if !(1..=MAX_TIMEOUT_MS).contains(&config.suggestion_timeout_ms) {
            return Err(ConfigError::InvalidTimeout {
                stage: "suggestion",
                timeout_ms: config.suggestion_timeout_ms,
            });
        }

        Ok(())
    }
}
