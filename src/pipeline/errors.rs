use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Fallible steps of the query pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Ranking,
    Authorization,
    Synthesis,
    Suggestion,
}

impl PipelineStage {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranking => "ranking",
            Self::Authorization => "authorization",
            Self::Synthesis => "synthesis",
            Self::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for PipelineStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a query did not produce a response
///
/// Display strings lead with the failed stage, e.g. "synthesis failed: ...".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authorization failed: user {0} not found")]
    UserNotFound(String),

    #[error("{stage} failed: {cause}")]
    StageFailure { stage: PipelineStage, cause: String },

    #[error("{stage} failed: timed out after {}ms", .timeout.as_millis())]
    Timeout {
        stage: PipelineStage,
        timeout: Duration,
    },

    #[error("{stage} cancelled")]
    Cancelled { stage: PipelineStage },
}

impl PipelineError {
    #[inline]
    pub fn stage_failure(stage: PipelineStage, cause: impl fmt::Display) -> Self {
        Self::StageFailure {
            stage,
            cause: cause.to_string(),
        }
    }

    /// Stage the error is attributed to, if any
    #[inline]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::InvalidInput(_) => None,
            Self::UserNotFound(_) => Some(PipelineStage::Authorization),
            Self::StageFailure { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Cancelled { stage } => Some(*stage),
        }
    }
}
