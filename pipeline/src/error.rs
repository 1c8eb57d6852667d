use ckks::CkksError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid scheme parameters: {0}")]
    SchemeParameter(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    #[error("serialization: {0}")]
    Serialization(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("homomorphic evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable identifier used in batch outputs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemeParameter(_) => "scheme_parameter",
            PipelineError::ShapeMismatch(_) => "shape_mismatch",
            PipelineError::DimensionMismatch { .. } => "dimension_mismatch",
            PipelineError::ContextMismatch(_) => "context_mismatch",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Embedding(_) => "embedding",
            PipelineError::Evaluation(_) => "evaluation",
            PipelineError::Config(_) => "config",
            PipelineError::Io(_) => "io",
        }
    }
}

impl From<CkksError> for PipelineError {
    fn from(err: CkksError) -> Self {
        match err {
            CkksError::InvalidParameters(msg) => PipelineError::SchemeParameter(msg),
            CkksError::TooManyValues { values, slots } => PipelineError::DimensionMismatch {
                expected: slots,
                got: values,
            },
            CkksError::ContextMismatch { .. } => PipelineError::ContextMismatch(err.to_string()),
            CkksError::Serialization(msg) => PipelineError::Serialization(msg),
            CkksError::Io(err) => PipelineError::Io(err),
            other => PipelineError::Evaluation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
