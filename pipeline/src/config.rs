use crate::classifier::Reduction;
use crate::coordinator::CoordinatorOptions;
use crate::error::{PipelineError, Result};
use ckks::ParametersLiteral;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ckks,
    Mock,
}

/// Pipeline configuration, read from JSON. Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub backend: BackendKind,
    pub scheme: ParametersLiteral,
    pub embedding_dim: usize,
    pub classes: usize,
    pub max_batch_size: usize,
    pub timeout_secs: u64,
    /// 0 uses the available parallelism.
    pub workers: usize,
    pub reduction: Reduction,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ckks,
            scheme: ParametersLiteral::default(),
            embedding_dim: 7,
            classes: 7,
            max_batch_size: 32,
            timeout_secs: 60,
            workers: 0,
            reduction: Reduction::RotateAndSum,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = serde_json::from_reader(BufReader::new(File::open(path)?))
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(PipelineError::Config("embedding_dim must be positive".to_string()));
        }
        if self.classes == 0 {
            return Err(PipelineError::Config("classes must be positive".to_string()));
        }
        if self.max_batch_size == 0 {
            return Err(PipelineError::Config("max_batch_size must be positive".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("timeout_secs must be positive".to_string()));
        }
        if self.backend == BackendKind::Ckks {
            self.scheme_literal().validate()?;
        }
        Ok(())
    }

    /// Scheme parameters with rotation keys sized for the embedding
    /// dimension unless set explicitly.
    pub fn scheme_literal(&self) -> ParametersLiteral {
        let mut literal: ParametersLiteral = self.scheme.clone();
        if literal.sum_width.is_none() {
            literal.sum_width = Some(self.embedding_dim);
        }
        literal
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            max_batch_size: self.max_batch_size,
            timeout: self.timeout(),
            workers: self.workers,
            reduction: self.reduction,
        }
    }
}
