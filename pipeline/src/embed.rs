use crate::error::{PipelineError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Text to fixed-length vector. Implementations must be deterministic and
/// callable from several worker threads at once.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// Feature hashing of lowercase alphanumeric tokens into `dim` signed
/// buckets, L2-normalized.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut v: Vec<f64> = vec![0f64; self.dim];
        let mut tokens: usize = 0;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut word: [u8; 8] = [0u8; 8];
            word.copy_from_slice(&digest[..8]);
            let h: u64 = u64::from_le_bytes(word);
            let sign: f64 = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[(h % self.dim as u64) as usize] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(PipelineError::Embedding("input has no tokens".to_string()));
        }
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

/// Lookup table of embeddings computed elsewhere. Vectors are returned as
/// stored so that malformed entries surface as per-item errors downstream.
#[derive(Clone, Debug, Default)]
pub struct PrecomputedEmbedder {
    dim: usize,
    table: HashMap<String, Vec<f64>>,
}

impl PrecomputedEmbedder {
    pub fn new(dim: usize, table: HashMap<String, Vec<f64>>) -> Self {
        Self { dim, table }
    }

    /// Reads a JSON object mapping each text to its embedding.
    pub fn from_file(dim: usize, path: &Path) -> Result<Self> {
        let table: HashMap<String, Vec<f64>> = serde_json::from_reader(BufReader::new(File::open(path)?))
            .map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(dim, table))
    }
}

impl Embedder for PrecomputedEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| PipelineError::Embedding(format!("no embedding for {:?}", text)))
    }
}

/// Adapts a closure, mostly for tests and benches.
pub struct FnEmbedder<F> {
    dim: usize,
    f: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f64>> + Send + Sync,
{
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f64>> + Send + Sync,
{
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        (self.f)(text)
    }
}
