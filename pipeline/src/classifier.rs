use crate::backend::{BackendCiphertext, DecryptionCapability, HomomorphicBackend};
use crate::encryptor::EncryptedVector;
use crate::error::{PipelineError, Result};
use crate::weights::ClassifierWeights;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ckks::Fingerprint;
use math::serialization::{ReaderFrom, WriterTo};
use serde::{Deserialize, Serialize};
use std::io::{Error, ErrorKind, Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// Largest number of classes accepted when reading a score set.
const MAX_CLASSES: usize = 1 << 12;

/// How the D products of a class are reduced to one scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reduction {
    /// log2(D) rotations and additions under encryption.
    #[default]
    RotateAndSum,
    /// Decrypts the products, sums in the clear and re-encrypts. Demo and
    /// benchmarking only: the classifier sees the intermediate values.
    DecryptAndSum,
}

/// One encrypted score per class; slot 0 of each ciphertext holds the score.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncryptedScoreSet<C> {
    pub scores: Vec<C>,
}

impl<C: BackendCiphertext> EncryptedScoreSet<C> {
    pub fn classes(&self) -> usize {
        self.scores.len()
    }

    /// Fingerprint of the first score, if any.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.scores.first().map(|c| c.fingerprint())
    }
}

impl<C: BackendCiphertext> WriterTo for EncryptedScoreSet<C> {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self.scores.len() as u64)?;
        for ct in self.scores.iter() {
            ct.write_to(writer)?;
        }
        Ok(())
    }
}

impl<C: BackendCiphertext> ReaderFrom for EncryptedScoreSet<C> {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        let classes: usize = reader.read_u64::<LittleEndian>()? as usize;
        if classes > MAX_CLASSES {
            return Err(Error::new(ErrorKind::InvalidData, format!("invalid classes={}", classes)));
        }
        self.scores = (0..classes)
            .map(|_| {
                let mut ct: C = C::default();
                ct.read_from(reader).map(|_| ct)
            })
            .collect::<std::io::Result<Vec<C>>>()?;
        Ok(())
    }
}

/// Evaluates W*e + b on encrypted embeddings, one ciphertext per class.
pub struct HomomorphicClassifier<B: HomomorphicBackend> {
    backend: Arc<B>,
    weights: Arc<ClassifierWeights>,
}

impl<B: HomomorphicBackend> Clone for HomomorphicClassifier<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            weights: self.weights.clone(),
        }
    }
}

impl<B: HomomorphicBackend> HomomorphicClassifier<B> {
    /// Fails if the backend cannot hold or reduce D slots.
    pub fn new(backend: Arc<B>, weights: Arc<ClassifierWeights>) -> Result<Self> {
        let dim: usize = weights.dim();
        if dim > backend.slots() {
            return Err(PipelineError::SchemeParameter(format!(
                "embedding dimension {} exceeds the {} slots of the {} backend",
                dim,
                backend.slots(),
                backend.name()
            )));
        }
        if dim > backend.max_sum_width() {
            return Err(PipelineError::SchemeParameter(format!(
                "embedding dimension {} exceeds the rotation keys of the {} backend (sum width {})",
                dim,
                backend.name(),
                backend.max_sum_width()
            )));
        }
        Ok(Self { backend, weights })
    }

    pub fn weights(&self) -> &ClassifierWeights {
        &self.weights
    }

    fn check_dim(&self, e: &EncryptedVector<B::Ciphertext>) -> Result<()> {
        if e.dim != self.weights.dim() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.weights.dim(),
                got: e.dim,
            });
        }
        Ok(())
    }

    /// Fully encrypted evaluation with rotate-and-sum.
    pub fn classify(&self, e: &EncryptedVector<B::Ciphertext>) -> Result<EncryptedScoreSet<B::Ciphertext>> {
        self.check_dim(e)?;
        let dim: usize = self.weights.dim();
        let scores: Vec<B::Ciphertext> = (0..self.weights.classes())
            .map(|c| {
                let prod: B::Ciphertext = self.backend.mul_plain_rescale(&e.ciphertext, self.weights.row(c))?;
                let sum: B::Ciphertext = self.backend.sum_slots(&prod, dim)?;
                self.backend.add_plain(&sum, &[self.weights.bias(c)])
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(classes = scores.len(), "classified encrypted vector");
        Ok(EncryptedScoreSet { scores })
    }

    /// Evaluation with [Reduction::DecryptAndSum]. Needs the secret, so it
    /// must run where the secret lives.
    pub fn classify_with_decryption<S>(
        &self,
        e: &EncryptedVector<B::Ciphertext>,
        secret: &S,
    ) -> Result<EncryptedScoreSet<B::Ciphertext>>
    where
        S: DecryptionCapability<Ciphertext = B::Ciphertext>,
    {
        self.check_dim(e)?;
        warn!("decrypt-and-sum reduction exposes intermediate products, demo mode only");
        let dim: usize = self.weights.dim();
        let scores: Vec<B::Ciphertext> = (0..self.weights.classes())
            .map(|c| {
                let prod: B::Ciphertext = self.backend.mul_plain_rescale(&e.ciphertext, self.weights.row(c))?;
                let sum: f64 = secret.decrypt(&prod)?.iter().take(dim).sum();
                let reencrypted: B::Ciphertext = self.backend.encrypt_like(&[sum], &prod)?;
                self.backend.add_plain(&reencrypted, &[self.weights.bias(c)])
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(EncryptedScoreSet { scores })
    }
}
