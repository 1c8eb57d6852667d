use crate::backend::{BackendCiphertext, HomomorphicBackend};
use crate::error::{PipelineError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ckks::Fingerprint;
use math::serialization::{ReaderFrom, WriterTo};
use std::io::{Error, ErrorKind, Read, Write};
use std::sync::Arc;

/// Ciphertext of one embedding, tagged with its declared dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncryptedVector<C> {
    pub ciphertext: C,
    pub dim: usize,
}

impl<C: BackendCiphertext> EncryptedVector<C> {
    pub fn fingerprint(&self) -> Fingerprint {
        self.ciphertext.fingerprint()
    }
}

impl<C: BackendCiphertext> WriterTo for EncryptedVector<C> {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self.dim as u64)?;
        self.ciphertext.write_to(writer)
    }
}

impl<C: BackendCiphertext> ReaderFrom for EncryptedVector<C> {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        let dim: u64 = reader.read_u64::<LittleEndian>()?;
        if dim == 0 || dim > u32::MAX as u64 {
            return Err(Error::new(ErrorKind::InvalidData, format!("invalid dim={}", dim)));
        }
        self.dim = dim as usize;
        self.ciphertext.read_from(reader)
    }
}

/// Encrypts plaintext embeddings of a fixed dimension with public material
/// only.
pub struct Encryptor<B: HomomorphicBackend> {
    backend: Arc<B>,
    dim: usize,
}

impl<B: HomomorphicBackend> Encryptor<B> {
    pub fn new(backend: Arc<B>, dim: usize) -> Result<Self> {
        if dim == 0 || dim > backend.slots() {
            return Err(PipelineError::DimensionMismatch {
                expected: backend.slots(),
                got: dim,
            });
        }
        Ok(Self { backend, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn encrypt(&self, vector: &[f64]) -> Result<EncryptedVector<B::Ciphertext>> {
        self.check(vector)?;
        Ok(EncryptedVector {
            ciphertext: self.backend.encrypt(vector)?,
            dim: self.dim,
        })
    }

    /// Encrypts every vector in order. Nothing is encrypted unless every
    /// vector has the right dimension.
    pub fn encrypt_batch(&self, vectors: &[Vec<f64>]) -> Result<Vec<EncryptedVector<B::Ciphertext>>> {
        vectors.iter().try_for_each(|v| self.check(v))?;
        vectors.iter().map(|v| self.encrypt(v)).collect()
    }

    fn check(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(PipelineError::Embedding("embedding has non-finite values".to_string()));
        }
        Ok(())
    }
}
