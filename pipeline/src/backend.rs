//! Homomorphic backends the pipeline can run on.
//!
//! A backend exposes only the handful of operations the linear classifier
//! needs. The decryption side lives behind [DecryptionCapability], which the
//! coordinator keeps on its own thread while the backend itself is shared
//! with the workers.

use crate::error::{PipelineError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ckks::{Ciphertext, EncryptionContext, Fingerprint, Plaintext, PublicContext};
use math::serialization::{ReaderFrom, WriterTo};
use sampling::source::Source;
use std::io::{Error, ErrorKind, Read, Write};
use std::sync::Arc;

/// Values kept in slots by the mock backend when reading untrusted input.
const MOCK_MAX_SLOTS: usize = 1 << 16;

pub trait BackendCiphertext: Clone + Default + Send + Sync + WriterTo + ReaderFrom + 'static {
    /// Identity of the context that produced the ciphertext.
    fn fingerprint(&self) -> Fingerprint;
}

/// Secret side of a backend.
pub trait DecryptionCapability: Send {
    type Ciphertext: BackendCiphertext;

    fn fingerprint(&self) -> Fingerprint;

    /// Decrypts every slot. Rejects ciphertexts of another context.
    fn decrypt(&self, ct: &Self::Ciphertext) -> Result<Vec<f64>>;

    /// Replaces the key material; ciphertexts produced before no longer
    /// decrypt.
    fn regenerate(&mut self) -> Result<()>;
}

pub trait HomomorphicBackend: Send + Sync + 'static {
    type Ciphertext: BackendCiphertext;
    type Secret: DecryptionCapability<Ciphertext = Self::Ciphertext>;

    /// Public view of `secret`, suitable for sharing with workers.
    fn from_secret(secret: &Self::Secret) -> Self;

    fn name(&self) -> &'static str;

    fn fingerprint(&self) -> Fingerprint;

    fn slots(&self) -> usize;

    /// Widest prefix [Self::sum_slots] can reduce.
    fn max_sum_width(&self) -> usize;

    fn encrypt(&self, values: &[f64]) -> Result<Self::Ciphertext>;

    /// Encrypts `values` at the level and scale of `like`.
    fn encrypt_like(&self, values: &[f64], like: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Slot-wise product with plaintext `values`, rescaled back to the scale
    /// of `ct`.
    fn mul_plain_rescale(&self, ct: &Self::Ciphertext, values: &[f64]) -> Result<Self::Ciphertext>;

    /// Slot 0 of the result holds the sum of the first `width` slots.
    fn sum_slots(&self, ct: &Self::Ciphertext, width: usize) -> Result<Self::Ciphertext>;

    fn add_plain(&self, ct: &Self::Ciphertext, values: &[f64]) -> Result<Self::Ciphertext>;
}

impl BackendCiphertext for Ciphertext {
    fn fingerprint(&self) -> Fingerprint {
        Ciphertext::fingerprint(self)
    }
}

impl DecryptionCapability for EncryptionContext {
    type Ciphertext = Ciphertext;

    fn fingerprint(&self) -> Fingerprint {
        EncryptionContext::fingerprint(self)
    }

    fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        Ok(EncryptionContext::decrypt(self, ct)?)
    }

    fn regenerate(&mut self) -> Result<()> {
        Ok(EncryptionContext::regenerate(self)?)
    }
}

/// CKKS backend over the public part of an [EncryptionContext].
#[derive(Clone)]
pub struct CkksBackend {
    public: Arc<PublicContext>,
}

impl CkksBackend {
    pub fn new(public: Arc<PublicContext>) -> Self {
        Self { public }
    }

    pub fn public(&self) -> &Arc<PublicContext> {
        &self.public
    }
}

impl HomomorphicBackend for CkksBackend {
    type Ciphertext = Ciphertext;
    type Secret = EncryptionContext;

    fn from_secret(secret: &EncryptionContext) -> Self {
        Self::new(secret.public().clone())
    }

    fn name(&self) -> &'static str {
        "ckks"
    }

    fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint()
    }

    fn slots(&self) -> usize {
        self.public.parameters().slots()
    }

    fn max_sum_width(&self) -> usize {
        self.public.parameters().sum_width().next_power_of_two()
    }

    fn encrypt(&self, values: &[f64]) -> Result<Ciphertext> {
        Ok(self.public.encrypt(values, &mut Source::from_entropy())?)
    }

    fn encrypt_like(&self, values: &[f64], like: &Ciphertext) -> Result<Ciphertext> {
        Ok(self
            .public
            .encrypt_at(values, like.scale(), like.level(), &mut Source::from_entropy())?)
    }

    fn mul_plain_rescale(&self, ct: &Ciphertext, values: &[f64]) -> Result<Ciphertext> {
        let level: usize = ct.level();
        if level == 0 {
            return Err(ckks::CkksError::LevelExhausted.into());
        }
        // Encoding at the scale of the prime dropped by the rescale keeps the
        // scale of the result equal to the scale of `ct`.
        let q_last: f64 = self.public.parameters().q()[level] as f64;
        let pt: Plaintext = self.public.encode(values, q_last, level)?;
        let prod: Ciphertext = self.public.mul_plain(ct, &pt)?;
        Ok(self.public.rescale(&prod)?)
    }

    fn sum_slots(&self, ct: &Ciphertext, width: usize) -> Result<Ciphertext> {
        Ok(self.public.sum_slots(ct, width)?)
    }

    fn add_plain(&self, ct: &Ciphertext, values: &[f64]) -> Result<Ciphertext> {
        let pt: Plaintext = self.public.encode(values, ct.scale(), ct.level())?;
        Ok(self.public.add_plain(ct, &pt)?)
    }
}

/// Cleartext stand-in with the same contract as the CKKS backend, for fast
/// tests of the orchestration layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockCiphertext {
    pub(crate) values: Vec<f64>,
    pub(crate) fingerprint: Fingerprint,
}

impl BackendCiphertext for MockCiphertext {
    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl WriterTo for MockCiphertext {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.fingerprint.0)?;
        writer.write_u64::<LittleEndian>(self.values.len() as u64)?;
        for x in self.values.iter() {
            writer.write_f64::<LittleEndian>(*x)?;
        }
        Ok(())
    }
}

impl ReaderFrom for MockCiphertext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        reader.read_exact(&mut self.fingerprint.0)?;
        let len: usize = reader.read_u64::<LittleEndian>()? as usize;
        if len > MOCK_MAX_SLOTS {
            return Err(Error::new(ErrorKind::InvalidData, format!("invalid length={}", len)));
        }
        self.values = vec![0f64; len];
        reader.read_f64_into::<LittleEndian>(&mut self.values)
    }
}

#[derive(Clone, Debug)]
pub struct MockSecret {
    fingerprint: Fingerprint,
    slots: usize,
}

impl MockSecret {
    pub fn new(slots: usize) -> Self {
        Self {
            fingerprint: Fingerprint(Source::from_entropy().new_seed()),
            slots,
        }
    }
}

impl DecryptionCapability for MockSecret {
    type Ciphertext = MockCiphertext;

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn decrypt(&self, ct: &MockCiphertext) -> Result<Vec<f64>> {
        if ct.fingerprint != self.fingerprint {
            return Err(PipelineError::ContextMismatch(format!(
                "ciphertext from context {}, expected {}",
                ct.fingerprint, self.fingerprint
            )));
        }
        Ok(ct.values.clone())
    }

    fn regenerate(&mut self) -> Result<()> {
        self.fingerprint = Fingerprint(Source::from_entropy().new_seed());
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct MockBackend {
    fingerprint: Fingerprint,
    slots: usize,
}

impl MockBackend {
    fn check(&self, ct: &MockCiphertext) -> Result<()> {
        if ct.fingerprint != self.fingerprint {
            return Err(PipelineError::ContextMismatch(format!(
                "ciphertext from context {}, expected {}",
                ct.fingerprint, self.fingerprint
            )));
        }
        Ok(())
    }

    fn pad(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() > self.slots {
            return Err(PipelineError::DimensionMismatch {
                expected: self.slots,
                got: values.len(),
            });
        }
        let mut padded: Vec<f64> = values.to_vec();
        padded.resize(self.slots, 0.0);
        Ok(padded)
    }
}

impl HomomorphicBackend for MockBackend {
    type Ciphertext = MockCiphertext;
    type Secret = MockSecret;

    fn from_secret(secret: &MockSecret) -> Self {
        Self {
            fingerprint: secret.fingerprint,
            slots: secret.slots,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    fn slots(&self) -> usize {
        self.slots
    }

    fn max_sum_width(&self) -> usize {
        self.slots
    }

    fn encrypt(&self, values: &[f64]) -> Result<MockCiphertext> {
        Ok(MockCiphertext {
            values: self.pad(values)?,
            fingerprint: self.fingerprint,
        })
    }

    fn encrypt_like(&self, values: &[f64], _like: &MockCiphertext) -> Result<MockCiphertext> {
        self.encrypt(values)
    }

    fn mul_plain_rescale(&self, ct: &MockCiphertext, values: &[f64]) -> Result<MockCiphertext> {
        self.check(ct)?;
        let pt: Vec<f64> = self.pad(values)?;
        Ok(MockCiphertext {
            values: ct.values.iter().zip(pt.iter()).map(|(a, b)| a * b).collect(),
            fingerprint: ct.fingerprint,
        })
    }

    fn sum_slots(&self, ct: &MockCiphertext, width: usize) -> Result<MockCiphertext> {
        self.check(ct)?;
        let mut values: Vec<f64> = ct.values.clone();
        if let Some(first) = values.first_mut() {
            *first = ct.values.iter().take(width).sum();
        }
        Ok(MockCiphertext {
            values,
            fingerprint: ct.fingerprint,
        })
    }

    fn add_plain(&self, ct: &MockCiphertext, values: &[f64]) -> Result<MockCiphertext> {
        self.check(ct)?;
        let pt: Vec<f64> = self.pad(values)?;
        Ok(MockCiphertext {
            values: ct.values.iter().zip(pt.iter()).map(|(a, b)| a + b).collect(),
            fingerprint: ct.fingerprint,
        })
    }
}
