use crate::encoding::Encoder;
use crate::error::{CkksError, Result};
use crate::keys::{GaloisKeys, PublicKey, SecretKey};
use crate::parameters::{Parameters, ParametersLiteral, SecurityLevel};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::automorphism::AutoPermMap;
use math::serialization::{MAX_LIMBS, ReaderFrom, WriterTo};
use sampling::source::Source;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::info;

const MAGIC: &[u8; 4] = b"EMCK";
const VERSION: u32 = 1;

/// SHA-256 of the serialized public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn of(pk: &PublicKey) -> Self {
        let mut bytes: Vec<u8> = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = pk.write_to(&mut bytes);
        Fingerprint(Sha256::digest(&bytes).into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Everything needed to encrypt and evaluate. Safe to share across threads.
pub struct PublicContext {
    pub(crate) params: Parameters,
    pub(crate) encoder: Encoder,
    pub(crate) pk: PublicKey,
    pub(crate) gks: GaloisKeys,
    pub(crate) perms: AutoPermMap,
    pub(crate) fingerprint: Fingerprint,
}

impl PublicContext {
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    pub fn galois_keys(&self) -> &GaloisKeys {
        &self.gks
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

/// Public material plus the secret key.
///
/// The public part is reference counted so that workers can hold it while the
/// secret key stays with the owner of this value.
pub struct EncryptionContext {
    public: Arc<PublicContext>,
    sk: SecretKey,
}

impl EncryptionContext {
    /// Validates `literal` and generates fresh keys from OS entropy.
    pub fn initialize(literal: &ParametersLiteral) -> Result<Self> {
        Self::initialize_with_source(literal, &mut Source::from_entropy())
    }

    /// Same as [EncryptionContext::initialize] with an explicit randomness source.
    pub fn initialize_with_source(literal: &ParametersLiteral, source: &mut Source) -> Result<Self> {
        let params: Parameters = Parameters::new(literal)?;
        Self::generate(params, source)
    }

    fn generate(params: Parameters, source: &mut Source) -> Result<Self> {
        let sk: SecretKey = SecretKey::generate(&params, source);
        let pk: PublicKey = PublicKey::generate(&params, &sk, source)?;
        let mut perms: AutoPermMap = AutoPermMap::new();
        let gks: GaloisKeys = GaloisKeys::generate(&params, &sk, &params.rotation_steps(), &mut perms, source)?;
        let fingerprint: Fingerprint = Fingerprint::of(&pk);

        info!(
            log_n = params.log_n(),
            levels = params.max_level() + 1,
            log_scale = params.log_scale(),
            rotation_keys = gks.len(),
            %fingerprint,
            "generated encryption context"
        );

        Ok(Self {
            public: Arc::new(PublicContext {
                encoder: Encoder::new(params.n()),
                params,
                pk,
                gks,
                perms,
                fingerprint,
            }),
            sk,
        })
    }

    /// Replaces every key. Ciphertexts produced before the call no longer
    /// decrypt under this context.
    pub fn regenerate(&mut self) -> Result<()> {
        self.regenerate_with_source(&mut Source::from_entropy())
    }

    pub fn regenerate_with_source(&mut self, source: &mut Source) -> Result<()> {
        let previous: Fingerprint = self.fingerprint();
        *self = Self::generate(self.public.params.clone(), source)?;
        info!(%previous, current = %self.fingerprint(), "regenerated encryption context");
        Ok(())
    }

    pub fn public(&self) -> &Arc<PublicContext> {
        &self.public
    }

    pub fn parameters(&self) -> &Parameters {
        &self.public.params
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.sk
    }

    /// Serializes the whole context, secret key included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes: Vec<u8> = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader: &[u8] = bytes;
        let context: Self = Self::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(CkksError::Serialization(format!(
                "{} trailing bytes after context",
                reader.len()
            )));
        }
        Ok(context)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let params: &Parameters = &self.public.params;
        let literal: &ParametersLiteral = params.literal();

        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;

        writer.write_u64::<LittleEndian>(literal.log_n as u64)?;
        writer.write_u64::<LittleEndian>(literal.log_moduli.len() as u64)?;
        for bits in literal.log_moduli.iter() {
            writer.write_u32::<LittleEndian>(*bits)?;
        }
        writer.write_u32::<LittleEndian>(literal.log_scale)?;
        writer.write_f64::<LittleEndian>(literal.sigma)?;
        writer.write_u8(match literal.security {
            SecurityLevel::Tc128 => 0,
            SecurityLevel::None => 1,
        })?;
        writer.write_u64::<LittleEndian>(literal.sum_width.unwrap_or(0) as u64)?;

        let mut primes: Vec<u64> = params.q();
        primes.push(params.p());
        for q in primes.iter() {
            writer.write_u64::<LittleEndian>(*q)?;
        }

        self.sk.write_to(writer)?;
        self.public.pk.write_to(writer)?;
        self.public.gks.write_to(writer)?;
        writer.write_all(&self.public.fingerprint.0)?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic: [u8; 4] = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CkksError::Serialization("not an encryption context".to_string()));
        }
        let version: u32 = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(CkksError::Serialization(format!(
                "unsupported context version {}",
                version
            )));
        }

        let log_n: usize = reader.read_u64::<LittleEndian>()? as usize;
        let count: usize = reader.read_u64::<LittleEndian>()? as usize;
        if count > MAX_LIMBS {
            return Err(CkksError::Serialization(format!("invalid number of moduli={}", count)));
        }
        let mut log_moduli: Vec<u32> = vec![0u32; count];
        reader.read_u32_into::<LittleEndian>(&mut log_moduli)?;
        let log_scale: u32 = reader.read_u32::<LittleEndian>()?;
        let sigma: f64 = reader.read_f64::<LittleEndian>()?;
        let security: SecurityLevel = match reader.read_u8()? {
            0 => SecurityLevel::Tc128,
            1 => SecurityLevel::None,
            other => {
                return Err(CkksError::Serialization(format!("unknown security level {}", other)));
            }
        };
        let sum_width: Option<usize> = match reader.read_u64::<LittleEndian>()? {
            0 => None,
            w => Some(w as usize),
        };

        let params: Parameters = Parameters::new(&ParametersLiteral {
            log_n,
            log_moduli,
            log_scale,
            sigma,
            security,
            sum_width,
        })?;

        let mut primes: Vec<u64> = vec![0u64; count];
        reader.read_u64_into::<LittleEndian>(&mut primes)?;
        let mut expected: Vec<u64> = params.q();
        expected.push(params.p());
        if primes != expected {
            return Err(CkksError::Serialization(
                "stored primes do not match the parameters".to_string(),
            ));
        }

        let sk: SecretKey = SecretKey::read_from(&params, reader)?;

        let mut pk: PublicKey = PublicKey {
            b: Default::default(),
            a: Default::default(),
        };
        pk.read_from(reader)?;
        if pk.b.n() != params.n() || pk.b.level() != params.max_level() {
            return Err(CkksError::Serialization("public key shape mismatch".to_string()));
        }

        let mut gks: GaloisKeys = GaloisKeys::default();
        gks.read_from(reader)?;
        let mut perms: AutoPermMap = AutoPermMap::new();
        for gal_el in gks.gal_els() {
            if gal_el >= 2 * params.n() {
                return Err(CkksError::Serialization(format!(
                    "galois element {} out of range",
                    gal_el
                )));
            }
            let key_ok: bool = gks.get(gal_el).is_some_and(|key| {
                key.digits() == params.max_level() + 1
                    && key
                        .b
                        .iter()
                        .chain(key.a.iter())
                        .all(|p| p.n() == params.n() && p.level() == params.max_level() + 1)
            });
            if !key_ok {
                return Err(CkksError::Serialization(format!(
                    "rotation key for galois element {} has the wrong shape",
                    gal_el
                )));
            }
            perms.generate(params.n(), gal_el);
        }

        let mut stored: [u8; 32] = [0u8; 32];
        reader.read_exact(&mut stored)?;
        let fingerprint: Fingerprint = Fingerprint::of(&pk);
        if fingerprint.0 != stored {
            return Err(CkksError::Serialization(
                "fingerprint does not match the public key".to_string(),
            ));
        }

        Ok(Self {
            public: Arc::new(PublicContext {
                encoder: Encoder::new(params.n()),
                params,
                pk,
                gks,
                perms,
                fingerprint,
            }),
            sk,
        })
    }
}

impl fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("params", &self.public.params)
            .field("rotation_keys", &self.public.gks.len())
            .field("fingerprint", &self.public.fingerprint)
            .finish_non_exhaustive()
    }
}
