//! On-disk layout of a run directory.
//!
//! ```text
//! <root>/context.bin                 owner-only, holds the secret key
//! <root>/encrypted_embeddings.bin
//! <root>/encrypted_scores.bin
//! <root>/decrypted_predictions.json
//! ```

use crate::backend::BackendCiphertext;
use crate::classifier::EncryptedScoreSet;
use crate::encryptor::EncryptedVector;
use crate::error::{PipelineError, Result};
use crate::report::BatchOutput;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ckks::EncryptionContext;
use math::serialization::{ReaderFrom, WriterTo};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const STAGE_MAGIC: &[u8; 4] = b"EMST";
const STAGE_VERSION: u32 = 1;
const MAX_STAGE_ITEMS: usize = 1 << 20;

pub const CONTEXT_FILE: &str = "context.bin";
pub const OUTPUT_FILE: &str = "decrypted_predictions.json";

/// Encrypted intermediate collections persisted per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    EncryptedEmbeddings,
    EncryptedScores,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::EncryptedEmbeddings => "encrypted_embeddings",
            Stage::EncryptedScores => "encrypted_scores",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.bin", self.name())
    }
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates `root` if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root: PathBuf = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// The blob contains the secret key and is created with mode 0600 on
    /// Unix.
    pub fn save_context(&self, ctx: &EncryptionContext) -> Result<PathBuf> {
        let path: PathBuf = self.path(CONTEXT_FILE);
        let bytes: Vec<u8> = ctx.serialize()?;
        let mut options: OpenOptions = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file: File = options.open(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&bytes)?;
        file.sync_all()?;
        info!(path = %path.display(), fingerprint = %ctx.fingerprint(), "saved encryption context");
        Ok(path)
    }

    pub fn load_context(&self) -> Result<EncryptionContext> {
        load_context(&self.path(CONTEXT_FILE))
    }

    pub fn save_embeddings<C: BackendCiphertext>(&self, items: &[Option<EncryptedVector<C>>]) -> Result<PathBuf> {
        self.save_stage(Stage::EncryptedEmbeddings, items)
    }

    pub fn load_embeddings<C: BackendCiphertext>(&self) -> Result<Vec<Option<EncryptedVector<C>>>> {
        self.load_stage(Stage::EncryptedEmbeddings)
    }

    pub fn save_scores<C: BackendCiphertext>(&self, items: &[Option<EncryptedScoreSet<C>>]) -> Result<PathBuf> {
        self.save_stage(Stage::EncryptedScores, items)
    }

    pub fn load_scores<C: BackendCiphertext>(&self) -> Result<Vec<Option<EncryptedScoreSet<C>>>> {
        self.load_stage(Stage::EncryptedScores)
    }

    /// Positional collection; failed items are stored as a missing marker.
    fn save_stage<T: WriterTo>(&self, stage: Stage, items: &[Option<T>]) -> Result<PathBuf> {
        let path: PathBuf = self.path(&stage.file_name());
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(STAGE_MAGIC)?;
        writer.write_u32::<LittleEndian>(STAGE_VERSION)?;
        writer.write_u64::<LittleEndian>(items.len() as u64)?;
        for item in items.iter() {
            match item {
                Some(value) => {
                    writer.write_u8(1)?;
                    value.write_to(&mut writer)?;
                }
                None => writer.write_u8(0)?,
            }
        }
        writer.flush()?;
        info!(stage = stage.name(), items = items.len(), path = %path.display(), "saved stage");
        Ok(path)
    }

    fn load_stage<T: ReaderFrom + Default>(&self, stage: Stage) -> Result<Vec<Option<T>>> {
        let path: PathBuf = self.path(&stage.file_name());
        let mut reader = BufReader::new(File::open(&path)?);
        read_stage(&mut reader).map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))
    }

    pub fn save_output(&self, output: &BatchOutput) -> Result<PathBuf> {
        let path: PathBuf = self.path(OUTPUT_FILE);
        let json: String =
            serde_json::to_string_pretty(output).map_err(|e| PipelineError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

pub fn load_context(path: &Path) -> Result<EncryptionContext> {
    let bytes: Vec<u8> = fs::read(path)?;
    Ok(EncryptionContext::deserialize(&bytes)?)
}

fn read_stage<T: ReaderFrom + Default, R: Read>(reader: &mut R) -> std::io::Result<Vec<Option<T>>> {
    use std::io::{Error, ErrorKind};

    let mut magic: [u8; 4] = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != STAGE_MAGIC {
        return Err(Error::new(ErrorKind::InvalidData, "not a stage file"));
    }
    let version: u32 = reader.read_u32::<LittleEndian>()?;
    if version != STAGE_VERSION {
        return Err(Error::new(ErrorKind::InvalidData, format!("unsupported version {}", version)));
    }
    let count: usize = reader.read_u64::<LittleEndian>()? as usize;
    if count > MAX_STAGE_ITEMS {
        return Err(Error::new(ErrorKind::InvalidData, format!("invalid count={}", count)));
    }
    let mut items: Vec<Option<T>> = Vec::with_capacity(count);
    for _ in 0..count {
        match reader.read_u8()? {
            0 => items.push(None),
            1 => {
                let mut value: T = T::default();
                value.read_from(reader)?;
                items.push(Some(value));
            }
            flag => {
                return Err(Error::new(ErrorKind::InvalidData, format!("invalid presence flag {}", flag)));
            }
        }
    }
    Ok(items)
}
