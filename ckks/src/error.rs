use crate::context::Fingerprint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CkksError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("too many values: {values} > {slots} slots")]
    TooManyValues { values: usize, slots: usize },

    #[error("value {value} cannot be encoded at scale 2^{log_scale:.2}")]
    ValueOutOfRange { value: f64, log_scale: f64 },

    #[error("ciphertext fingerprint {found} does not match context fingerprint {expected}")]
    ContextMismatch { expected: Fingerprint, found: Fingerprint },

    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("level mismatch: {lhs} != {rhs}")]
    LevelMismatch { lhs: usize, rhs: usize },

    #[error("scale mismatch: {lhs} != {rhs}")]
    ScaleMismatch { lhs: f64, rhs: f64 },

    #[error("ciphertext at level 0 cannot be rescaled")]
    LevelExhausted,

    #[error("no rotation key for step {0}")]
    MissingRotationKey(i64),

    #[error("malformed artifact: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CkksError>;
