//! Approximate homomorphic encryption over the reals (CKKS) on top of the
//! RNS arithmetic of the `math` crate.
//!
//! The scheme keeps every polynomial in the NTT domain, tracks the scale of
//! ciphertexts exactly as an `f64`, and uses hybrid key switching with a
//! single special prime for slot rotations.

pub mod ciphertext;
pub mod context;
pub mod decryption;
pub mod encoding;
pub mod encryption;
pub mod error;
pub mod evaluator;
pub mod keys;
pub mod parameters;

pub use ciphertext::{Ciphertext, Plaintext};
pub use context::{EncryptionContext, Fingerprint, PublicContext};
pub use error::CkksError;
pub use parameters::{Parameters, ParametersLiteral, SecurityLevel};
