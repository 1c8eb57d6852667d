//! Encrypted linear emotion classification.
//!
//! Texts are embedded, encrypted under CKKS, scored against a plaintext
//! linear classifier without decryption and only then decrypted by the owner
//! of the secret key. [PipelineCoordinator] runs the whole flow per batch.

pub mod artifacts;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod decryptor;
pub mod embed;
pub mod encryptor;
pub mod error;
pub mod report;
pub mod tensor;
pub mod weights;

pub use backend::{CkksBackend, DecryptionCapability, HomomorphicBackend, MockBackend, MockSecret};
pub use classifier::{EncryptedScoreSet, HomomorphicClassifier, Reduction};
pub use config::{BackendKind, PipelineConfig};
pub use coordinator::{CoordinatorOptions, PipelineCoordinator, StagedItem};
pub use decryptor::{Decryptor, ScoreVector};
pub use embed::{Embedder, FnEmbedder, HashingEmbedder, PrecomputedEmbedder};
pub use encryptor::{EncryptedVector, Encryptor};
pub use error::PipelineError;
pub use weights::{ClassifierWeights, Emotion, WeightsSource};
