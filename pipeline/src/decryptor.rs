use crate::backend::{BackendCiphertext, DecryptionCapability};
use crate::classifier::EncryptedScoreSet;
use crate::error::{PipelineError, Result};

/// Raw per-class logits.
pub type ScoreVector = Vec<f64>;

/// Turns encrypted score sets back into logits. Holds the secret.
pub struct Decryptor<'a, S: DecryptionCapability> {
    secret: &'a S,
}

impl<'a, S: DecryptionCapability> Decryptor<'a, S> {
    pub fn new(secret: &'a S) -> Self {
        Self { secret }
    }

    /// Every ciphertext is checked against the fingerprint of the secret
    /// before anything is decrypted.
    pub fn decrypt(&self, scores: &EncryptedScoreSet<S::Ciphertext>) -> Result<ScoreVector> {
        let expected = self.secret.fingerprint();
        if let Some(ct) = scores.scores.iter().find(|ct| ct.fingerprint() != expected) {
            return Err(PipelineError::ContextMismatch(format!(
                "score produced under context {}, decrypting with {}",
                ct.fingerprint(),
                expected
            )));
        }
        scores
            .scores
            .iter()
            .map(|ct| {
                self.secret.decrypt(ct)?.first().copied().ok_or_else(|| {
                    PipelineError::Evaluation("decrypted score has no slots".to_string())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HomomorphicBackend, MockBackend, MockCiphertext, MockSecret};

    #[test]
    fn foreign_scores_are_rejected() {
        let a: MockSecret = MockSecret::new(4);
        let b: MockSecret = MockSecret::new(4);
        let backend: MockBackend = MockBackend::from_secret(&a);
        let scores: EncryptedScoreSet<MockCiphertext> = EncryptedScoreSet {
            scores: vec![backend.encrypt(&[1.0]).unwrap(), backend.encrypt(&[2.0]).unwrap()],
        };
        assert_eq!(Decryptor::new(&a).decrypt(&scores).unwrap(), vec![1.0, 2.0]);
        assert!(matches!(
            Decryptor::new(&b).decrypt(&scores),
            Err(PipelineError::ContextMismatch(_))
        ));
    }
}
