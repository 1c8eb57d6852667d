//! Batch orchestration: embed, encrypt and classify on a worker pool, then
//! decrypt on the calling thread.

use crate::backend::{DecryptionCapability, HomomorphicBackend};
use crate::classifier::{EncryptedScoreSet, HomomorphicClassifier, Reduction};
use crate::decryptor::{Decryptor, ScoreVector};
use crate::embed::Embedder;
use crate::encryptor::{EncryptedVector, Encryptor};
use crate::error::{PipelineError, Result};
use crate::weights::ClassifierWeights;
use ckks::Fingerprint;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct CoordinatorOptions {
    /// Inputs are processed in chunks of at most this many items.
    pub max_batch_size: usize,
    /// Deadline of each chunk.
    pub timeout: Duration,
    /// Size of the worker pool; 0 picks the available parallelism.
    pub workers: usize,
    pub reduction: Reduction,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            timeout: Duration::from_secs(60),
            workers: 0,
            reduction: Reduction::RotateAndSum,
        }
    }
}

/// Outcome of one input together with the encrypted intermediates it
/// produced before finishing or failing.
#[derive(Debug)]
pub struct StagedItem<C> {
    pub result: Result<ScoreVector>,
    pub encrypted_embedding: Option<EncryptedVector<C>>,
    pub encrypted_scores: Option<EncryptedScoreSet<C>>,
}

struct WorkerReport<C> {
    index: usize,
    encrypted: Option<EncryptedVector<C>>,
    /// `Ok(None)` when classification is left to the coordinator.
    outcome: Result<Option<EncryptedScoreSet<C>>>,
}

pub struct PipelineCoordinator<B: HomomorphicBackend> {
    secret: B::Secret,
    backend: Arc<B>,
    weights: Arc<ClassifierWeights>,
    encryptor: Arc<Encryptor<B>>,
    classifier: HomomorphicClassifier<B>,
    embedder: Arc<dyn Embedder>,
    pool: ThreadPool,
    options: CoordinatorOptions,
}

impl<B: HomomorphicBackend> PipelineCoordinator<B> {
    /// Takes ownership of the secret. Keys must already exist: nothing is
    /// generated once workers run.
    pub fn new(
        secret: B::Secret,
        weights: ClassifierWeights,
        embedder: Arc<dyn Embedder>,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        if options.max_batch_size == 0 {
            return Err(PipelineError::Config("max_batch_size must be positive".to_string()));
        }
        if embedder.dim() != weights.dim() {
            return Err(PipelineError::ShapeMismatch(format!(
                "embedder produces {} values, classifier expects {}",
                embedder.dim(),
                weights.dim()
            )));
        }
        let pool: ThreadPool = ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("emocrypt-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let weights: Arc<ClassifierWeights> = Arc::new(weights);
        let backend: Arc<B> = Arc::new(B::from_secret(&secret));
        let encryptor: Arc<Encryptor<B>> = Arc::new(Encryptor::new(backend.clone(), weights.dim())?);
        let classifier: HomomorphicClassifier<B> = HomomorphicClassifier::new(backend.clone(), weights.clone())?;

        info!(
            backend = backend.name(),
            fingerprint = %backend.fingerprint(),
            classes = weights.classes(),
            dim = weights.dim(),
            workers = pool.current_num_threads(),
            reduction = ?options.reduction,
            "pipeline ready"
        );

        Ok(Self {
            secret,
            backend,
            weights,
            encryptor,
            classifier,
            embedder,
            pool,
            options,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn secret(&self) -> &B::Secret {
        &self.secret
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.secret.fingerprint()
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Fresh keys. Encrypted artifacts of earlier batches become undecryptable.
    pub fn regenerate_context(&mut self) -> Result<()> {
        self.secret.regenerate()?;
        self.backend = Arc::new(B::from_secret(&self.secret));
        self.encryptor = Arc::new(Encryptor::new(self.backend.clone(), self.weights.dim())?);
        self.classifier = HomomorphicClassifier::new(self.backend.clone(), self.weights.clone())?;
        Ok(())
    }

    /// One result per input, in input order. A failing item never affects
    /// the others.
    pub fn process_batch(&self, texts: &[String]) -> Vec<Result<ScoreVector>> {
        self.process_batch_staged(texts)
            .into_iter()
            .map(|item| item.result)
            .collect()
    }

    /// Same as [PipelineCoordinator::process_batch] but also returns the
    /// encrypted intermediates of every item.
    pub fn process_batch_staged(&self, texts: &[String]) -> Vec<StagedItem<B::Ciphertext>> {
        if texts.is_empty() {
            return Vec::new();
        }
        info!(items = texts.len(), chunk = self.options.max_batch_size, "processing batch");
        let mut items: Vec<StagedItem<B::Ciphertext>> = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(self.options.max_batch_size).enumerate() {
            let offset: usize = i * self.options.max_batch_size;
            items.extend(self.process_chunk(chunk, offset));
        }
        let failures: usize = items.iter().filter(|item| item.result.is_err()).count();
        info!(items = items.len(), failures, "batch done");
        items
    }

    fn process_chunk(&self, texts: &[String], offset: usize) -> Vec<StagedItem<B::Ciphertext>> {
        let cancel: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<WorkerReport<B::Ciphertext>>();
        let defer_classification: bool = self.options.reduction == Reduction::DecryptAndSum;

        for (index, text) in texts.iter().enumerate() {
            let tx = tx.clone();
            let cancel: Arc<AtomicBool> = cancel.clone();
            let text: String = text.clone();
            let embedder: Arc<dyn Embedder> = self.embedder.clone();
            let encryptor: Arc<Encryptor<B>> = self.encryptor.clone();
            let classifier: HomomorphicClassifier<B> = self.classifier.clone();
            self.pool.spawn(move || {
                if let Some(report) =
                    run_item(index, &text, &*embedder, &encryptor, &classifier, defer_classification, &cancel)
                {
                    // The receiver is gone once the deadline passed.
                    let _ = tx.send(report);
                }
            });
        }
        drop(tx);

        let deadline: Instant = Instant::now() + self.options.timeout;
        let mut reports: Vec<Option<WorkerReport<B::Ciphertext>>> = (0..texts.len()).map(|_| None).collect();
        let mut pending: usize = texts.len();
        while pending > 0 {
            let remaining: Duration = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(report) => {
                    let index: usize = report.index;
                    reports[index] = Some(report);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::SeqCst);
                    warn!(
                        pending,
                        timeout = ?self.options.timeout,
                        "chunk deadline expired, cancelling outstanding items"
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Cancelled workers finish their current stage before noticing the
        // flag. Wait for them so the next chunk starts on an idle pool.
        if pending > 0 {
            let late: usize = rx.iter().count();
            debug!(late, "cancelled items drained");
        }

        reports
            .into_iter()
            .enumerate()
            .map(|(index, report)| match report {
                Some(report) => self.finish_item(offset + index, report),
                None => StagedItem {
                    result: Err(PipelineError::Timeout(self.options.timeout)),
                    encrypted_embedding: None,
                    encrypted_scores: None,
                },
            })
            .collect()
    }

    /// Decryption and the decrypt-and-sum reduction stay on this thread.
    fn finish_item(&self, index: usize, report: WorkerReport<B::Ciphertext>) -> StagedItem<B::Ciphertext> {
        let scores: Result<EncryptedScoreSet<B::Ciphertext>> = match (report.outcome, &report.encrypted) {
            (Err(err), _) => Err(err),
            (Ok(Some(scores)), _) => Ok(scores),
            (Ok(None), Some(encrypted)) => self.classifier.classify_with_decryption(encrypted, &self.secret),
            (Ok(None), None) => Err(PipelineError::Evaluation("no encrypted embedding to classify".to_string())),
        };
        let (result, encrypted_scores) = match scores {
            Ok(scores) => (Decryptor::new(&self.secret).decrypt(&scores), Some(scores)),
            Err(err) => (Err(err), None),
        };
        match &result {
            Ok(_) => debug!(index, "item done"),
            Err(err) => debug!(index, kind = err.kind(), %err, "item failed"),
        }
        StagedItem {
            result,
            encrypted_embedding: report.encrypted,
            encrypted_scores,
        }
    }
}

/// Returns None if the chunk was cancelled before the item finished.
fn run_item<B: HomomorphicBackend>(
    index: usize,
    text: &str,
    embedder: &dyn Embedder,
    encryptor: &Encryptor<B>,
    classifier: &HomomorphicClassifier<B>,
    defer_classification: bool,
    cancel: &AtomicBool,
) -> Option<WorkerReport<B::Ciphertext>> {
    let cancelled = || cancel.load(Ordering::SeqCst);
    let failed = |err: PipelineError| WorkerReport {
        index,
        encrypted: None,
        outcome: Err(err),
    };

    if cancelled() {
        return None;
    }
    let embedding: Vec<f64> = match contain(PipelineError::Embedding, || embedder.embed(text)) {
        Ok(embedding) => embedding,
        Err(err) => return Some(failed(err)),
    };

    if cancelled() {
        return None;
    }
    let encrypted: EncryptedVector<B::Ciphertext> =
        match contain(PipelineError::Evaluation, || encryptor.encrypt(&embedding)) {
            Ok(encrypted) => encrypted,
            Err(err) => return Some(failed(err)),
        };

    if cancelled() {
        return None;
    }
    let outcome: Result<Option<EncryptedScoreSet<B::Ciphertext>>> = if defer_classification {
        Ok(None)
    } else {
        contain(PipelineError::Evaluation, || classifier.classify(&encrypted)).map(Some)
    };
    Some(WorkerReport {
        index,
        encrypted: Some(encrypted),
        outcome,
    })
}

/// Runs one stage of an item, turning a panic into an error of that item.
/// A panic escaping a pool job would abort the process.
fn contain<T>(wrap: fn(String) -> PipelineError, stage: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(stage)) {
        Ok(result) => result,
        Err(payload) => Err(wrap(format!("panicked: {}", panic_message(payload.as_ref())))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    match payload.downcast_ref::<&str>() {
        Some(msg) => *msg,
        None => payload.downcast_ref::<String>().map_or("unknown panic payload", String::as_str),
    }
}
