use ckks::{EncryptionContext, ParametersLiteral, SecurityLevel};
use emocrypt::backend::DecryptionCapability;
use emocrypt::{
    CkksBackend, ClassifierWeights, CoordinatorOptions, Decryptor, EncryptedScoreSet, EncryptedVector, Encryptor,
    FnEmbedder, HomomorphicBackend, HomomorphicClassifier, MockBackend, MockSecret, PipelineCoordinator,
    PipelineError, Reduction, ScoreVector,
};
use sampling::source::Source;
use std::sync::Arc;
use std::time::Duration;

const PRECISION: f64 = 1e-2;

fn literal(dim: usize) -> ParametersLiteral {
    ParametersLiteral {
        log_n: 10,
        log_moduli: vec![60, 40, 40, 60],
        log_scale: 40,
        sigma: 3.2,
        security: SecurityLevel::None,
        sum_width: Some(dim),
    }
}

fn context(dim: usize, seed: u8) -> EncryptionContext {
    EncryptionContext::initialize_with_source(&literal(dim), &mut Source::new([seed; 32])).unwrap()
}

fn assert_close(have: &[f64], want: &[f64]) {
    assert_eq!(have.len(), want.len());
    want.iter().zip(have.iter()).enumerate().for_each(|(i, (w, h))| {
        let tolerance: f64 = PRECISION * w.abs().max(1.0);
        assert!((w - h).abs() < tolerance, "score {}: have {} want {}", i, h, w);
    });
}

/// Deterministic weights in [-1, 1].
fn weights(classes: usize, dim: usize, seed: u8) -> ClassifierWeights {
    let mut source: Source = Source::new([seed; 32]);
    let w: Vec<Vec<f64>> = (0..classes)
        .map(|_| (0..dim).map(|_| source.next_f64(-1.0, 1.0)).collect())
        .collect();
    let b: Vec<f64> = (0..classes).map(|_| source.next_f64(-1.0, 1.0)).collect();
    ClassifierWeights::new(w, b, classes, dim).unwrap()
}

fn parse_embedder(dim: usize) -> FnEmbedder<impl Fn(&str) -> emocrypt::error::Result<Vec<f64>> + Send + Sync> {
    FnEmbedder::new(dim, |text: &str| {
        text.split(',')
            .map(|x| {
                x.trim()
                    .parse::<f64>()
                    .map_err(|e| PipelineError::Embedding(e.to_string()))
            })
            .collect()
    })
}

#[test]
fn ckks_classification() {
    let ctx: EncryptionContext = context(7, 0);

    sub_test("test_round_trip", || test_round_trip(&ctx));
    sub_test("test_identity_scenario", || test_identity_scenario());
    sub_test("test_linear_correctness", || test_linear_correctness(&ctx));
    sub_test("test_context_isolation", || test_context_isolation(&ctx));
    sub_test("test_shape_validation", || test_shape_validation(&ctx));
}

#[test]
fn ckks_coordinator() {
    sub_test("test_batch_isolation", test_batch_isolation);
    sub_test("test_empty_batch", test_empty_batch);
    sub_test("test_decrypt_and_sum", test_decrypt_and_sum);
}

#[test]
fn mock_coordinator() {
    sub_test("test_order_preservation", test_order_preservation);
    sub_test("test_timeout", test_timeout);
}

fn sub_test<F: FnOnce()>(name: &str, f: F) {
    println!("Running {}", name);
    f();
}

fn test_round_trip(ctx: &EncryptionContext) {
    let backend: Arc<CkksBackend> = Arc::new(CkksBackend::from_secret(ctx));
    let encryptor: Encryptor<CkksBackend> = Encryptor::new(backend, 7).unwrap();
    let v: Vec<f64> = vec![0.9, -0.3, 0.0, 1.0, -1.0, 0.123, 0.5];
    let e: EncryptedVector<ckks::Ciphertext> = encryptor.encrypt(&v).unwrap();
    assert_eq!(e.fingerprint(), ctx.fingerprint());
    let have: Vec<f64> = DecryptionCapability::decrypt(ctx, &e.ciphertext).unwrap();
    assert_close(&have[..7], &v);
}

fn test_identity_scenario() {
    let ctx: EncryptionContext = context(4, 1);
    let backend: Arc<CkksBackend> = Arc::new(CkksBackend::from_secret(&ctx));
    let weights: ClassifierWeights = ClassifierWeights::new(
        vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
        vec![0.0, 0.0],
        2,
        4,
    )
    .unwrap();
    let classifier: HomomorphicClassifier<CkksBackend> =
        HomomorphicClassifier::new(backend.clone(), Arc::new(weights)).unwrap();
    let e: EncryptedVector<ckks::Ciphertext> =
        Encryptor::new(backend, 4).unwrap().encrypt(&[2.0, 3.0, 0.0, 0.0]).unwrap();
    let scores: EncryptedScoreSet<ckks::Ciphertext> = classifier.classify(&e).unwrap();
    assert_eq!(scores.classes(), 2);
    assert_close(&Decryptor::new(&ctx).decrypt(&scores).unwrap(), &[2.0, 3.0]);
}

fn test_linear_correctness(ctx: &EncryptionContext) {
    let backend: Arc<CkksBackend> = Arc::new(CkksBackend::from_secret(ctx));
    let weights: Arc<ClassifierWeights> = Arc::new(weights(7, 7, 2));
    let classifier: HomomorphicClassifier<CkksBackend> =
        HomomorphicClassifier::new(backend.clone(), weights.clone()).unwrap();
    let encryptor: Encryptor<CkksBackend> = Encryptor::new(backend, 7).unwrap();

    let vectors: Vec<Vec<f64>> = vec![
        vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
        vec![-1.0, 0.0, 1.0, -0.5, 0.25, 0.75, -0.125],
    ];
    for (e, v) in encryptor.encrypt_batch(&vectors).unwrap().iter().zip(vectors.iter()) {
        let scores: EncryptedScoreSet<ckks::Ciphertext> = classifier.classify(e).unwrap();
        let have: ScoreVector = Decryptor::new(ctx).decrypt(&scores).unwrap();
        assert_close(&have, &weights.evaluate(v));
    }
}

fn test_context_isolation(ctx: &EncryptionContext) {
    let other: EncryptionContext = context(7, 3);
    let backend: Arc<CkksBackend> = Arc::new(CkksBackend::from_secret(ctx));
    let classifier: HomomorphicClassifier<CkksBackend> =
        HomomorphicClassifier::new(backend.clone(), Arc::new(weights(7, 7, 4))).unwrap();
    let e: EncryptedVector<ckks::Ciphertext> = Encryptor::new(backend, 7).unwrap().encrypt(&[0.5; 7]).unwrap();
    let scores: EncryptedScoreSet<ckks::Ciphertext> = classifier.classify(&e).unwrap();

    assert!(matches!(
        Decryptor::new(&other).decrypt(&scores),
        Err(PipelineError::ContextMismatch(_))
    ));

    // Evaluating a foreign ciphertext is rejected too.
    let foreign: HomomorphicClassifier<CkksBackend> = HomomorphicClassifier::new(
        Arc::new(CkksBackend::from_secret(&other)),
        Arc::new(weights(7, 7, 4)),
    )
    .unwrap();
    assert!(matches!(foreign.classify(&e), Err(PipelineError::ContextMismatch(_))));
}

fn test_shape_validation(ctx: &EncryptionContext) {
    let backend: Arc<CkksBackend> = Arc::new(CkksBackend::from_secret(ctx));
    let encryptor: Encryptor<CkksBackend> = Encryptor::new(backend.clone(), 7).unwrap();
    assert!(matches!(
        encryptor.encrypt(&[1.0; 6]),
        Err(PipelineError::DimensionMismatch { expected: 7, got: 6 })
    ));

    // Rotation keys of this context only cover sums of up to 8 slots.
    let wide: ClassifierWeights = weights(2, 9, 5);
    assert!(matches!(
        HomomorphicClassifier::new(backend, Arc::new(wide)),
        Err(PipelineError::SchemeParameter(_))
    ));
}

fn test_batch_isolation() {
    let ctx: EncryptionContext = context(4, 6);
    let weights: ClassifierWeights = weights(3, 4, 7);
    let expected: Vec<Vec<f64>> = vec![
        weights.evaluate(&[0.1, 0.2, 0.3, 0.4]),
        Vec::new(),
        weights.evaluate(&[-0.4, 0.3, -0.2, 0.1]),
    ];
    let coordinator: PipelineCoordinator<CkksBackend> =
        PipelineCoordinator::new(ctx, weights, Arc::new(parse_embedder(4)), CoordinatorOptions::default()).unwrap();

    let texts: Vec<String> = vec![
        "0.1, 0.2, 0.3, 0.4".to_string(),
        "0.1, 0.2, 0.3".to_string(),
        "-0.4, 0.3, -0.2, 0.1".to_string(),
    ];
    let results: Vec<emocrypt::error::Result<ScoreVector>> = coordinator.process_batch(&texts);
    assert_eq!(results.len(), 3);
    assert_close(results[0].as_ref().unwrap(), &expected[0]);
    assert!(matches!(
        results[1],
        Err(PipelineError::DimensionMismatch { expected: 4, got: 3 })
    ));
    assert_close(results[2].as_ref().unwrap(), &expected[2]);
}

fn test_empty_batch() {
    let coordinator: PipelineCoordinator<CkksBackend> = PipelineCoordinator::new(
        context(4, 8),
        weights(2, 4, 9),
        Arc::new(parse_embedder(4)),
        CoordinatorOptions::default(),
    )
    .unwrap();
    assert!(coordinator.process_batch(&[]).is_empty());
}

fn test_decrypt_and_sum() {
    let weights: ClassifierWeights = weights(2, 4, 10);
    let want: Vec<f64> = weights.evaluate(&[1.0, -1.0, 0.5, 0.25]);
    let coordinator: PipelineCoordinator<CkksBackend> = PipelineCoordinator::new(
        context(4, 11),
        weights,
        Arc::new(parse_embedder(4)),
        CoordinatorOptions {
            reduction: Reduction::DecryptAndSum,
            ..Default::default()
        },
    )
    .unwrap();
    let items = coordinator.process_batch_staged(&["1, -1, 0.5, 0.25".to_string()]);
    assert_close(items[0].result.as_ref().unwrap(), &want);
    assert!(items[0].encrypted_embedding.is_some());
    assert_eq!(items[0].encrypted_scores.as_ref().unwrap().classes(), 2);
}

fn test_order_preservation() {
    let weights: ClassifierWeights = weights(2, 3, 12);
    let coordinator: PipelineCoordinator<MockBackend> = PipelineCoordinator::new(
        MockSecret::new(4),
        weights.clone(),
        Arc::new(parse_embedder(3)),
        CoordinatorOptions {
            max_batch_size: 4,
            workers: 3,
            ..Default::default()
        },
    )
    .unwrap();
    let vectors: Vec<Vec<f64>> = (0..23).map(|i| vec![i as f64, 1.0, -(i as f64) / 2.0]).collect();
    let texts: Vec<String> = vectors
        .iter()
        .map(|v| v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(","))
        .collect();
    let results: Vec<emocrypt::error::Result<ScoreVector>> = coordinator.process_batch(&texts);
    assert_eq!(results.len(), vectors.len());
    for (result, v) in results.iter().zip(vectors.iter()) {
        assert_close(result.as_ref().unwrap(), &weights.evaluate(v));
    }
}

fn test_timeout() {
    let embedder = FnEmbedder::new(2, |text: &str| {
        if text == "slow" {
            std::thread::sleep(Duration::from_secs(2));
        }
        Ok(vec![1.0, 2.0])
    });
    let coordinator: PipelineCoordinator<MockBackend> = PipelineCoordinator::new(
        MockSecret::new(2),
        ClassifierWeights::new(vec![vec![1.0, 1.0]], vec![0.0], 1, 2).unwrap(),
        Arc::new(embedder),
        CoordinatorOptions {
            timeout: Duration::from_millis(500),
            workers: 2,
            ..Default::default()
        },
    )
    .unwrap();
    let texts: Vec<String> = vec!["fast".to_string(), "slow".to_string(), "fast".to_string()];
    let results: Vec<emocrypt::error::Result<ScoreVector>> = coordinator.process_batch(&texts);
    assert_eq!(results[0].as_ref().unwrap(), &vec![3.0]);
    assert!(matches!(results[1], Err(PipelineError::Timeout(_))));
    assert_eq!(results[2].as_ref().unwrap(), &vec![3.0]);
}
