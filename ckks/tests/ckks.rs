use ckks::{Ciphertext, CkksError, EncryptionContext, Plaintext, ParametersLiteral, PublicContext, SecurityLevel};
use math::serialization::WriterTo;
use sampling::source::Source;
use std::sync::Arc;

const PRECISION: f64 = 1e-4;

fn literal() -> ParametersLiteral {
    ParametersLiteral {
        log_n: 10,
        log_moduli: vec![60, 40, 40, 60],
        log_scale: 40,
        sigma: 3.2,
        security: SecurityLevel::None,
        sum_width: Some(8),
    }
}

fn assert_close(have: &[f64], want: &[f64], precision: f64) {
    want.iter().zip(have.iter()).enumerate().for_each(|(i, (w, h))| {
        assert!((w - h).abs() < precision, "slot {}: have {} want {}", i, h, w);
    });
}

#[test]
fn ckks_pipeline_operations() {
    let mut source: Source = Source::new([0u8; 32]);
    let ctx: EncryptionContext = EncryptionContext::initialize_with_source(&literal(), &mut source).unwrap();

    sub_test("test_encrypt_decrypt", || test_encrypt_decrypt(&ctx, &mut source));
    sub_test("test_mul_plain_rescale", || test_mul_plain_rescale(&ctx, &mut source));
    sub_test("test_add_plain", || test_add_plain(&ctx, &mut source));
    sub_test("test_rotate", || test_rotate(&ctx, &mut source));
    sub_test("test_sum_slots", || test_sum_slots(&ctx, &mut source));
    sub_test("test_missing_rotation_key", || test_missing_rotation_key(&ctx, &mut source));
    sub_test("test_level_exhausted", || test_level_exhausted(&ctx, &mut source));
    sub_test("test_ciphertext_serialization", || test_ciphertext_serialization(&ctx, &mut source));
}

#[test]
fn ckks_context_lifecycle() {
    let mut source: Source = Source::new([1u8; 32]);
    let mut ctx: EncryptionContext = EncryptionContext::initialize_with_source(&literal(), &mut source).unwrap();

    sub_test("test_context_serialization", || test_context_serialization(&ctx, &mut source));
    sub_test("test_context_isolation", || test_context_isolation(&ctx, &mut source));
    sub_test("test_regenerate", || test_regenerate(&mut ctx, &mut source));
    sub_test("test_malformed_context", || test_malformed_context(&ctx));
}

#[test]
fn ckks_invalid_parameters() {
    let mut literal: ParametersLiteral = literal();
    literal.log_moduli = vec![60, 60];
    assert!(matches!(
        EncryptionContext::initialize(&literal),
        Err(CkksError::InvalidParameters(_))
    ));
}

fn sub_test<F: FnOnce()>(name: &str, f: F) {
    println!("Running {}", name);
    f();
}

fn test_encrypt_decrypt(ctx: &EncryptionContext, source: &mut Source) {
    let values: Vec<f64> = vec![0.5, -1.25, 3.0, 0.0, 100.0, -0.001];
    let ct: Ciphertext = ctx.public().encrypt(&values, source).unwrap();
    assert_eq!(ct.level(), ctx.parameters().max_level());
    assert_eq!(ct.fingerprint(), ctx.fingerprint());

    let have: Vec<f64> = ctx.decrypt(&ct).unwrap();
    assert_eq!(have.len(), ctx.parameters().slots());
    assert_close(&have, &values, PRECISION);
    assert!(have[values.len()..].iter().all(|x| x.abs() < PRECISION));
}

fn test_mul_plain_rescale(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let values: Vec<f64> = vec![2.0, 3.0, -1.5, 0.25];
    let weights: Vec<f64> = vec![0.5, -2.0, 4.0, 1.0];

    let ct: Ciphertext = public.encrypt(&values, source).unwrap();
    let pt: Plaintext = public.encode(&weights, ctx.parameters().scale(), ct.level()).unwrap();
    let prod: Ciphertext = public.mul_plain(&ct, &pt).unwrap();
    let rescaled: Ciphertext = public.rescale(&prod).unwrap();

    assert_eq!(rescaled.level(), ct.level() - 1);
    let q_last: f64 = ctx.parameters().q()[ct.level()] as f64;
    assert_eq!(rescaled.scale(), prod.scale() / q_last);

    let want: Vec<f64> = values.iter().zip(weights.iter()).map(|(v, w)| v * w).collect();
    assert_close(&ctx.decrypt(&rescaled).unwrap(), &want, PRECISION);
}

fn test_add_plain(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let ct: Ciphertext = public.encrypt(&[1.0, 2.0], source).unwrap();
    let pt: Plaintext = public.encode(&[0.5, -4.0], ct.scale(), ct.level()).unwrap();
    let sum: Ciphertext = public.add_plain(&ct, &pt).unwrap();
    assert_close(&ctx.decrypt(&sum).unwrap(), &[1.5, -2.0], PRECISION);

    let wrong_scale: Plaintext = public.encode(&[0.5], ct.scale() * 2.0, ct.level()).unwrap();
    assert!(matches!(
        public.add_plain(&ct, &wrong_scale),
        Err(CkksError::ScaleMismatch { .. })
    ));
}

fn test_rotate(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let values: Vec<f64> = (0..16).map(|i| i as f64).collect();
    let ct: Ciphertext = public.encrypt(&values, source).unwrap();

    for steps in [1i64, 2, 4] {
        let rotated: Ciphertext = public.rotate(&ct, steps).unwrap();
        let want: Vec<f64> = values[steps as usize..].to_vec();
        assert_close(&ctx.decrypt(&rotated).unwrap(), &want, PRECISION);
    }

    // Rotations also work one level down.
    let pt: Plaintext = public.encode(&[1.0; 16], ctx.parameters().scale(), ct.level()).unwrap();
    let lower: Ciphertext = public.rescale(&public.mul_plain(&ct, &pt).unwrap()).unwrap();
    let rotated: Ciphertext = public.rotate(&lower, 2).unwrap();
    assert_close(&ctx.decrypt(&rotated).unwrap(), &values[2..], PRECISION);
}

fn test_sum_slots(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
    let ct: Ciphertext = public.encrypt(&values, source).unwrap();
    let sum: Ciphertext = public.sum_slots(&ct, values.len()).unwrap();
    let have: Vec<f64> = ctx.decrypt(&sum).unwrap();
    assert!((have[0] - 28.0).abs() < PRECISION, "have {}", have[0]);
}

fn test_missing_rotation_key(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let ct: Ciphertext = public.encrypt(&[1.0], source).unwrap();
    assert!(matches!(public.rotate(&ct, 3), Err(CkksError::MissingRotationKey(3))));
    assert!(matches!(public.rotate(&ct, -1), Err(CkksError::MissingRotationKey(-1))));
    assert_eq!(public.rotate(&ct, 0).unwrap(), ct);
}

fn test_level_exhausted(ctx: &EncryptionContext, source: &mut Source) {
    let public: &Arc<PublicContext> = ctx.public();
    let mut ct: Ciphertext = public.encrypt(&[1.0], source).unwrap();
    while ct.level() > 0 {
        ct = public.rescale(&ct).unwrap();
    }
    assert!(matches!(public.rescale(&ct), Err(CkksError::LevelExhausted)));
}

fn test_ciphertext_serialization(ctx: &EncryptionContext, source: &mut Source) {
    let ct: Ciphertext = ctx.public().encrypt(&[3.5, -1.0], source).unwrap();
    let mut buffer: Vec<u8> = Vec::new();
    ct.write_to(&mut buffer).unwrap();
    let mut reader: &[u8] = &buffer;
    let receiver: Ciphertext = Ciphertext::read(&mut reader).unwrap();
    assert_eq!(ct, receiver, "Deserialized object does not match the original");
    assert_close(&ctx.decrypt(&receiver).unwrap(), &[3.5, -1.0], PRECISION);
}

fn test_context_serialization(ctx: &EncryptionContext, source: &mut Source) {
    let ct: Ciphertext = ctx.public().encrypt(&[0.75, 1.5], source).unwrap();
    let bytes: Vec<u8> = ctx.serialize().unwrap();
    let restored: EncryptionContext = EncryptionContext::deserialize(&bytes).unwrap();
    assert_eq!(restored.fingerprint(), ctx.fingerprint());
    assert_eq!(restored.parameters().q(), ctx.parameters().q());
    assert_close(&restored.decrypt(&ct).unwrap(), &[0.75, 1.5], PRECISION);

    // Rotation keys survive the round trip.
    let rotated: Ciphertext = restored.public().rotate(&ct, 1).unwrap();
    assert_close(&ctx.decrypt(&rotated).unwrap(), &[1.5], PRECISION);
}

fn test_context_isolation(ctx: &EncryptionContext, source: &mut Source) {
    let other: EncryptionContext = EncryptionContext::initialize_with_source(&literal(), source).unwrap();
    assert_ne!(other.fingerprint(), ctx.fingerprint());
    let ct: Ciphertext = ctx.public().encrypt(&[1.0], source).unwrap();
    assert!(matches!(other.decrypt(&ct), Err(CkksError::ContextMismatch { .. })));
    assert!(matches!(
        other.public().rotate(&ct, 1),
        Err(CkksError::ContextMismatch { .. })
    ));
}

fn test_regenerate(ctx: &mut EncryptionContext, source: &mut Source) {
    let ct: Ciphertext = ctx.public().encrypt(&[1.0], source).unwrap();
    let before = ctx.fingerprint();
    ctx.regenerate_with_source(source).unwrap();
    assert_ne!(before, ctx.fingerprint());
    assert!(matches!(ctx.decrypt(&ct), Err(CkksError::ContextMismatch { .. })));

    let fresh: Ciphertext = ctx.public().encrypt(&[2.0], source).unwrap();
    assert_close(&ctx.decrypt(&fresh).unwrap(), &[2.0], PRECISION);
}

fn test_malformed_context(ctx: &EncryptionContext) {
    let bytes: Vec<u8> = ctx.serialize().unwrap();

    assert!(EncryptionContext::deserialize(&bytes[..bytes.len() / 2]).is_err());
    assert!(EncryptionContext::deserialize(b"not a context").is_err());

    let mut tampered: Vec<u8> = bytes.clone();
    let last: usize = tampered.len() - 1;
    tampered[last] ^= 1;
    assert!(matches!(
        EncryptionContext::deserialize(&tampered),
        Err(CkksError::Serialization(_))
    ));

    let mut trailing: Vec<u8> = bytes;
    trailing.push(0);
    assert!(EncryptionContext::deserialize(&trailing).is_err());
}
