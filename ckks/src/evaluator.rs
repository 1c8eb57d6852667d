use crate::ciphertext::{Ciphertext, Plaintext};
use crate::context::PublicContext;
use crate::error::{CkksError, Result};
use crate::keys::SwitchingKey;
use math::automorphism::{AutoPerm, galois_element};
use math::poly::{Poly, PolyRNS};
use math::ring::RingRNS;

/// Relative tolerance under which two scales are considered equal.
const SCALE_TOLERANCE: f64 = 1e-9;

impl PublicContext {
    /// Encodes `values` into a plaintext at `level` and `scale`.
    pub fn encode(&self, values: &[f64], scale: f64, level: usize) -> Result<Plaintext> {
        if level > self.params.max_level() {
            return Err(CkksError::LevelMismatch {
                lhs: level,
                rhs: self.params.max_level(),
            });
        }
        let coeffs: Vec<i64> = self.encoder.encode(values, scale)?;
        let ring: RingRNS<u64> = self.params.ring_q().at_level(level);
        let mut value: PolyRNS<u64> = ring.new_polyrns();
        ring.from_i64(&coeffs, &mut value);
        ring.ntt_inplace(&mut value);
        Ok(Plaintext { value, scale })
    }

    /// Rejects ciphertexts from another context or with a shape that does
    /// not fit the parameters.
    pub fn check_ciphertext(&self, ct: &Ciphertext) -> Result<()> {
        if ct.fingerprint != self.fingerprint {
            return Err(CkksError::ContextMismatch {
                expected: self.fingerprint,
                found: ct.fingerprint,
            });
        }
        if ct.c0.0.is_empty() || ct.c0.level() != ct.c1.level() {
            return Err(CkksError::InvalidCiphertext("components differ in shape".to_string()));
        }
        if ct.n() != self.params.n() || ct.c1.n() != self.params.n() {
            return Err(CkksError::InvalidCiphertext(format!(
                "degree {} != N={}",
                ct.n(),
                self.params.n()
            )));
        }
        if ct.level() > self.params.max_level() {
            return Err(CkksError::InvalidCiphertext(format!(
                "level {} > max level {}",
                ct.level(),
                self.params.max_level()
            )));
        }
        Ok(())
    }

    /// Slot-wise product. The scale of the result is the product of scales.
    pub fn mul_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        if pt.level() < ct.level() {
            return Err(CkksError::LevelMismatch {
                lhs: ct.level(),
                rhs: pt.level(),
            });
        }
        let ring: RingRNS<u64> = self.params.ring_q().at_level(ct.level());
        let mut c0: PolyRNS<u64> = ring.new_polyrns();
        let mut c1: PolyRNS<u64> = ring.new_polyrns();
        ring.mul_coeffs(&ct.c0, &pt.value, &mut c0);
        ring.mul_coeffs(&ct.c1, &pt.value, &mut c1);
        Ok(Ciphertext {
            c0,
            c1,
            scale: ct.scale * pt.scale,
            fingerprint: ct.fingerprint,
        })
    }

    /// Divides by the last prime of the ciphertext, dropping one level.
    pub fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        let level: usize = ct.level();
        if level == 0 {
            return Err(CkksError::LevelExhausted);
        }
        let ring: RingRNS<u64> = self.params.ring_q().at_level(level);
        let ring_down: RingRNS<u64> = self.params.ring_q().at_level(level - 1);
        let mut c0: PolyRNS<u64> = ring_down.new_polyrns();
        let mut c1: PolyRNS<u64> = ring_down.new_polyrns();
        ring.div_round_by_last_modulus_ntt(&ct.c0, &mut c0);
        ring.div_round_by_last_modulus_ntt(&ct.c1, &mut c1);
        Ok(Ciphertext {
            c0,
            c1,
            scale: ct.scale / ring.0[level].q() as f64,
            fingerprint: ct.fingerprint,
        })
    }

    pub fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        check_scales(ct.scale, pt.scale)?;
        if pt.level() < ct.level() {
            return Err(CkksError::LevelMismatch {
                lhs: ct.level(),
                rhs: pt.level(),
            });
        }
        let ring: RingRNS<u64> = self.params.ring_q().at_level(ct.level());
        let mut c0: PolyRNS<u64> = ring.new_polyrns();
        ring.add(&ct.c0, &pt.value, &mut c0);
        Ok(Ciphertext {
            c0,
            c1: ct.c1.clone(),
            scale: ct.scale,
            fingerprint: ct.fingerprint,
        })
    }

    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_ciphertext(a)?;
        self.check_ciphertext(b)?;
        if a.level() != b.level() {
            return Err(CkksError::LevelMismatch {
                lhs: a.level(),
                rhs: b.level(),
            });
        }
        check_scales(a.scale, b.scale)?;
        let ring: RingRNS<u64> = self.params.ring_q().at_level(a.level());
        let mut c0: PolyRNS<u64> = ring.new_polyrns();
        let mut c1: PolyRNS<u64> = ring.new_polyrns();
        ring.add(&a.c0, &b.c0, &mut c0);
        ring.add(&a.c1, &b.c1, &mut c1);
        Ok(Ciphertext {
            c0,
            c1,
            scale: a.scale,
            fingerprint: a.fingerprint,
        })
    }

    /// Rotates the slots to the left by `steps` (to the right if negative).
    pub fn rotate(&self, ct: &Ciphertext, steps: i64) -> Result<Ciphertext> {
        self.check_ciphertext(ct)?;
        let gal_el: usize = galois_element(self.params.n(), steps);
        if gal_el == 1 {
            return Ok(ct.clone());
        }
        let key: &SwitchingKey = self
            .gks
            .get(gal_el)
            .ok_or(CkksError::MissingRotationKey(steps))?;
        let perm: &AutoPerm = self
            .perms
            .get(&gal_el)
            .ok_or(CkksError::MissingRotationKey(steps))?;

        let level: usize = ct.level();
        let ring: RingRNS<u64> = self.params.ring_q().at_level(level);

        let mut tmp: PolyRNS<u64> = ct.c0.clone();
        ring.intt_inplace(&mut tmp);
        let mut c0: PolyRNS<u64> = ring.new_polyrns();
        ring.automorphism(&tmp, perm, &mut c0);
        ring.ntt_inplace(&mut c0);

        tmp.copy_from(&ct.c1);
        ring.intt_inplace(&mut tmp);
        let mut c1_rot: PolyRNS<u64> = ring.new_polyrns();
        ring.automorphism(&tmp, perm, &mut c1_rot);

        let (ks0, c1) = self.key_switch(&c1_rot, key, level);
        ring.add_inplace(&ks0, &mut c0);

        Ok(Ciphertext {
            c0,
            c1,
            scale: ct.scale,
            fingerprint: ct.fingerprint,
        })
    }

    /// Sums the first `width` slots (rounded up to a power of two) into slot 0
    /// with log2(width) rotations.
    pub fn sum_slots(&self, ct: &Ciphertext, width: usize) -> Result<Ciphertext> {
        let mut acc: Ciphertext = ct.clone();
        let mut step: usize = 1;
        while step < width {
            let rotated: Ciphertext = self.rotate(&acc, step as i64)?;
            acc = self.add(&acc, &rotated)?;
            step <<= 1;
        }
        Ok(acc)
    }

    /// Returns (d0, d1) in the NTT domain over q_0, ..., q_level such that
    /// d0 + d1*s ~ a*s' where `key` switches from s' to s. `a` is given in the
    /// coefficient domain.
    fn key_switch(&self, a: &PolyRNS<u64>, key: &SwitchingKey, level: usize) -> (PolyRNS<u64>, PolyRNS<u64>) {
        let special: usize = self.params.max_level() + 1;
        let chain: RingRNS<u64> = self.params.ring_q().at_level_with(level, self.params.ring_p());

        let mut acc0: PolyRNS<u64> = chain.new_polyrns();
        let mut acc1: PolyRNS<u64> = chain.new_polyrns();
        let mut digit: Vec<i64> = vec![0i64; self.params.n()];
        let mut buf: Poly<u64> = chain.new_poly();

        for j in 0..=level {
            let ring_j = &chain.0[j];
            digit
                .iter_mut()
                .zip(a.at(j).0.iter())
                .for_each(|(d, x)| *d = ring_j.center(*x));

            for (i, ring_i) in chain.0.iter().enumerate() {
                let k: usize = if i <= level { i } else { special };
                ring_i.from_i64(&digit, &mut buf);
                ring_i.ntt_inplace(&mut buf);
                ring_i.mul_coeffs_then_add(&buf, key.b[j].at(k), acc0.at_mut(i));
                ring_i.mul_coeffs_then_add(&buf, key.a[j].at(k), acc1.at_mut(i));
            }
        }

        let ring: RingRNS<u64> = self.params.ring_q().at_level(level);
        let mut d0: PolyRNS<u64> = ring.new_polyrns();
        let mut d1: PolyRNS<u64> = ring.new_polyrns();
        chain.div_round_by_last_modulus_ntt(&acc0, &mut d0);
        chain.div_round_by_last_modulus_ntt(&acc1, &mut d1);
        (d0, d1)
    }
}

fn check_scales(lhs: f64, rhs: f64) -> Result<()> {
    if ((lhs - rhs) / lhs).abs() > SCALE_TOLERANCE {
        return Err(CkksError::ScaleMismatch { lhs, rhs });
    }
    Ok(())
}
