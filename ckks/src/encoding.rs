use crate::error::{CkksError, Result};
use math::automorphism::GALOIS_GENERATOR;
use math::modulus::WordOps;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Largest magnitude a scaled value may take before rounding to i64.
const MAX_SCALED: f64 = (1u64 << 62) as f64;

/// Canonical embedding of C^(n/2) into R[X]/(X^n+1).
///
/// Slot j is the evaluation at the root zeta^(5^j), so that the automorphism
/// X -> X^(5^r) rotates the slots to the left by r.
pub struct Encoder {
    slots: usize,
    m: usize,
    rot_group: Vec<usize>,
    ksi_pows: Vec<Complex64>,
}

impl Encoder {
    pub fn new(n: usize) -> Self {
        assert!(n.is_power_of_two() && n >= 2, "invalid n={}", n);
        let m: usize = n << 1;
        let slots: usize = n >> 1;

        let mut rot_group: Vec<usize> = Vec::with_capacity(slots);
        let mut five_pow: usize = 1;
        for _ in 0..slots {
            rot_group.push(five_pow);
            five_pow = (five_pow * GALOIS_GENERATOR) & (m - 1);
        }

        let ksi_pows: Vec<Complex64> = (0..=m)
            .map(|k| Complex64::from_polar(1.0, 2.0 * PI * (k as f64) / (m as f64)))
            .collect();

        Self {
            slots,
            m,
            rot_group,
            ksi_pows,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Scales `values` by `scale` and maps them to signed integer coefficients.
    /// Missing slots are zero.
    pub fn encode(&self, values: &[f64], scale: f64) -> Result<Vec<i64>> {
        if values.len() > self.slots {
            return Err(CkksError::TooManyValues {
                values: values.len(),
                slots: self.slots,
            });
        }

        let mut vals: Vec<Complex64> = vec![Complex64::new(0.0, 0.0); self.slots];
        vals.iter_mut()
            .zip(values.iter())
            .for_each(|(z, v)| *z = Complex64::new(*v, 0.0));

        self.embed_inv(&mut vals);

        let mut coeffs: Vec<i64> = vec![0i64; self.slots << 1];
        let (re, im) = coeffs.split_at_mut(self.slots);
        for (z, (re, im)) in vals.iter().zip(re.iter_mut().zip(im.iter_mut())) {
            *re = round_scaled(z.re, scale)?;
            *im = round_scaled(z.im, scale)?;
        }
        Ok(coeffs)
    }

    /// Maps real coefficients (already divided by the scale) back to the
    /// real parts of the slots.
    pub fn decode(&self, coeffs: &[f64]) -> Vec<f64> {
        debug_assert!(
            coeffs.len() == self.slots << 1,
            "invalid coeffs: coeffs.len()={} != n={}",
            coeffs.len(),
            self.slots << 1
        );
        let mut vals: Vec<Complex64> = (0..self.slots)
            .map(|i| Complex64::new(coeffs[i], coeffs[i + self.slots]))
            .collect();
        self.embed(&mut vals);
        vals.iter().map(|z| z.re).collect()
    }

    /// Evaluates the polynomial whose coefficients are given in bit-reversed
    /// slot order at the roots zeta^(5^j).
    pub fn embed(&self, vals: &mut [Complex64]) {
        let size: usize = vals.len();
        bit_reverse(vals);
        let mut len: usize = 2;
        while len <= size {
            let lenh: usize = len >> 1;
            let lenq: usize = len << 2;
            let gap: usize = self.m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx: usize = (self.rot_group[j] % lenq) * gap;
                    let u: Complex64 = vals[i + j];
                    let v: Complex64 = vals[i + j + lenh] * self.ksi_pows[idx];
                    vals[i + j] = u + v;
                    vals[i + j + lenh] = u - v;
                }
            }
            len <<= 1;
        }
    }

    /// Inverse of [Encoder::embed].
    pub fn embed_inv(&self, vals: &mut [Complex64]) {
        let size: usize = vals.len();
        let mut len: usize = size;
        while len >= 1 {
            let lenh: usize = len >> 1;
            let lenq: usize = len << 2;
            let gap: usize = self.m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx: usize = (lenq - (self.rot_group[j] % lenq)) * gap;
                    let u: Complex64 = vals[i + j] + vals[i + j + lenh];
                    let v: Complex64 = (vals[i + j] - vals[i + j + lenh]) * self.ksi_pows[idx];
                    vals[i + j] = u;
                    vals[i + j + lenh] = v;
                }
            }
            len >>= 1;
        }
        bit_reverse(vals);
        let size_inv: f64 = 1.0 / size as f64;
        vals.iter_mut().for_each(|z| *z *= size_inv);
    }
}

fn round_scaled(x: f64, scale: f64) -> Result<i64> {
    let scaled: f64 = (x * scale).round();
    if !scaled.is_finite() || scaled.abs() >= MAX_SCALED {
        return Err(CkksError::ValueOutOfRange {
            value: x,
            log_scale: scale.log2(),
        });
    }
    Ok(scaled as i64)
}

fn bit_reverse<T>(vals: &mut [T]) {
    let log_size: u32 = vals.len().log2() as u32;
    for i in 0..vals.len() {
        let j: usize = i.reverse_bits_msb(log_size);
        if i < j {
            vals.swap(i, j);
        }
    }
}
