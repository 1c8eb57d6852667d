use crate::poly::PolyRNS;
use crate::ring::{Ring, RingRNS};
use itertools::izip;
use num_bigint::BigInt;
use std::sync::Arc;

impl RingRNS<u64> {
    pub fn new(n: usize, moduli: &[u64]) -> Self {
        assert!(!moduli.is_empty(), "moduli cannot be empty");
        RingRNS(moduli.iter().map(|q| Arc::new(Ring::new(n, *q))).collect())
    }

    /// Returns the product of all moduli in the chain.
    pub fn modulus(&self) -> BigInt {
        self.0
            .iter()
            .fold(BigInt::from(1u64), |acc, r| acc * BigInt::from(r.modulus.q))
    }

    /// Maps signed integers to every limb.
    pub fn from_i64(&self, values: &[i64], a: &mut PolyRNS<u64>) {
        assert!(
            self.level() <= a.level(),
            "invalid level: self.level()={} > a.level()={}",
            self.level(),
            a.level()
        );
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.from_i64(values, a.at_mut(i)));
    }

    /// Reconstructs the centered integer coefficients of `a` (coefficient domain)
    /// by CRT over the limbs 0..=self.level().
    pub fn to_bigint_inplace(&self, a: &PolyRNS<u64>, coeffs: &mut [BigInt]) {
        let level: usize = self.level();
        assert!(
            level <= a.level(),
            "invalid level: self.level()={} > a.level()={}",
            level,
            a.level()
        );
        assert!(
            coeffs.len() <= a.n(),
            "invalid coeffs: coeffs.len()={} > a.n()={}",
            coeffs.len(),
            a.n()
        );

        let q_big: BigInt = self.modulus();
        let q_big_half: BigInt = &q_big >> 1;

        // [(Q/q_i)^-1]_{q_i} and Q/q_i for each limb.
        let crt: Vec<(u64, BigInt)> = self
            .0
            .iter()
            .enumerate()
            .map(|(i, ring)| {
                let prime = &ring.modulus;
                let q_hat_mod_qi: u64 = self
                    .0
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .fold(1u64, |acc, (_, other)| prime.barrett.mul(acc, other.modulus.q % prime.q));
                (prime.inv(q_hat_mod_qi), &q_big / BigInt::from(prime.q))
            })
            .collect();

        coeffs.iter_mut().enumerate().for_each(|(j, coeff)| {
            let mut acc: BigInt = BigInt::from(0u64);
            izip!(self.0.iter(), crt.iter()).enumerate().for_each(|(i, (ring, (q_hat_inv, q_hat)))| {
                let t: u64 = ring.modulus.barrett.mul(a.at(i).0[j], *q_hat_inv);
                acc += q_hat * BigInt::from(t);
            });
            acc %= &q_big;
            if acc > q_big_half {
                acc -= &q_big;
            }
            *coeff = acc;
        });
    }
}

impl RingRNS<u64> {
    pub fn ntt_inplace(&self, a: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.ntt_inplace(a.at_mut(i)));
    }

    pub fn intt_inplace(&self, a: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.intt_inplace(a.at_mut(i)));
    }

    /// Assigns a + b to c over the limbs 0..=self.level().
    pub fn add(&self, a: &PolyRNS<u64>, b: &PolyRNS<u64>, c: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.add(a.at(i), b.at(i), c.at_mut(i)));
    }

    /// Assigns a + b to b.
    pub fn add_inplace(&self, a: &PolyRNS<u64>, b: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.add_inplace(a.at(i), b.at_mut(i)));
    }

    /// Assigns a - b to c.
    pub fn sub(&self, a: &PolyRNS<u64>, b: &PolyRNS<u64>, c: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.sub(a.at(i), b.at(i), c.at_mut(i)));
    }

    /// Assigns b - a to b.
    pub fn sub_inplace(&self, a: &PolyRNS<u64>, b: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.sub_inplace(a.at(i), b.at_mut(i)));
    }

    pub fn neg_inplace(&self, a: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.neg_inplace(a.at_mut(i)));
    }

    /// Assigns a * b to c, coefficient-wise.
    pub fn mul_coeffs(&self, a: &PolyRNS<u64>, b: &PolyRNS<u64>, c: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.mul_coeffs(a.at(i), b.at(i), c.at_mut(i)));
    }

    /// Assigns a * b to b, coefficient-wise.
    pub fn mul_coeffs_inplace(&self, a: &PolyRNS<u64>, b: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.mul_coeffs_inplace(a.at(i), b.at_mut(i)));
    }

    /// Assigns c + a * b to c, coefficient-wise.
    pub fn mul_coeffs_then_add(&self, a: &PolyRNS<u64>, b: &PolyRNS<u64>, c: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.mul_coeffs_then_add(a.at(i), b.at(i), c.at_mut(i)));
    }
}
