use crate::modulus::barrett::Barrett;
use crate::modulus::ONCE;
use crate::poly::{Poly, PolyRNS};
use crate::ring::RingRNS;
use crate::ring::impl_u64::ring::reduce_i64;
use itertools::izip;

impl RingRNS<u64> {
    /// Returns [q_level^-1]_{q_i} for i in 0..level.
    pub fn rescaling_constants(&self) -> Vec<Barrett<u64>> {
        let level: usize = self.level();
        let q_scale: u64 = self.0[level].modulus.q;
        self.0[..level]
            .iter()
            .map(|r| r.modulus.barrett.prepare(r.modulus.inv(q_scale % r.modulus.q)))
            .collect()
    }

    /// Assigns round(a / q[self.level()]) to b.
    ///
    /// a and b are in the NTT domain; a has self.level()+1 limbs and b has
    /// self.level() limbs. The last limb of a is centered before being
    /// subtracted, which turns the exact division into a rounding one.
    pub fn div_round_by_last_modulus_ntt(&self, a: &PolyRNS<u64>, b: &mut PolyRNS<u64>) {
        let level: usize = self.level();
        assert!(level >= 1, "cannot divide by the last modulus of a single-limb chain");
        assert!(
            a.level() >= level,
            "invalid input a: a.level()={} < self.level()={}",
            a.level(),
            level
        );
        assert!(
            b.level() + 1 >= level,
            "invalid input b: b.level()={} < self.level()-1={}",
            b.level(),
            level - 1
        );

        let last = &self.0[level];
        let mut last_coeffs: Poly<u64> = a.at(level).clone();
        last.intt_inplace(&mut last_coeffs);

        let centered: Vec<i64> = last_coeffs.0.iter().map(|x| last.center(*x)).collect();

        let rescaling_constants: Vec<Barrett<u64>> = self.rescaling_constants();
        let mut buf: Poly<u64> = self.new_poly();

        for (i, (ring, constant)) in izip!(self.0[..level].iter(), rescaling_constants.iter()).enumerate() {
            let q: u64 = ring.modulus.q;
            izip!(buf.0.iter_mut(), centered.iter()).for_each(|(x, c)| *x = reduce_i64(*c, q));
            ring.ntt_inplace(&mut buf);
            izip!(a.at(i).0.iter(), buf.0.iter(), b.at_mut(i).0.iter_mut()).for_each(|(a, t, b)| {
                *b = ring
                    .modulus
                    .barrett
                    .mul_external::<ONCE>(*constant, *a + q - *t);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::prime_generation::ntt_friendly_primes;
    use num_bigint::BigInt;

    #[test]
    fn div_round_by_last_modulus_ntt() {
        let n: usize = 32;
        let moduli: Vec<u64> = ntt_friendly_primes(&[55, 45, 40], 2 * n as u64).unwrap();
        let ring_rns: RingRNS<u64> = RingRNS::new(n, &moduli);
        let q_last: i64 = moduli[2] as i64;

        let values: Vec<i64> = (0..n as i64)
            .map(|i| (i - 16) * q_last * 3 + (i * 7919 - 100_000))
            .collect();

        let mut a: PolyRNS<u64> = ring_rns.new_polyrns();
        ring_rns.from_i64(&values, &mut a);
        ring_rns.ntt_inplace(&mut a);

        let mut b: PolyRNS<u64> = ring_rns.at_level(1).new_polyrns();
        ring_rns.div_round_by_last_modulus_ntt(&a, &mut b);
        ring_rns.at_level(1).intt_inplace(&mut b);

        let mut coeffs: Vec<BigInt> = vec![BigInt::from(0u64); n];
        ring_rns.at_level(1).to_bigint_inplace(&b, &mut coeffs);

        values.iter().zip(coeffs.iter()).for_each(|(v, c)| {
            let want: i64 = (*v as f64 / q_last as f64).round() as i64;
            assert_eq!(*c, BigInt::from(want), "v={}", v);
        });
    }
}
