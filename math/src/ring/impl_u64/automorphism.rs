use crate::automorphism::{AutoPerm, SIGN_BIT};
use crate::modulus::ReduceOnce;
use crate::poly::{Poly, PolyRNS};
use crate::ring::{Ring, RingRNS};
use itertools::izip;

impl Ring<u64> {
    /// Assigns a(X^gal_el) to b. Both a and b are in the coefficient domain.
    pub fn automorphism(&self, a: &Poly<u64>, perm: &AutoPerm, b: &mut Poly<u64>) {
        debug_assert!(
            a.n() == b.n(),
            "invalid inputs: a.n() = {} != b.n() = {}",
            a.n(),
            b.n()
        );
        debug_assert!(
            perm.permutation.len() == a.n(),
            "invalid perm: perm.len() = {} != a.n() = {}",
            perm.permutation.len(),
            a.n()
        );
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), perm.permutation.iter()).for_each(|(a, p)| {
            let idx: usize = p & !SIGN_BIT;
            b.0[idx] = if p & SIGN_BIT != 0 { (q - *a).reduce_once(q) } else { *a };
        });
    }
}

impl RingRNS<u64> {
    pub fn automorphism(&self, a: &PolyRNS<u64>, perm: &AutoPerm, b: &mut PolyRNS<u64>) {
        self.0
            .iter()
            .enumerate()
            .for_each(|(i, ring)| ring.automorphism(a.at(i), perm, b.at_mut(i)));
    }
}
