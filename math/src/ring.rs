pub mod impl_u64;

use crate::dft::DFT;
use crate::modulus::prime::Prime;
use crate::modulus::WordOps;
use crate::poly::{Poly, PolyRNS};
use std::sync::Arc;

/// Z_q[X]/(X^n + 1) for a single NTT-friendly prime q.
pub struct Ring<O> {
    pub n: usize,
    pub modulus: Prime<O>,
    pub dft: Box<dyn DFT<O>>,
}

impl<O> Ring<O> {
    pub fn log_n(&self) -> usize {
        self.n().log2()
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn cyclotomic_order(&self) -> usize {
        self.n << 1
    }
}

impl Ring<u64> {
    pub fn new_poly(&self) -> Poly<u64> {
        Poly::<u64>::new(self.n())
    }
}

/// An ordered chain of rings sharing the same degree.
/// Limb i of a PolyRNS is interpreted modulo `self.0[i]`.
#[derive(Clone)]
pub struct RingRNS<O>(pub Vec<Arc<Ring<O>>>);

impl<O> RingRNS<O> {
    pub fn log_n(&self) -> usize {
        self.n().log2()
    }

    pub fn n(&self) -> usize {
        self.0[0].n()
    }

    pub fn level(&self) -> usize {
        self.0.len() - 1
    }

    /// Returns the sub-chain made of the rings 0..=level.
    pub fn at_level(&self, level: usize) -> RingRNS<O> {
        assert!(
            level < self.0.len(),
            "invalid argument level: level={} > self.level()={}",
            level,
            self.level()
        );
        RingRNS(self.0[..level + 1].to_vec())
    }

    /// Returns the sub-chain 0..=level extended with an extra ring.
    pub fn at_level_with(&self, level: usize, extra: &Arc<Ring<O>>) -> RingRNS<O> {
        let mut rings: Vec<Arc<Ring<O>>> = self.at_level(level).0;
        rings.push(extra.clone());
        RingRNS(rings)
    }
}

impl RingRNS<u64> {
    pub fn new_polyrns(&self) -> PolyRNS<u64> {
        PolyRNS::<u64>::new(self.n(), self.level())
    }

    pub fn new_poly(&self) -> Poly<u64> {
        Poly::<u64>::new(self.n())
    }

    pub fn moduli(&self) -> Vec<u64> {
        self.0.iter().map(|ring| ring.modulus.q).collect()
    }
}
