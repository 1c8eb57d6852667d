use crate::modulus::WordOps;
use utils::map::Map;

/// Generator of the slot-rotation subgroup of (Z/2nZ)^*.
pub const GALOIS_GENERATOR: usize = 5;

/// Returns the Galois element 5^steps mod 2n implementing a left rotation of
/// the n/2 CKKS slots by `steps` (negative steps rotate right).
pub fn galois_element(n: usize, steps: i64) -> usize {
    let cyclotomic_order: usize = n << 1;
    let k: u64 = steps.rem_euclid((n >> 1) as i64) as u64;
    let mut result: usize = 1;
    let mut base: usize = GALOIS_GENERATOR;
    let mut e: u64 = k;
    while e > 0 {
        if e & 1 == 1 {
            result = (result * base) & (cyclotomic_order - 1);
        }
        base = (base * base) & (cyclotomic_order - 1);
        e >>= 1;
    }
    result
}

/// Lookup table for X^i -> X^(i * gal_el mod 2n) in the coefficient domain.
/// The most significant bit of each entry flags a sign flip (X^n = -1).
#[derive(Clone, Debug)]
pub struct AutoPerm {
    pub gal_el: usize,
    pub permutation: Vec<usize>,
}

pub const SIGN_BIT: usize = 1 << (usize::BITS - 1);

impl AutoPerm {
    /// Panics if n is not a power of two or if gal_el is even.
    pub fn new(n: usize, gal_el: usize) -> Self {
        assert!(n & (n - 1) == 0, "invalid n={}: not a power-of-two", n);
        assert!(
            gal_el & 1 == 1,
            "invalid gal_el={}: not coprime with 2n={}",
            gal_el,
            n << 1
        );

        let log_n: usize = n.log2();
        let mask: usize = n - 1;
        let permutation: Vec<usize> = (0..n)
            .map(|i| {
                let gal_el_i: usize = (i * gal_el) & ((n << 1) - 1);
                let sign: usize = (gal_el_i >> log_n) & 1;
                (gal_el_i & mask) | (sign << (usize::BITS - 1))
            })
            .collect();

        Self {
            gal_el,
            permutation,
        }
    }
}

/// Permutations cached by Galois element.
#[derive(Clone, Debug, Default)]
pub struct AutoPermMap(Map<usize, AutoPerm>);

impl AutoPermMap {
    pub fn new() -> Self {
        Self(Map::<usize, AutoPerm>::new())
    }

    pub fn generate(&mut self, n: usize, gal_el: usize) -> &AutoPerm {
        self.0.get_or_insert_with(gal_el, || AutoPerm::new(n, gal_el))
    }

    pub fn get(&self, gal_el: &usize) -> Option<&AutoPerm> {
        self.0.get(gal_el)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn galois_elements() {
        let n: usize = 16;
        assert_eq!(galois_element(n, 0), 1);
        assert_eq!(galois_element(n, 1), 5);
        assert_eq!(galois_element(n, 2), 25);
        // 5^8 = 1 mod 32, so a right rotation by 1 is a left rotation by 7.
        assert_eq!(galois_element(n, -1), galois_element(n, 7));
        assert_eq!(galois_element(n, 8), 1);
    }

    #[test]
    fn permutation_is_bijective() {
        let n: usize = 32;
        let perm: AutoPerm = AutoPerm::new(n, galois_element(n, 3));
        let mut seen: Vec<bool> = vec![false; n];
        perm.permutation
            .iter()
            .for_each(|p| seen[p & !SIGN_BIT] = true);
        assert!(seen.iter().all(|s| *s));
    }
}
