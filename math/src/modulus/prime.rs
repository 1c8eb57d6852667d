use crate::modulus::barrett::BarrettPrecomp;
use primality_test::is_prime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prime<O> {
    pub q: O,
    /// Euler's totient of q, i.e. q-1.
    pub phi: O,
    pub barrett: BarrettPrecomp<O>,
}

impl Prime<u64> {
    /// Returns a new instance of Prime<u64>.
    /// Panics if q is not a prime > 2 or if 4q would overflow u64.
    pub fn new(q: u64) -> Self {
        assert!(q > 2 && is_prime(q), "invalid modulus q={}: not an odd prime", q);
        Self::new_unchecked(q)
    }

    /// Returns a new instance of Prime<u64>.
    /// Does not check if q is a prime > 2.
    pub fn new_unchecked(q: u64) -> Self {
        assert!(q.next_power_of_two().ilog2() <= 61);
        Self {
            q,
            phi: q - 1,
            barrett: BarrettPrecomp::new(q),
        }
    }

    pub fn q(&self) -> u64 {
        self.q
    }

    /// Returns x^exponent mod q.
    #[inline(always)]
    pub fn pow(&self, x: u64, exponent: u64) -> u64 {
        let mut y: u64 = 1;
        let mut x: u64 = x % self.q;
        let mut i: u64 = exponent;
        while i > 0 {
            if i & 1 == 1 {
                y = self.barrett.mul(y, x);
            }
            x = self.barrett.mul(x, x);
            i >>= 1;
        }
        y
    }

    /// Returns x^-1 mod q.
    /// User must ensure that x is not divisible by q.
    #[inline(always)]
    pub fn inv(&self, x: u64) -> u64 {
        debug_assert!(x % self.q != 0, "invalid argument x={}: not invertible mod q={}", x, self.q);
        self.pow(x, self.phi - 1)
    }

    /// Returns a primitive nth root of unity mod q.
    /// nth_root must be a power of two dividing q-1.
    pub fn primitive_nth_root(&self, nth_root: u64) -> u64 {
        assert!(
            nth_root & (nth_root - 1) == 0,
            "invalid argument nth_root={}: not a power of two",
            nth_root
        );
        assert!(
            self.phi % nth_root == 0,
            "invalid prime: q = {} % nth_root = {} = {} != 1",
            self.q,
            nth_root,
            self.q % nth_root
        );

        let exponent: u64 = self.phi / nth_root;
        let half: u64 = nth_root >> 1;

        // For a power-of-two order it is enough that g^(nth_root/2) = -1.
        let mut candidate: u64 = 2;
        loop {
            let psi: u64 = self.pow(candidate, exponent);
            if self.pow(psi, half) == self.q - 1 {
                debug_assert!(self.pow(psi, nth_root) == 1);
                return psi;
            }
            candidate += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_root() {
        let prime: Prime<u64> = Prime::new(0x1fffffffffe00001);
        let nth_root: u64 = 1 << 12;
        let psi: u64 = prime.primitive_nth_root(nth_root);
        assert_eq!(prime.pow(psi, nth_root), 1);
        assert_eq!(prime.pow(psi, nth_root >> 1), prime.q - 1);
        assert_eq!(prime.barrett.mul(psi, prime.inv(psi)), 1);
    }
}
