use crate::dft::ntt::Table;
use crate::modulus::barrett::Barrett;
use crate::modulus::prime::Prime;
use crate::modulus::ReduceOnce;
use crate::modulus::ONCE;
use crate::poly::Poly;
use crate::ring::Ring;
use itertools::izip;

impl Ring<u64> {
    pub fn new(n: usize, q: u64) -> Self {
        assert!(
            n.is_power_of_two() && n >= 2,
            "invalid n={}: not a power of two >= 2",
            n
        );
        let prime: Prime<u64> = Prime::<u64>::new(q);
        Self {
            n,
            modulus: prime,
            dft: Box::new(Table::<u64>::new(prime, (2 * n) as u64)),
        }
    }

    pub fn q(&self) -> u64 {
        self.modulus.q
    }

    /// Maps signed integers to their residues modulo q.
    pub fn from_i64(&self, values: &[i64], a: &mut Poly<u64>) {
        debug_assert!(values.len() == a.n(), "values.len()={} != a.n()={}", values.len(), a.n());
        let q: u64 = self.modulus.q;
        izip!(values.iter(), a.0.iter_mut()).for_each(|(v, a)| *a = reduce_i64(*v, q));
    }

    /// Maps a residue in [0, q) to its centered representative in (-q/2, q/2].
    #[inline(always)]
    pub fn center(&self, x: u64) -> i64 {
        let q: u64 = self.modulus.q;
        if x > q >> 1 { -((q - x) as i64) } else { x as i64 }
    }
}

#[inline(always)]
pub(crate) fn reduce_i64(v: i64, q: u64) -> u64 {
    if v < 0 {
        (q - (v.unsigned_abs() % q)).reduce_once(q)
    } else {
        v as u64 % q
    }
}

impl Ring<u64> {
    pub fn ntt_inplace(&self, poly: &mut Poly<u64>) {
        self.dft.forward_inplace(&mut poly.0)
    }

    pub fn intt_inplace(&self, poly: &mut Poly<u64>) {
        self.dft.backward_inplace(&mut poly.0)
    }

    pub fn ntt(&self, poly_in: &Poly<u64>, poly_out: &mut Poly<u64>) {
        poly_out.0.copy_from_slice(&poly_in.0);
        self.dft.forward_inplace(&mut poly_out.0)
    }

    pub fn intt(&self, poly_in: &Poly<u64>, poly_out: &mut Poly<u64>) {
        poly_out.0.copy_from_slice(&poly_in.0);
        self.dft.backward_inplace(&mut poly_out.0)
    }
}

impl Ring<u64> {
    /// Assigns a + b to c.
    #[inline(always)]
    pub fn add(&self, a: &Poly<u64>, b: &Poly<u64>, c: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), b.0.iter(), c.0.iter_mut()).for_each(|(a, b, c)| *c = (*a + *b).reduce_once(q));
    }

    /// Assigns a + b to b.
    #[inline(always)]
    pub fn add_inplace(&self, a: &Poly<u64>, b: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), b.0.iter_mut()).for_each(|(a, b)| *b = (*a + *b).reduce_once(q));
    }

    /// Assigns a - b to c.
    #[inline(always)]
    pub fn sub(&self, a: &Poly<u64>, b: &Poly<u64>, c: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), b.0.iter(), c.0.iter_mut()).for_each(|(a, b, c)| *c = (*a + q - *b).reduce_once(q));
    }

    /// Assigns b - a to b.
    #[inline(always)]
    pub fn sub_inplace(&self, a: &Poly<u64>, b: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), b.0.iter_mut()).for_each(|(a, b)| *b = (*b + q - *a).reduce_once(q));
    }

    /// Assigns -a to a.
    #[inline(always)]
    pub fn neg_inplace(&self, a: &mut Poly<u64>) {
        let q: u64 = self.modulus.q;
        a.0.iter_mut().for_each(|a| *a = (q - *a).reduce_once(q));
    }

    /// Assigns a * b to c, coefficient-wise (a product in the NTT domain).
    #[inline(always)]
    pub fn mul_coeffs(&self, a: &Poly<u64>, b: &Poly<u64>, c: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        izip!(a.0.iter(), b.0.iter(), c.0.iter_mut()).for_each(|(a, b, c)| *c = self.modulus.barrett.mul(*a, *b));
    }

    /// Assigns a * b to b, coefficient-wise.
    #[inline(always)]
    pub fn mul_coeffs_inplace(&self, a: &Poly<u64>, b: &mut Poly<u64>) {
        debug_assert!(a.n() == self.n(), "a.n()={} != n={}", a.n(), self.n());
        debug_assert!(b.n() == self.n(), "b.n()={} != n={}", b.n(), self.n());
        izip!(a.0.iter(), b.0.iter_mut()).for_each(|(a, b)| *b = self.modulus.barrett.mul(*a, *b));
    }

    /// Assigns c + a * b to c, coefficient-wise.
    #[inline(always)]
    pub fn mul_coeffs_then_add(&self, a: &Poly<u64>, b: &Poly<u64>, c: &mut Poly<u64>) {
        let q: u64 = self.modulus.q;
        izip!(a.0.iter(), b.0.iter(), c.0.iter_mut())
            .for_each(|(a, b, c)| *c = (*c + self.modulus.barrett.mul(*a, *b)).reduce_once(q));
    }

    /// Assigns a * scalar to a.
    #[inline(always)]
    pub fn mul_scalar_inplace(&self, scalar: u64, a: &mut Poly<u64>) {
        let scalar: Barrett<u64> = self.modulus.barrett.prepare(scalar % self.modulus.q);
        a.0.iter_mut()
            .for_each(|a| self.modulus.barrett.mul_external_assign::<ONCE>(scalar, a));
    }
}
