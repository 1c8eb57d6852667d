use crate::ciphertext::{Ciphertext, Plaintext};
use crate::context::PublicContext;
use crate::error::Result;
use math::poly::PolyRNS;
use math::ring::RingRNS;
use sampling::distributions::Distributions;
use sampling::source::Source;

impl PublicContext {
    /// Encrypts `values` at the top level and at the default scale.
    pub fn encrypt(&self, values: &[f64], source: &mut Source) -> Result<Ciphertext> {
        self.encrypt_at(values, self.params.scale(), self.params.max_level(), source)
    }

    pub fn encrypt_at(&self, values: &[f64], scale: f64, level: usize, source: &mut Source) -> Result<Ciphertext> {
        let pt: Plaintext = self.encode(values, scale, level)?;
        self.encrypt_plaintext(&pt, source)
    }

    /// Public-key encryption: (b*u + e0 + m, a*u + e1) with ternary u.
    pub fn encrypt_plaintext(&self, pt: &Plaintext, source: &mut Source) -> Result<Ciphertext> {
        let (_, mut source_xu) = source.branch();
        let (_, mut source_xe) = source.branch();

        let level: usize = pt.level();
        let ring: RingRNS<u64> = self.params.ring_q().at_level(level);
        let xe: Distributions = self.params.xe()?;

        let mut u: PolyRNS<u64> = ring.new_polyrns();
        ring.fill_dist(&mut source_xu, &self.params.xs(), &mut u);
        ring.ntt_inplace(&mut u);

        let mut c0: PolyRNS<u64> = ring.new_polyrns();
        ring.mul_coeffs(&self.pk.b, &u, &mut c0);
        let mut e0: PolyRNS<u64> = ring.new_polyrns();
        ring.fill_dist(&mut source_xe, &xe, &mut e0);
        ring.ntt_inplace(&mut e0);
        ring.add_inplace(&e0, &mut c0);
        ring.add_inplace(&pt.value, &mut c0);

        let mut c1: PolyRNS<u64> = ring.new_polyrns();
        ring.mul_coeffs(&self.pk.a, &u, &mut c1);
        let mut e1: PolyRNS<u64> = ring.new_polyrns();
        ring.fill_dist(&mut source_xe, &xe, &mut e1);
        ring.ntt_inplace(&mut e1);
        ring.add_inplace(&e1, &mut c1);

        Ok(Ciphertext {
            c0,
            c1,
            scale: pt.scale,
            fingerprint: self.fingerprint,
        })
    }
}
