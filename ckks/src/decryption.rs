use crate::ciphertext::Ciphertext;
use crate::context::EncryptionContext;
use crate::error::Result;
use math::poly::PolyRNS;
use math::ring::RingRNS;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

impl EncryptionContext {
    /// Decrypts and decodes every slot of `ct`.
    ///
    /// Fails with [crate::error::CkksError::ContextMismatch] if `ct` was not
    /// produced under this context.
    pub fn decrypt(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        let coeffs: Vec<f64> = self.decrypt_coeffs(ct)?;
        Ok(self.public().encoder().decode(&coeffs))
    }

    /// Returns the coefficients of c0 + c1*s divided by the scale of `ct`.
    pub fn decrypt_coeffs(&self, ct: &Ciphertext) -> Result<Vec<f64>> {
        self.public().check_ciphertext(ct)?;

        let ring: RingRNS<u64> = self.parameters().ring_q().at_level(ct.level());
        let mut m: PolyRNS<u64> = ring.new_polyrns();
        ring.mul_coeffs(&ct.c1, &self.secret_key().value, &mut m);
        ring.add_inplace(&ct.c0, &mut m);
        ring.intt_inplace(&mut m);

        let mut coeffs: Vec<BigInt> = vec![BigInt::from(0); ring.n()];
        ring.to_bigint_inplace(&m, &mut coeffs);

        Ok(coeffs
            .iter()
            .map(|c| c.to_f64().unwrap_or(f64::NAN) / ct.scale)
            .collect())
    }
}
