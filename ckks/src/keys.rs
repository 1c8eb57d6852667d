use crate::error::Result;
use crate::parameters::Parameters;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use math::automorphism::{AutoPermMap, galois_element};
use math::poly::PolyRNS;
use math::ring::RingRNS;
use math::serialization::{MAX_DEGREE, MAX_LIMBS, ReaderFrom, WriterTo};
use sampling::distributions::Distributions;
use sampling::source::Source;
use std::io::{Error, ErrorKind, Read, Write};
use utils::map::Map;

/// Ternary secret. `value` holds s in the NTT domain over q_0, ..., q_L, P.
#[derive(Clone, Debug, PartialEq)]
pub struct SecretKey {
    pub(crate) coeffs: Vec<i64>,
    pub(crate) value: PolyRNS<u64>,
}

impl SecretKey {
    pub fn generate(params: &Parameters, source: &mut Source) -> Self {
        let mut coeffs: Vec<i64> = vec![0i64; params.n()];
        params.xs().fill(source, &mut coeffs);
        Self::from_coeffs(params, coeffs)
    }

    pub(crate) fn from_coeffs(params: &Parameters, coeffs: Vec<i64>) -> Self {
        let ring_qp: RingRNS<u64> = params.ring_qp();
        let mut value: PolyRNS<u64> = ring_qp.new_polyrns();
        ring_qp.from_i64(&coeffs, &mut value);
        ring_qp.ntt_inplace(&mut value);
        Self { coeffs, value }
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self.coeffs.len() as u64)?;
        for c in self.coeffs.iter() {
            writer.write_i8(*c as i8)?;
        }
        Ok(())
    }

    pub(crate) fn read_from<R: Read>(params: &Parameters, reader: &mut R) -> std::io::Result<Self> {
        let n: usize = reader.read_u64::<LittleEndian>()? as usize;
        if n != params.n() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("secret key degree {} != N={}", n, params.n()),
            ));
        }
        let mut raw: Vec<i8> = vec![0i8; n];
        reader.read_i8_into(&mut raw)?;
        if raw.iter().any(|c| !(-1..=1).contains(c)) {
            return Err(Error::new(ErrorKind::InvalidData, "secret key is not ternary"));
        }
        Ok(Self::from_coeffs(params, raw.iter().map(|c| *c as i64).collect()))
    }
}

/// Encryption of zero under the secret key: b = -a*s + e over q_0, ..., q_L.
#[derive(Clone, Debug, PartialEq)]
pub struct PublicKey {
    pub(crate) b: PolyRNS<u64>,
    pub(crate) a: PolyRNS<u64>,
}

impl PublicKey {
    pub fn generate(params: &Parameters, sk: &SecretKey, source: &mut Source) -> Result<Self> {
        let (_, mut source_xa) = source.branch();
        let (_, mut source_xe) = source.branch();

        let ring_q: &RingRNS<u64> = params.ring_q();
        let xe: Distributions = params.xe()?;

        let mut a: PolyRNS<u64> = ring_q.new_polyrns();
        ring_q.fill_uniform(&mut source_xa, &mut a);

        let mut b: PolyRNS<u64> = ring_q.new_polyrns();
        ring_q.mul_coeffs(&a, &sk.value, &mut b);
        ring_q.neg_inplace(&mut b);

        let mut e: PolyRNS<u64> = ring_q.new_polyrns();
        ring_q.fill_dist(&mut source_xe, &xe, &mut e);
        ring_q.ntt_inplace(&mut e);
        ring_q.add_inplace(&e, &mut b);

        Ok(Self { b, a })
    }
}

impl WriterTo for PublicKey {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.b.write_to(writer)?;
        self.a.write_to(writer)
    }
}

impl ReaderFrom for PublicKey {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        self.b.read_from(reader)?;
        self.a.read_from(reader)?;
        if self.b.level() != self.a.level() || self.b.n() != self.a.n() {
            return Err(Error::new(ErrorKind::InvalidData, "public key components differ in shape"));
        }
        Ok(())
    }
}

/// Hybrid switching key from s_in to s_out with one digit per data prime.
///
/// Digit j encrypts P * s_in restricted to the limb of q_j:
/// b_j = -a_j * s_out + e_j + [j == i] * P * s_in mod q_i, over q_0, ..., q_L, P.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SwitchingKey {
    pub(crate) b: Vec<PolyRNS<u64>>,
    pub(crate) a: Vec<PolyRNS<u64>>,
}

impl SwitchingKey {
    /// `sk_in` is given in the NTT domain over q_0, ..., q_L, P.
    pub fn generate(
        params: &Parameters,
        sk_in: &PolyRNS<u64>,
        sk_out: &SecretKey,
        source: &mut Source,
    ) -> Result<Self> {
        let (_, mut source_xa) = source.branch();
        let (_, mut source_xe) = source.branch();

        let ring_qp: RingRNS<u64> = params.ring_qp();
        let xe: Distributions = params.xe()?;
        let p: u64 = params.p();
        let digits: usize = params.max_level() + 1;

        let mut b: Vec<PolyRNS<u64>> = Vec::with_capacity(digits);
        let mut a: Vec<PolyRNS<u64>> = Vec::with_capacity(digits);

        for j in 0..digits {
            let mut a_j: PolyRNS<u64> = ring_qp.new_polyrns();
            ring_qp.fill_uniform(&mut source_xa, &mut a_j);

            let mut b_j: PolyRNS<u64> = ring_qp.new_polyrns();
            ring_qp.mul_coeffs(&a_j, &sk_out.value, &mut b_j);
            ring_qp.neg_inplace(&mut b_j);

            let mut e_j: PolyRNS<u64> = ring_qp.new_polyrns();
            ring_qp.fill_dist(&mut source_xe, &xe, &mut e_j);
            ring_qp.ntt_inplace(&mut e_j);
            ring_qp.add_inplace(&e_j, &mut b_j);

            let ring_j = &ring_qp.0[j];
            let mut p_s_in = sk_in.at(j).clone();
            ring_j.mul_scalar_inplace(p % ring_j.q(), &mut p_s_in);
            ring_j.add_inplace(&p_s_in, b_j.at_mut(j));

            b.push(b_j);
            a.push(a_j);
        }

        Ok(Self { b, a })
    }

    pub fn digits(&self) -> usize {
        self.b.len()
    }
}

impl WriterTo for SwitchingKey {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self.digits() as u64)?;
        for (b, a) in self.b.iter().zip(self.a.iter()) {
            b.write_to(writer)?;
            a.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for SwitchingKey {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        let digits: usize = reader.read_u64::<LittleEndian>()? as usize;
        if digits == 0 || digits > MAX_LIMBS {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid number of digits={}", digits),
            ));
        }
        self.b.clear();
        self.a.clear();
        for _ in 0..digits {
            let mut b: PolyRNS<u64> = PolyRNS::default();
            let mut a: PolyRNS<u64> = PolyRNS::default();
            b.read_from(reader)?;
            a.read_from(reader)?;
            self.b.push(b);
            self.a.push(a);
        }
        Ok(())
    }
}

/// Switching keys from s(X^g) to s(X), indexed by Galois element g.
#[derive(Clone, Debug, Default)]
pub struct GaloisKeys(pub(crate) Map<usize, SwitchingKey>);

impl GaloisKeys {
    /// Generates one key per left rotation in `steps` and caches the
    /// matching permutations in `perms`.
    pub fn generate(
        params: &Parameters,
        sk: &SecretKey,
        steps: &[i64],
        perms: &mut AutoPermMap,
        source: &mut Source,
    ) -> Result<Self> {
        let n: usize = params.n();
        let ring_qp: RingRNS<u64> = params.ring_qp();

        let mut s: PolyRNS<u64> = ring_qp.new_polyrns();
        ring_qp.from_i64(&sk.coeffs, &mut s);

        let mut keys: Map<usize, SwitchingKey> = Map::new();
        for step in steps {
            let gal_el: usize = galois_element(n, *step);
            if gal_el == 1 || keys.contains_key(&gal_el) {
                continue;
            }
            let mut s_rot: PolyRNS<u64> = ring_qp.new_polyrns();
            ring_qp.automorphism(&s, perms.generate(n, gal_el), &mut s_rot);
            ring_qp.ntt_inplace(&mut s_rot);
            keys.insert(gal_el, SwitchingKey::generate(params, &s_rot, sk, source)?);
        }
        Ok(Self(keys))
    }

    pub fn get(&self, gal_el: usize) -> Option<&SwitchingKey> {
        self.0.get(&gal_el)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn gal_els(&self) -> Vec<usize> {
        self.0.sorted_keys().into_iter().copied().collect()
    }
}

impl WriterTo for GaloisKeys {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let gal_els: Vec<usize> = self.gal_els();
        writer.write_u64::<LittleEndian>(gal_els.len() as u64)?;
        for gal_el in gal_els {
            writer.write_u64::<LittleEndian>(gal_el as u64)?;
            if let Some(key) = self.get(gal_el) {
                key.write_to(writer)?;
            }
        }
        Ok(())
    }
}

impl ReaderFrom for GaloisKeys {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        let count: usize = reader.read_u64::<LittleEndian>()? as usize;
        if count > MAX_LIMBS {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("invalid number of galois keys={}", count),
            ));
        }
        let mut keys: Map<usize, SwitchingKey> = Map::new();
        for _ in 0..count {
            let gal_el: usize = reader.read_u64::<LittleEndian>()? as usize;
            if gal_el & 1 == 0 || gal_el >= 2 * MAX_DEGREE {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("invalid galois element={}", gal_el),
                ));
            }
            let mut key: SwitchingKey = SwitchingKey::default();
            key.read_from(reader)?;
            keys.insert(gal_el, key);
        }
        self.0 = keys;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{ParametersLiteral, SecurityLevel};
    use num_bigint::BigInt;
    use num_traits::Signed;

    fn params() -> Parameters {
        Parameters::new(&ParametersLiteral {
            log_n: 5,
            log_moduli: vec![50, 30, 30, 50],
            log_scale: 30,
            sigma: 3.2,
            security: SecurityLevel::None,
            sum_width: Some(4),
        })
        .unwrap()
    }

    #[test]
    fn secret_key_is_ternary() {
        let params: Parameters = params();
        let sk: SecretKey = SecretKey::generate(&params, &mut Source::new([0u8; 32]));
        assert_eq!(sk.coeffs.len(), params.n());
        assert!(sk.coeffs.iter().all(|c| (-1..=1).contains(c)));
        assert_eq!(sk.value.level(), params.max_level() + 1);
    }

    #[test]
    fn public_key_is_small_under_secret() {
        let params: Parameters = params();
        let mut source: Source = Source::new([1u8; 32]);
        let sk: SecretKey = SecretKey::generate(&params, &mut source);
        let pk: PublicKey = PublicKey::generate(&params, &sk, &mut source).unwrap();

        // b + a*s = e
        let ring_q: &RingRNS<u64> = params.ring_q();
        let mut e: PolyRNS<u64> = ring_q.new_polyrns();
        ring_q.mul_coeffs(&pk.a, &sk.value, &mut e);
        ring_q.add_inplace(&pk.b, &mut e);
        ring_q.intt_inplace(&mut e);

        let mut coeffs: Vec<BigInt> = vec![BigInt::from(0); params.n()];
        ring_q.to_bigint_inplace(&e, &mut coeffs);
        let bound: BigInt = BigInt::from((6.0 * params.sigma()).ceil() as i64);
        assert!(coeffs.iter().all(|c| c.abs() <= bound));
    }

    #[test]
    fn secret_key_serialization() {
        let params: Parameters = params();
        let sk: SecretKey = SecretKey::generate(&params, &mut Source::new([2u8; 32]));
        let mut buffer: Vec<u8> = Vec::new();
        sk.write_to(&mut buffer).unwrap();
        let mut reader: &[u8] = &buffer;
        let receiver: SecretKey = SecretKey::read_from(&params, &mut reader).unwrap();
        assert_eq!(sk, receiver, "Deserialized object does not match the original");
    }

    #[test]
    fn galois_keys_skip_identity() {
        let params: Parameters = params();
        let mut source: Source = Source::new([3u8; 32]);
        let sk: SecretKey = SecretKey::generate(&params, &mut source);
        let mut perms: AutoPermMap = AutoPermMap::new();
        let gks: GaloisKeys = GaloisKeys::generate(&params, &sk, &[0, 1, 2, 2], &mut perms, &mut source).unwrap();
        assert_eq!(gks.len(), 2);
        assert_eq!(perms.len(), 2);
        gks.gal_els().iter().for_each(|g| {
            assert_eq!(gks.get(*g).unwrap().digits(), params.max_level() + 1);
        });

        let mut buffer: Vec<u8> = Vec::new();
        gks.write_to(&mut buffer).unwrap();
        let mut receiver: GaloisKeys = GaloisKeys::default();
        let mut reader: &[u8] = &buffer;
        receiver.read_from(&mut reader).unwrap();
        assert_eq!(receiver.gal_els(), gks.gal_els());
    }
}
