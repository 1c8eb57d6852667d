use crate::error::{CkksError, Result};
use math::modulus::prime_generation::ntt_friendly_primes;
use math::ring::{Ring, RingRNS};
use sampling::distributions::Distributions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_SIGMA: f64 = 3.2;

/// Error samples are rejected outside [-DEFAULT_BOUND_FACTOR*sigma, DEFAULT_BOUND_FACTOR*sigma].
pub const DEFAULT_BOUND_FACTOR: f64 = 6.0;

/// Probability for a secret (or ephemeral) coefficient to be non-zero.
pub const TERNARY_DENSITY: f64 = 2.0 / 3.0;

pub const MIN_LOG_N: usize = 4;
pub const MAX_LOG_N: usize = 15;
pub const MIN_PRIME_BITS: u32 = 20;
pub const MAX_PRIME_BITS: u32 = 60;
pub const MIN_LOG_SCALE: u32 = 10;
pub const MAX_LOG_SCALE: u32 = 50;

/// Bits of precision the first prime must keep above the scale.
pub const MIN_Q0_HEADROOM: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// 128-bit classical security for a ternary secret (HE standard).
    Tc128,
    /// No bound on the modulus: toy parameters for tests and benches.
    None,
}

impl SecurityLevel {
    /// Largest total modulus size (data primes and special prime) allowed for
    /// degree 2^log_n, or None if the degree is too small to be secure.
    pub fn max_log_qp(&self, log_n: usize) -> Option<u32> {
        match self {
            SecurityLevel::None => Some(u32::MAX),
            SecurityLevel::Tc128 => match log_n {
                10 => Some(27),
                11 => Some(54),
                12 => Some(109),
                13 => Some(218),
                14 => Some(438),
                15 => Some(881),
                _ => None,
            },
        }
    }
}

/// User facing description of a parameter set. The last entry of
/// `log_moduli` is the special prime used by key switching; the others form
/// the data chain q_0, ..., q_L.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParametersLiteral {
    pub log_n: usize,
    pub log_moduli: Vec<u32>,
    pub log_scale: u32,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_security")]
    pub security: SecurityLevel,
    /// Widest slot sum the rotation keys must support. Defaults to all slots.
    #[serde(default)]
    pub sum_width: Option<usize>,
}

fn default_sigma() -> f64 {
    DEFAULT_SIGMA
}

fn default_security() -> SecurityLevel {
    SecurityLevel::Tc128
}

impl Default for ParametersLiteral {
    fn default() -> Self {
        Self {
            log_n: 13,
            log_moduli: vec![60, 40, 40, 60],
            log_scale: 40,
            sigma: DEFAULT_SIGMA,
            security: SecurityLevel::Tc128,
            sum_width: None,
        }
    }
}

impl ParametersLiteral {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(CkksError::InvalidParameters(msg)) };

        if !(MIN_LOG_N..=MAX_LOG_N).contains(&self.log_n) {
            return invalid(format!(
                "log_n={} outside [{}, {}]",
                self.log_n, MIN_LOG_N, MAX_LOG_N
            ));
        }

        if self.log_moduli.len() < 3 {
            return invalid(format!(
                "log_moduli={:?}: need at least two data primes and one special prime",
                self.log_moduli
            ));
        }

        if let Some(bits) = self
            .log_moduli
            .iter()
            .find(|b| !(MIN_PRIME_BITS..=MAX_PRIME_BITS).contains(*b))
        {
            return invalid(format!(
                "prime size {} bits outside [{}, {}]",
                bits, MIN_PRIME_BITS, MAX_PRIME_BITS
            ));
        }

        if !(MIN_LOG_SCALE..=MAX_LOG_SCALE).contains(&self.log_scale) {
            return invalid(format!(
                "log_scale={} outside [{}, {}]",
                self.log_scale, MIN_LOG_SCALE, MAX_LOG_SCALE
            ));
        }

        if self.log_moduli[0] < self.log_scale + MIN_Q0_HEADROOM {
            return invalid(format!(
                "q0 has {} bits but log_scale={} requires at least {}",
                self.log_moduli[0],
                self.log_scale,
                self.log_scale + MIN_Q0_HEADROOM
            ));
        }

        let log_p: u32 = self.log_moduli[self.log_moduli.len() - 1];
        let log_q_max: u32 = self.log_moduli[..self.log_moduli.len() - 1]
            .iter()
            .copied()
            .max()
            .unwrap_or(0);
        if log_p < log_q_max {
            return invalid(format!(
                "special prime has {} bits but the largest data prime has {}",
                log_p, log_q_max
            ));
        }

        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return invalid(format!("sigma={} must be finite and positive", self.sigma));
        }

        let log_qp: u32 = self.log_qp();
        match self.security.max_log_qp(self.log_n) {
            Some(max) if log_qp <= max => {}
            Some(max) => {
                return invalid(format!(
                    "log(QP)={} exceeds {} bits allowed for 128-bit security at N=2^{}",
                    log_qp, max, self.log_n
                ));
            }
            None => {
                return invalid(format!(
                    "N=2^{} is too small for 128-bit security",
                    self.log_n
                ));
            }
        }

        if let Some(width) = self.sum_width {
            let slots: usize = 1 << (self.log_n - 1);
            if width == 0 || width > slots {
                return invalid(format!("sum_width={} outside [1, {}]", width, slots));
            }
        }

        Ok(())
    }

    pub fn log_qp(&self) -> u32 {
        self.log_moduli.iter().sum()
    }
}

/// Validated parameters with their generated primes and rings.
#[derive(Clone)]
pub struct Parameters {
    literal: ParametersLiteral,
    ring_q: RingRNS<u64>,
    ring_p: Arc<Ring<u64>>,
}

impl Parameters {
    pub fn new(literal: &ParametersLiteral) -> Result<Self> {
        literal.validate()?;

        if literal.security == SecurityLevel::None {
            warn!(
                log_n = literal.log_n,
                log_qp = literal.log_qp(),
                "parameters are not bound by any security level"
            );
        }

        let n: usize = 1 << literal.log_n;
        let primes: Vec<u64> = ntt_friendly_primes(&literal.log_moduli, 2 * n as u64).ok_or_else(|| {
            CkksError::InvalidParameters(format!(
                "not enough NTT friendly primes for log_moduli={:?} and N={}",
                literal.log_moduli, n
            ))
        })?;

        let (q, p) = primes.split_at(primes.len() - 1);
        Ok(Self {
            literal: literal.clone(),
            ring_q: RingRNS::new(n, q),
            ring_p: Arc::new(Ring::new(n, p[0])),
        })
    }

    pub fn literal(&self) -> &ParametersLiteral {
        &self.literal
    }

    pub fn log_n(&self) -> usize {
        self.literal.log_n
    }

    pub fn n(&self) -> usize {
        1 << self.literal.log_n
    }

    pub fn slots(&self) -> usize {
        self.n() >> 1
    }

    /// Index of the last data prime, i.e. the level of a fresh ciphertext.
    pub fn max_level(&self) -> usize {
        self.ring_q.level()
    }

    pub fn log_scale(&self) -> u32 {
        self.literal.log_scale
    }

    pub fn scale(&self) -> f64 {
        (self.literal.log_scale as f64).exp2()
    }

    pub fn sigma(&self) -> f64 {
        self.literal.sigma
    }

    /// Error distribution: rounded Gaussian truncated at DEFAULT_BOUND_FACTOR * sigma.
    pub fn xe(&self) -> Result<Distributions> {
        let sigma: f64 = self.sigma();
        Distributions::gaussian(sigma, DEFAULT_BOUND_FACTOR * sigma)
            .map_err(|e| CkksError::InvalidParameters(format!("sigma={}: {}", sigma, e)))
    }

    /// Secret and ephemeral key distribution.
    pub fn xs(&self) -> Distributions {
        Distributions::ternary(TERNARY_DENSITY)
    }

    pub fn security(&self) -> SecurityLevel {
        self.literal.security
    }

    pub fn sum_width(&self) -> usize {
        self.literal.sum_width.unwrap_or(self.slots())
    }

    /// Rotation steps 1, 2, 4, ... needed to sum `sum_width` slots.
    pub fn rotation_steps(&self) -> Vec<i64> {
        let width: usize = self.sum_width().next_power_of_two();
        (0..width.trailing_zeros()).map(|i| 1i64 << i).collect()
    }

    pub fn ring_q(&self) -> &RingRNS<u64> {
        &self.ring_q
    }

    pub fn ring_p(&self) -> &Arc<Ring<u64>> {
        &self.ring_p
    }

    /// The data chain at full level extended with the special prime.
    pub fn ring_qp(&self) -> RingRNS<u64> {
        self.ring_q.at_level_with(self.max_level(), &self.ring_p)
    }

    pub fn q(&self) -> Vec<u64> {
        self.ring_q.moduli()
    }

    pub fn p(&self) -> u64 {
        self.ring_p.modulus.q
    }
}

impl std::fmt::Debug for Parameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameters")
            .field("log_n", &self.log_n())
            .field("q", &self.q())
            .field("p", &self.p())
            .field("log_scale", &self.log_scale())
            .field("sigma", &self.sigma())
            .field("security", &self.security())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> ParametersLiteral {
        ParametersLiteral {
            log_n: 5,
            log_moduli: vec![50, 30, 30, 50],
            log_scale: 30,
            sigma: DEFAULT_SIGMA,
            security: SecurityLevel::None,
            sum_width: Some(4),
        }
    }

    #[test]
    fn default_is_valid() {
        let params: Parameters = Parameters::new(&ParametersLiteral::default()).unwrap();
        assert_eq!(params.n(), 8192);
        assert_eq!(params.max_level(), 2);
        assert_eq!(params.q().len(), 3);
        assert_eq!(64 - params.p().leading_zeros(), 60);
    }

    #[test]
    fn primes_are_distinct_and_ntt_friendly() {
        let params: Parameters = Parameters::new(&toy()).unwrap();
        let mut all: Vec<u64> = params.q();
        all.push(params.p());
        let two_n: u64 = 2 * params.n() as u64;
        all.iter().for_each(|q| assert_eq!(q % two_n, 1));
        let mut sorted: Vec<u64> = all.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), all.len());
    }

    #[test]
    fn rotation_steps() {
        let params: Parameters = Parameters::new(&toy()).unwrap();
        assert_eq!(params.rotation_steps(), vec![1, 2]);

        let mut literal: ParametersLiteral = toy();
        literal.sum_width = Some(7);
        assert_eq!(Parameters::new(&literal).unwrap().rotation_steps(), vec![1, 2, 4]);

        literal.sum_width = Some(1);
        assert!(Parameters::new(&literal).unwrap().rotation_steps().is_empty());

        literal.sum_width = None;
        assert_eq!(Parameters::new(&literal).unwrap().rotation_steps().len(), 4);
    }

    #[test]
    fn invalid_parameters() {
        let cases: Vec<(&str, Box<dyn Fn(&mut ParametersLiteral)>)> = vec![
            ("log_n too small", Box::new(|p| p.log_n = 3)),
            ("log_n too large", Box::new(|p| p.log_n = 16)),
            ("no special prime", Box::new(|p| p.log_moduli = vec![50, 50])),
            ("prime too large", Box::new(|p| p.log_moduli = vec![61, 30, 61])),
            ("prime too small", Box::new(|p| p.log_moduli = vec![50, 19, 50])),
            ("scale too large", Box::new(|p| p.log_scale = 51)),
            ("q0 too small", Box::new(|p| p.log_moduli = vec![35, 30, 30, 50])),
            ("special prime too small", Box::new(|p| p.log_moduli = vec![50, 30, 30, 40])),
            ("sigma", Box::new(|p| p.sigma = 0.0)),
            ("sigma nan", Box::new(|p| p.sigma = f64::NAN)),
            ("sum width", Box::new(|p| p.sum_width = Some(17))),
            ("insecure", Box::new(|p| p.security = SecurityLevel::Tc128)),
        ];

        for (name, mutate) in cases {
            let mut literal: ParametersLiteral = toy();
            mutate(&mut literal);
            match Parameters::new(&literal) {
                Err(CkksError::InvalidParameters(_)) => {}
                other => panic!("{}: expected InvalidParameters, got {:?}", name, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn tc128_bound() {
        let mut literal: ParametersLiteral = ParametersLiteral::default();
        literal.log_moduli = vec![60, 40, 40, 40, 40, 60];
        assert!(Parameters::new(&literal).is_err());
        literal.log_n = 14;
        assert!(Parameters::new(&literal).is_ok());
    }

    #[test]
    fn literal_from_json() {
        let literal: ParametersLiteral = serde_json::from_str(
            r#"{"log_n":5,"log_moduli":[50,30,30,50],"log_scale":30,"security":"none"}"#,
        )
        .unwrap();
        assert_eq!(literal.sigma, DEFAULT_SIGMA);
        assert_eq!(literal.security, SecurityLevel::None);
        assert_eq!(literal.sum_width, None);
    }
}
