use rand_distr::{Distribution, Normal, NormalError};

use crate::source::Source;

/// Small-integer distributions used for secrets, ephemeral keys and errors.
#[derive(Clone, Copy, Debug)]
pub enum Distributions {
    /// Rounded Gaussian, resampled outside [-bound, bound].
    DiscreteGaussian { normal: Normal<f64>, bound: f64 },
    /// -1 or 1 each with probability prob/2, 0 otherwise.
    Ternary(f64),
}

impl Distributions {
    pub fn gaussian(sigma: f64, bound: f64) -> Result<Self, NormalError> {
        Ok(Distributions::DiscreteGaussian {
            normal: Normal::new(0.0, sigma)?,
            bound,
        })
    }

    pub fn ternary(prob: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&prob), "invalid prob={}", prob);
        Distributions::Ternary(prob)
    }

    pub fn sample(&self, source: &mut Source) -> i64 {
        match self {
            Distributions::DiscreteGaussian { normal, bound } => loop {
                let x: f64 = normal.sample(source).round();
                if x.abs() <= *bound {
                    return x as i64;
                }
            },
            Distributions::Ternary(prob) => {
                let x: f64 = source.next_f64(0.0, 1.0);
                if x < prob * 0.5 {
                    -1
                } else if x < *prob {
                    1
                } else {
                    0
                }
            }
        }
    }

    pub fn fill(&self, source: &mut Source, out: &mut [i64]) {
        out.iter_mut().for_each(|x| *x = self.sample(source));
    }
}
