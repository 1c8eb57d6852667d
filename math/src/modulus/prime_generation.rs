use primality_test::is_prime;

/// Enumerates primes q = 1 mod nth_root around 2^bit_size.
///
/// Downstream primes are strictly below 2^bit_size and keep the requested
/// bit size; upstream primes start above 2^bit_size. Enumeration stops once
/// a candidate drifts more than half a bit away from the requested size.
pub struct NTTFriendlyPrimesGenerator {
    size: f64,
    next_prime: u64,
    prev_prime: u64,
    nth_root: u64,
    check_next_prime: bool,
    check_prev_prime: bool,
}

impl NTTFriendlyPrimesGenerator {
    pub fn new(bit_size: u64, nth_root: u64) -> Self {
        assert!(
            bit_size < 63,
            "invalid bit_size={}: must be smaller than 63",
            bit_size
        );
        assert!(
            nth_root & (nth_root - 1) == 0,
            "invalid nth_root={}: not a power of two",
            nth_root
        );

        let next_prime: u64 = (1 << bit_size) + 1;
        let check_prev_prime: bool = next_prime > nth_root;
        let prev_prime: u64 = if check_prev_prime {
            next_prime - nth_root
        } else {
            next_prime
        };

        Self {
            size: bit_size as f64,
            check_next_prime: next_prime <= nth_root.wrapping_neg(),
            check_prev_prime,
            nth_root,
            next_prime,
            prev_prime,
        }
    }

    /// Returns the next prime above 2^bit_size, or None once the search
    /// would cross into the next bit size.
    pub fn next_upstream_prime(&mut self) -> Option<u64> {
        while self.check_next_prime {
            if (self.next_prime as f64).log2() - self.size >= 0.5
                || self.next_prime > u64::MAX - self.nth_root
            {
                self.check_next_prime = false;
                break;
            }
            let candidate: u64 = self.next_prime;
            self.next_prime += self.nth_root;
            if is_prime(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Returns the next prime below 2^bit_size, or None once the search
    /// would cross into the previous bit size.
    pub fn next_downstream_prime(&mut self) -> Option<u64> {
        while self.check_prev_prime {
            if self.size - (self.prev_prime as f64).log2() >= 0.5 || self.prev_prime < self.nth_root {
                self.check_prev_prime = false;
                break;
            }
            let candidate: u64 = self.prev_prime;
            self.prev_prime -= self.nth_root;
            if is_prime(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    pub fn next_downstream_primes(&mut self, k: usize) -> Option<Vec<u64>> {
        (0..k).map(|_| self.next_downstream_prime()).collect()
    }
}

/// Returns one distinct NTT-friendly prime per entry of `bit_sizes`, each
/// exactly `bit_sizes[i]` bits long, or None if a bit size runs out of primes.
/// Entries sharing a bit size draw successive primes from the same generator.
pub fn ntt_friendly_primes(bit_sizes: &[u32], nth_root: u64) -> Option<Vec<u64>> {
    let mut generators: Vec<(u32, NTTFriendlyPrimesGenerator)> = Vec::new();
    let mut primes: Vec<u64> = Vec::with_capacity(bit_sizes.len());
    for &bits in bit_sizes {
        let position: usize = match generators.iter().position(|(b, _)| *b == bits) {
            Some(position) => position,
            None => {
                generators.push((bits, NTTFriendlyPrimesGenerator::new(bits as u64, nth_root)));
                generators.len() - 1
            }
        };
        primes.push(generators[position].1.next_downstream_prime()?);
    }
    Some(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_primes_have_requested_size() {
        let nth_root: u64 = 1 << 12;
        let mut generator: NTTFriendlyPrimesGenerator = NTTFriendlyPrimesGenerator::new(40, nth_root);
        let primes: Vec<u64> = generator.next_downstream_primes(4).unwrap();
        primes.iter().for_each(|q| {
            assert_eq!(q % nth_root, 1);
            assert_eq!(64 - q.leading_zeros(), 40);
            assert!(is_prime(*q));
        });
        assert!(primes.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn upstream_primes_are_above_power_of_two() {
        let nth_root: u64 = 1 << 10;
        let mut generator: NTTFriendlyPrimesGenerator = NTTFriendlyPrimesGenerator::new(30, nth_root);
        let q: u64 = generator.next_upstream_prime().unwrap();
        assert!(q > 1 << 30);
        assert_eq!(q % nth_root, 1);
    }

    #[test]
    fn chain_is_distinct() {
        let primes: Vec<u64> = ntt_friendly_primes(&[60, 40, 40, 60], 1 << 14).unwrap();
        assert_eq!(primes.len(), 4);
        assert_ne!(primes[0], primes[3]);
        assert_ne!(primes[1], primes[2]);
        assert_eq!(64 - primes[3].leading_zeros(), 60);
    }
}
