use criterion::{Criterion, criterion_group, criterion_main};
use math::modulus::prime_generation::ntt_friendly_primes;
use math::poly::PolyRNS;
use math::ring::RingRNS;

fn div_round_by_last_modulus_ntt(c: &mut Criterion) {
    fn runner(r: RingRNS<u64>) -> Box<dyn FnMut()> {
        let a: PolyRNS<u64> = r.new_polyrns();
        let mut b: PolyRNS<u64> = r.at_level(r.level() - 1).new_polyrns();
        Box::new(move || r.div_round_by_last_modulus_ntt(&a, &mut b))
    }

    let mut b: criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> =
        c.benchmark_group("div_round_by_last_modulus_ntt");
    for log_n in 11..16 {
        let n: usize = 1 << log_n;
        let moduli: Vec<u64> = match ntt_friendly_primes(&[60, 40, 40, 60], 2 * n as u64) {
            Some(moduli) => moduli,
            None => continue,
        };

        let ring_rns: RingRNS<u64> = RingRNS::new(n, &moduli);

        let runners = [(format!("prime/n={}/level={}", n, ring_rns.level()), {
            runner(ring_rns)
        })];

        for (name, mut runner) in runners {
            b.bench_with_input(name, &(), |b, _| b.iter(&mut runner));
        }
    }
}

fn mul_coeffs_then_add(c: &mut Criterion) {
    let mut b: criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> =
        c.benchmark_group("mul_coeffs_then_add");
    for log_n in 11..16 {
        let n: usize = 1 << log_n;
        let moduli: Vec<u64> = match ntt_friendly_primes(&[60, 40, 40], 2 * n as u64) {
            Some(moduli) => moduli,
            None => continue,
        };
        let ring_rns: RingRNS<u64> = RingRNS::new(n, &moduli);
        let a: PolyRNS<u64> = ring_rns.new_polyrns();
        let x: PolyRNS<u64> = ring_rns.new_polyrns();
        let mut acc: PolyRNS<u64> = ring_rns.new_polyrns();
        b.bench_with_input(format!("n={}/level={}", n, ring_rns.level()), &(), |b, _| {
            b.iter(|| ring_rns.mul_coeffs_then_add(&a, &x, &mut acc))
        });
    }
}

criterion_group!(benches, div_round_by_last_modulus_ntt, mul_coeffs_then_add);
criterion_main!(benches);
