use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mini_bvs::config::SamplerConfig;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn simulated(n: usize, p: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = SmallRng::seed_from_u64(0);
    let x = Array2::from_shape_fn((n, p), |_| rng.sample::<f64, _>(StandardNormal));
    let noise = Array1::from_shape_fn(n, |_| rng.sample::<f64, _>(StandardNormal));
    let y = x.column(0).to_owned() + x.column(1).to_owned() * 0.5 + noise;
    (x, y)
}

fn bench_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("move_chain");
    for &p in &[50usize, 200, 1000] {
        for precompute_xx in [false, true] {
            let (x, y) = simulated(500, p);
            let config = SamplerConfig::default().with_precompute_xx(precompute_xx);
            let sampler = NormalLikelihoodSampler::new(x, y, config).unwrap();
            let mut rng = SmallRng::seed_from_u64(1);
            let mut state = sampler.initialize_sample(&mut rng).unwrap();
            // Warm up into a typical region of the posterior.
            for _ in 0..200 {
                sampler.move_chain(&mut state, &mut rng).unwrap();
            }
            let id = BenchmarkId::new(if precompute_xx { "xx" } else { "xb" }, p);
            group.bench_function(id, |b| {
                b.iter(|| {
                    sampler.move_chain(&mut state, &mut rng).unwrap();
                    black_box(state.weight)
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_move);
criterion_main!(benches);
