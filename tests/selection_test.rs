//! End-to-end checks of the variable-selection chain on simulated data.

use mini_bvs::config::{InclusionPrior, PriorKind, SamplerConfig};
use mini_bvs::core::VariableSelector;
use mini_bvs::error::SelectionError;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::Arc;

const N: usize = 50;
const P: usize = 10;
const BURNIN: usize = 2_000;
const SAMPLE_SIZE: usize = 5_000;
const SEED: u64 = 42;

/// `y = x_2 − 0.8 x_7 + 0.5 ε`.
fn simulated() -> (Array2<f64>, Array1<f64>) {
    let mut rng = SmallRng::seed_from_u64(SEED);
    let x = Array2::from_shape_fn((N, P), |_| rng.sample::<f64, _>(StandardNormal));
    let noise = Array1::from_shape_fn(N, |_| rng.sample::<f64, _>(StandardNormal));
    let y = x.column(2).to_owned() - x.column(7).to_owned() * 0.8 + noise * 0.5;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_recovers_signal(config: SamplerConfig) {
        let (x, y) = simulated();
        let sampler = Arc::new(NormalLikelihoodSampler::new(x, y, config).unwrap());
        let summary = VariableSelector::new(sampler, 1)
            .unwrap()
            .set_seed(SEED)
            .run(SAMPLE_SIZE, BURNIN)
            .unwrap();

        for (j, &pip) in summary.pip.iter().enumerate() {
            if j == 2 || j == 7 {
                assert!(pip > 0.8, "PIP of relevant covariate {j} too low: {pip}");
            } else {
                assert!(pip < 0.3, "PIP of irrelevant covariate {j} too high: {pip}");
            }
        }
    }

    #[test]
    fn test_pip_isotropic() {
        assert_recovers_signal(SamplerConfig::default().with_s(2.0));
    }

    #[test]
    fn test_pip_gprior() {
        assert_recovers_signal(
            SamplerConfig::default()
                .with_s(2.0)
                .with_prior(PriorKind::GPrior),
        );
    }

    #[test]
    fn test_pip_with_precomputed_gram_matrix() {
        assert_recovers_signal(SamplerConfig::default().with_s(2.0).with_precompute_xx(true));
    }

    #[test]
    fn test_coefficients_near_truth() {
        let (x, y) = simulated();
        let config = SamplerConfig::default().with_s(2.0).with_compute_betas(true);
        let sampler = Arc::new(NormalLikelihoodSampler::new(x, y, config).unwrap());
        let summary = VariableSelector::new(sampler, 2)
            .unwrap()
            .set_seed(SEED)
            .run(SAMPLE_SIZE, BURNIN)
            .unwrap();

        let beta = summary.beta.unwrap();
        assert_eq!(beta.len(), P + 1);
        assert!((beta[2] - 1.0).abs() < 0.2, "beta_2 = {}", beta[2]);
        assert!((beta[7] + 0.8).abs() < 0.2, "beta_7 = {}", beta[7]);
        let conditional = summary.conditional_beta.unwrap();
        assert!((conditional[2] - beta[2]).abs() < 0.05);
        let rhat = summary.rhat.unwrap();
        assert_eq!(rhat.len(), P);
    }

    #[test]
    fn test_inferred_h_tracks_beta_posterior_mean() {
        let (alpha, beta) = (1.0, 9.0);
        let (x, y) = simulated();
        let config =
            SamplerConfig::default().with_inclusion(InclusionPrior::InferredBeta { alpha, beta });
        let sampler = Arc::new(NormalLikelihoodSampler::new(x, y, config).unwrap());
        let summary = VariableSelector::new(sampler, 1)
            .unwrap()
            .set_seed(SEED)
            .run(SAMPLE_SIZE, BURNIN)
            .unwrap();

        let h_mean = summary.h_mean.unwrap();
        let expected = (alpha + summary.mean_num_active) / (alpha + beta + P as f64);
        assert!(
            (h_mean - expected).abs() < 0.05,
            "h mean {h_mean} far from Beta posterior mean {expected}"
        );
        assert!(summary.chain_stats[0].h_move_rate > 0.0);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let (x, y) = simulated();
        let sampler = NormalLikelihoodSampler::new(x, y, SamplerConfig::default().with_s(2.0)).unwrap();
        let trajectory = |seed: u64| {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut state = sampler.initialize_sample(&mut rng).unwrap();
            let mut out = Vec::new();
            for _ in 0..500 {
                sampler.move_chain(&mut state, &mut rng).unwrap();
                out.push((state.gamma.clone(), state.weight.to_bits()));
            }
            out
        };
        assert_eq!(trajectory(3), trajectory(3));
        assert_ne!(trajectory(3), trajectory(4));
    }

    #[test]
    fn test_boundary_configurations_fail() {
        let (x, y) = simulated();
        let build = |config: SamplerConfig| NormalLikelihoodSampler::new(x.clone(), y.clone(), config);

        for s in [P as f64, 12.0, 0.0, -1.0] {
            assert!(
                matches!(
                    build(SamplerConfig::default().with_s(s)),
                    Err(SelectionError::InvalidConfig(_))
                ),
                "S = {s} was accepted"
            );
        }
        for explore in [0.0, -0.5] {
            assert!(matches!(
                build(SamplerConfig::default().with_explore(explore)),
                Err(SelectionError::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            "horseshoe".parse::<PriorKind>(),
            Err(SelectionError::UnknownPrior(_))
        ));
        assert!(matches!(
            NormalLikelihoodSampler::new(x.clone(), Array1::zeros(N - 1), SamplerConfig::default()),
            Err(SelectionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_assumed_covariates_are_always_in_the_model() {
        let (x, y) = simulated();
        // Hand the true signal on column 2 to the assumed block.
        let assumed = x.column(2).to_owned().insert_axis(ndarray::Axis(1));
        let config = SamplerConfig::default()
            .with_s(2.0)
            .with_x_assumed(assumed)
            .with_compute_betas(true);
        let sampler = Arc::new(NormalLikelihoodSampler::new(x, y, config).unwrap());
        assert_eq!(sampler.num_assumed(), 2);
        let summary = VariableSelector::new(sampler, 1)
            .unwrap()
            .set_seed(SEED)
            .run(2_000, 500)
            .unwrap();

        let beta = summary.beta.unwrap();
        assert_eq!(beta.len(), P + 2);
        // Column 2 duplicates the assumed column, so it adds nothing.
        assert!(summary.pip[2] < 0.4, "duplicated covariate PIP {}", summary.pip[2]);
        assert!(summary.pip[7] > 0.8);
        assert!((beta[P] - 1.0).abs() < 0.2, "assumed coefficient {}", beta[P]);
    }
}
