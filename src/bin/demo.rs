//! Variable selection on simulated data with two relevant covariates out of twenty.

use mini_bvs::config::{InclusionPrior, SamplerConfig};
use mini_bvs::core::VariableSelector;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    const N: usize = 100;
    const P: usize = 20;
    const N_SAMPLES: usize = 5_000;
    const BURNIN: usize = 1_000;
    const N_CHAINS: usize = 4;
    const SEED: u64 = 42;

    // y = 1.0 * x_3 - 0.7 * x_11 + noise
    let mut rng = SmallRng::seed_from_u64(SEED);
    let x = Array2::from_shape_fn((N, P), |_| rng.sample::<f64, _>(StandardNormal));
    let noise = Array1::from_shape_fn(N, |_| rng.sample::<f64, _>(StandardNormal));
    let y = x.column(3).to_owned() - x.column(11).to_owned() * 0.7 + noise * 0.5;

    let config = SamplerConfig::default()
        .with_inclusion(InclusionPrior::InferredBeta {
            alpha: 1.0,
            beta: 9.0,
        })
        .with_compute_betas(true);
    let sampler = Arc::new(NormalLikelihoodSampler::new(x, y, config)?);

    let summary = VariableSelector::new(sampler, N_CHAINS)?
        .set_seed(SEED)
        .run_progress(N_SAMPLES, BURNIN)?;

    println!("Recorded {} samples", summary.n_samples);
    println!("{:>9} {:>8} {:>9}", "covariate", "pip", "beta");
    let beta = summary.beta.clone().unwrap_or_else(|| Array1::zeros(P));
    for (j, pip) in summary.pip.iter().enumerate() {
        println!("{j:>9} {pip:>8.3} {:>9.3}", beta[j]);
    }
    if let Some(h) = summary.h_mean {
        println!("Posterior mean inclusion rate: {h:.3}");
    }
    if let Some(rhat) = summary.max_rhat() {
        println!("max(rhat) = {rhat:.3}");
    }

    #[cfg(feature = "csv")]
    {
        mini_bvs::io::csv::save_summary_csv(&summary, "summary.csv")?;
        println!("Saved summary to summary.csv");
    }
    Ok(())
}
