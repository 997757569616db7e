/*!
Chain drivers: one seeded chain per [`SelectionChain`], many in parallel through
[`VariableSelector`].

Each chain discards `burn_in` moves, during which the `h`-move mass adapts,
then pushes `n_samples` snapshots into its own
[`StreamingSampleContainer`]. Independent chains run on the rayon thread pool;
their containers are merged into one [`SelectionSummary`] and the spread of
their inclusion-probability traces gives an R-hat per covariate.

# Examples

```rust
use mini_bvs::config::SamplerConfig;
use mini_bvs::core::VariableSelector;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};
use std::sync::Arc;

let x = Array2::from_shape_fn((40, 6), |(i, j)| (((i + 3) * (j + 1)) % 11) as f64 - 5.0);
let y = Array1::from_shape_fn(40, |i| 1.5 * x[[i, 2]]);
let sampler = NormalLikelihoodSampler::new(x, y, SamplerConfig::default().with_s(1.0)).unwrap();

let summary = VariableSelector::new(Arc::new(sampler), 2)
    .unwrap()
    .set_seed(42)
    .run(200, 100)
    .unwrap();
assert_eq!(summary.n_samples, 400);
assert_eq!(summary.pip.len(), 6);
assert!(summary.rhat.is_some());
```
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::Array1;
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::container::StreamingSampleContainer;
use crate::error::{Result, SelectionError};
use crate::model::NormalLikelihoodSampler;
use crate::sample::ChainState;
use crate::stats::{collect_rhat, max_rhat, ChainStats, ChainTracker};

const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

pub trait MarkovChain {
    type State;

    /// Does one iteration of the chain and returns the new current state.
    fn step(&mut self) -> Result<&Self::State>;

    /// Gets the current state without stepping.
    fn current_state(&self) -> &Self::State;
}

/// A single variable-selection chain with its own random stream.
#[derive(Debug, Clone)]
pub struct SelectionChain {
    sampler: Arc<NormalLikelihoodSampler>,
    state: ChainState,
    /// The chain-specific random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl SelectionChain {
    /// Starts a chain at the empty model.
    pub fn new(sampler: Arc<NormalLikelihoodSampler>, seed: u64) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let state = sampler.initialize_sample(&mut rng)?;
        Ok(Self {
            sampler,
            state,
            seed,
            rng,
        })
    }

    /// Sets the number of moves during which the `h`-move mass adapts.
    pub fn set_adapt_steps(&mut self, adapt_steps: usize) {
        self.state.adapt_steps = adapt_steps;
    }

    /**
    Runs `burn_in` unrecorded moves followed by `n_samples` recorded ones.

    The `h`-move mass adapts during burn-in only. When `pb` is given, its
    position and message are refreshed about every half second.
    */
    pub fn run(
        &mut self,
        n_samples: usize,
        burn_in: usize,
        pb: Option<&ProgressBar>,
    ) -> Result<ChainOutput> {
        self.set_adapt_steps(self.state.t + burn_in);
        let p = self.sampler.p();
        let mut container = StreamingSampleContainer::new();
        let mut tracker = ChainTracker::new(p);
        let mut last_update = Instant::now();
        let n_steps = burn_in + n_samples;

        if let Some(pb) = pb {
            pb.set_length(n_steps as u64);
        }

        for step_idx in 0..n_steps {
            let state = self.step()?;
            if step_idx >= burn_in {
                container.push(&state.snapshot())?;
                tracker.step(state.add_prob.view(), state.idx)?;
            }

            if let Some(pb) = pb {
                if last_update.elapsed() >= UPDATE_INTERVAL || step_idx + 1 == n_steps {
                    pb.set_position(step_idx as u64 + 1);
                    pb.set_message(format!(
                        "|γ|={} xi≈{:.2}",
                        state.num_active(),
                        state.xi
                    ));
                    last_update = Instant::now();
                }
            }
        }

        log::debug!(
            "chain with seed {} finished {} moves, {} active covariates",
            self.seed,
            self.state.t,
            self.state.num_active()
        );
        Ok(ChainOutput {
            container,
            stats: tracker.stats(),
        })
    }
}

impl MarkovChain for SelectionChain {
    type State = ChainState;

    fn step(&mut self) -> Result<&ChainState> {
        self.sampler.move_chain(&mut self.state, &mut self.rng)?;
        Ok(&self.state)
    }

    fn current_state(&self) -> &ChainState {
        &self.state
    }
}

/// What one chain contributes to a [`SelectionSummary`].
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub container: StreamingSampleContainer,
    pub stats: ChainStats,
}

/// Posterior summary merged over all chains.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSummary {
    /// Posterior inclusion probability per covariate.
    pub pip: Array1<f64>,
    /// Posterior mean coefficients (covariates, then the assumed block) when betas are computed.
    pub beta: Option<Array1<f64>>,
    pub beta_std: Option<Array1<f64>>,
    pub conditional_beta: Option<Array1<f64>>,
    /// Posterior mean inclusion rate when `h` is inferred.
    pub h_mean: Option<f64>,
    pub mean_num_active: f64,
    /// Per-covariate R-hat of the inclusion probabilities; `None` for a single chain.
    pub rhat: Option<Array1<f64>>,
    pub chain_stats: Vec<ChainStats>,
    /// Recorded samples over all chains.
    pub n_samples: usize,
}

impl SelectionSummary {
    /// Builds the summary from the outputs of independent chains.
    pub fn from_chains(outputs: Vec<ChainOutput>) -> Result<Self> {
        let mut merged = StreamingSampleContainer::new();
        let mut chain_stats = Vec::with_capacity(outputs.len());
        for output in outputs {
            merged.merge(&output.container)?;
            chain_stats.push(output.stats);
        }

        let rhat = if chain_stats.len() >= 2 {
            let refs: Vec<&ChainStats> = chain_stats.iter().collect();
            Some(collect_rhat(&refs)?)
        } else {
            None
        };

        let pip = merged.pip().ok_or_else(|| {
            SelectionError::InvalidConfig("no samples were recorded".to_string())
        })?;
        Ok(Self {
            pip,
            beta: merged.beta(),
            beta_std: merged.beta_std(),
            conditional_beta: merged.conditional_beta(),
            h_mean: merged.h_mean(),
            mean_num_active: merged.mean_num_active().unwrap_or(0.0),
            rhat,
            chain_stats,
            n_samples: merged.n_samples(),
        })
    }

    /// Largest finite R-hat over covariates.
    pub fn max_rhat(&self) -> Option<f64> {
        self.rhat.as_ref().and_then(max_rhat)
    }
}

/**
Runs independent chains over one shared sampler.

A global random seed is drawn at construction. Chain `i` is seeded with
`seed + i`, so [`set_seed`](Self::set_seed) makes a whole run reproducible.
*/
#[derive(Debug, Clone)]
pub struct VariableSelector {
    sampler: Arc<NormalLikelihoodSampler>,
    n_chains: usize,
    /// The global random seed.
    pub seed: u64,
}

impl VariableSelector {
    pub fn new(sampler: Arc<NormalLikelihoodSampler>, n_chains: usize) -> Result<Self> {
        if n_chains == 0 {
            return Err(SelectionError::InvalidConfig(
                "at least one chain is required".to_string(),
            ));
        }
        Ok(Self {
            sampler,
            n_chains,
            seed: thread_rng().gen::<u64>(),
        })
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_chains(&self) -> usize {
        self.n_chains
    }

    /// Chains positioned at the empty model, seeded `seed + i`.
    pub fn chains(&self) -> Result<Vec<SelectionChain>> {
        (0..self.n_chains)
            .map(|i| SelectionChain::new(self.sampler.clone(), self.seed.wrapping_add(i as u64)))
            .collect()
    }

    /**
    Runs every chain for `burn_in + n_samples` moves in parallel.

    # Errors

    The first chain error (a degenerate active set or an unrecoverable
    factorization) aborts the run.
    */
    pub fn run(&self, n_samples: usize, burn_in: usize) -> Result<SelectionSummary> {
        log::debug!(
            "running {} chains: {} burn-in and {} recorded moves each, seed {}",
            self.n_chains,
            burn_in,
            n_samples,
            self.seed
        );
        let mut chains = self.chains()?;
        let outputs = chains
            .par_iter_mut()
            .map(|chain| chain.run(n_samples, burn_in, None))
            .collect::<Result<Vec<_>>>()?;
        SelectionSummary::from_chains(outputs)
    }

    /// Same as [`run`](Self::run), with one progress bar per chain.
    pub fn run_progress(&self, n_samples: usize, burn_in: usize) -> Result<SelectionSummary> {
        let multi = MultiProgress::new();
        let pb_style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        let mut chains = self.chains()?;
        let outputs = chains
            .par_iter_mut()
            .enumerate()
            .map(|(i, chain)| {
                let pb = multi.add(ProgressBar::new((n_samples + burn_in) as u64));
                pb.set_prefix(format!("Chain {i}"));
                pb.set_style(pb_style.clone());
                let output = chain.run(n_samples, burn_in, Some(&pb));
                pb.finish_with_message("Done!");
                output
            })
            .collect::<Result<Vec<_>>>()?;
        SelectionSummary::from_chains(outputs)
    }
}
