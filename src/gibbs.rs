/*!
Tempered Gibbs moves over inclusion indicators.

Each move picks one coordinate to update from a categorical proposal and
updates it:

- covariate `p` is chosen with weight
  `i_prob_p = ½ (add_prob_p + explore / P) / P(γ_p | rest)` and its indicator
  is flipped;
- when the inclusion rate `h` is inferred, an extra slot with weight `xi`
  redraws `h ~ Beta(α + |active|, β + P − |active|)`.

Because the proposal is not uniform, every state carries the importance weight
`1 / mean(i_prob)`; weighted averages over the chain recover posterior
expectations. The exploration floor keeps every covariate reachable even when
its conditional inclusion probability collapses to zero or one.

During the adaptation window, `xi` is tuned with a Robbins–Monro step so that
roughly a fraction `xi_target` of the moves update `h`.

# Examples

```rust
use mini_bvs::config::SamplerConfig;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let x = Array2::from_shape_fn((30, 5), |(i, j)| (((i + 1) * (j + 2)) % 7) as f64 - 3.0);
let y = Array1::from_shape_fn(30, |i| 2.0 * x[[i, 0]]);
let sampler = NormalLikelihoodSampler::new(x, y, SamplerConfig::default().with_s(1.0)).unwrap();

let mut rng = SmallRng::seed_from_u64(1);
let mut state = sampler.initialize_sample(&mut rng).unwrap();
for _ in 0..10 {
    sampler.move_chain(&mut state, &mut rng).unwrap();
}
assert_eq!(state.t, 10);
assert!(state.weight > 0.0);
```
*/

use ndarray::Array1;
use rand::{Rng, RngCore};

use crate::distributions::{Categorical, DiscreteDistribution};
use crate::error::Result;
use crate::log_odds::sigmoid;
use crate::model::{NormalLikelihoodSampler, EPSILON};
use crate::sample::{ChainState, Move};

/// Lower bound on the adaptive `h`-move mass.
const XI_MIN: f64 = 1.0e-3;

impl NormalLikelihoodSampler {
    /// Creates the empty-model starting state with all probabilities computed.
    pub fn initialize_sample<R: Rng>(&self, rng: &mut R) -> Result<ChainState> {
        let mut state = self.state_from_gamma(vec![false; self.p])?;
        self.compute_probs(&mut state, rng)?;
        state.weight = importance_weight(&state.i_prob);
        Ok(state)
    }

    /**
    Advances the chain by one move.

    # Errors

    Returns [`SelectionError::DegenerateChain`](crate::error::SelectionError::DegenerateChain)
    when the move activates every covariate, and
    [`SelectionError::CholeskyFailed`](crate::error::SelectionError::CholeskyFailed)
    when factorization cannot be stabilized. In both cases the chain must stop.
    */
    pub fn move_chain<R: Rng>(&self, state: &mut ChainState, rng: &mut R) -> Result<()> {
        state.t += 1;

        let proposal = Categorical::new(state.i_prob.to_vec());
        let mv = match proposal.sample(rng) {
            idx if idx < self.p => Move::Flip(idx),
            _ => Move::UpdateH,
        };
        match mv {
            Move::Flip(p) => state.flip(p),
            Move::UpdateH => {
                if let Some(ratio) =
                    self.inclusion
                        .resample_log_h_ratio(state.num_active(), self.p, rng)?
                {
                    state.log_h_ratio.fill(ratio);
                }
            }
        }
        state.idx = Some(mv);

        self.compute_probs(state, rng)?;
        state.weight = importance_weight(&state.i_prob);
        Ok(())
    }

    /// Refreshes `add_prob`, `i_prob`, `beta` and the `h` posterior for the current pattern.
    fn compute_probs<R: Rng>(&self, state: &mut ChainState, rng: &mut R) -> Result<()> {
        let beta_rng: Option<&mut dyn RngCore> = if self.compute_betas {
            Some(&mut *rng)
        } else {
            None
        };
        let (log_odds, beta) = self.log_odds_and_beta(state, beta_rng)?;
        state.add_prob = log_odds.mapv(sigmoid);
        if beta.is_some() {
            state.beta = beta;
        }

        let mut i_prob = Array1::<f64>::zeros(state.i_prob.len());
        for (j, (&add, &g)) in state.add_prob.iter().zip(state.gamma.iter()).enumerate() {
            let prob_gamma = if g { add } else { 1.0 - add };
            i_prob[j] = 0.5 * (add + self.explore) / (prob_gamma + EPSILON);
        }

        if let Some((alpha, beta)) = self.inclusion.beta_params() {
            let k = state.num_active() as f64;
            state.h_alpha = Some(alpha + k);
            state.h_beta = Some(beta + self.p as f64 - k);

            if state.t >= 1 && state.t <= state.adapt_steps {
                let flip_mass: f64 = i_prob.iter().take(self.p).sum();
                let t = state.t as f64;
                state.xi += (self.xi_target - state.xi / (state.xi + flip_mass)) / (t + 1.0).sqrt();
                state.xi = state.xi.max(XI_MIN);
            }
            i_prob[self.p] = state.xi;
        }
        state.i_prob = i_prob;
        Ok(())
    }
}

/// `1 / mean(i_prob)`.
pub fn importance_weight(i_prob: &Array1<f64>) -> f64 {
    match i_prob.mean() {
        Some(mean) if mean > 0.0 => 1.0 / mean,
        _ => 0.0,
    }
}
