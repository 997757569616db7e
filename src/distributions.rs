/*!
Discrete proposal distribution used by the move operator.

A [`Categorical`] is built from non-negative weights (normalized on
construction) and draws indices from an explicitly passed random stream, so a
single seeded generator drives a whole chain.

# Examples

```rust
use mini_bvs::distributions::{Categorical, DiscreteDistribution};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let mut rng = SmallRng::seed_from_u64(42);
let cat = Categorical::new(vec![0.2f64, 0.3, 0.5]);
let sample = cat.sample(&mut rng);
assert!(sample < 3);
let logp = cat.log_prob(sample);
assert!(logp <= 0.0);
```
*/

use rand::Rng;

/// A distribution over indices `0..n`.
pub trait DiscreteDistribution {
    /// Samples an index from the distribution.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize;
    /// Evaluates the log-probability of the given index.
    fn log_prob(&self, index: usize) -> f64;
}

/// Categorical distribution over a finite set of categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    pub probs: Vec<f64>,
}

impl Categorical {
    /// Creates a categorical distribution from non-negative weights, normalized to sum to one.
    pub fn new(weights: Vec<f64>) -> Self {
        let sum: f64 = weights.iter().sum();
        let probs = weights.into_iter().map(|w| w / sum).collect();
        Self { probs }
    }
}

impl DiscreteDistribution for Categorical {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let r: f64 = rng.gen();
        let mut cum = 0.0;
        for (i, &p) in self.probs.iter().enumerate() {
            cum += p;
            if r < cum {
                return i;
            }
        }
        // Rounding can leave `cum` slightly below one; fall back to the last
        // category that carries mass.
        self.probs
            .iter()
            .rposition(|&p| p > 0.0)
            .unwrap_or(self.probs.len().saturating_sub(1))
    }

    fn log_prob(&self, index: usize) -> f64 {
        if index < self.probs.len() {
            self.probs[index].ln()
        } else {
            f64::NEG_INFINITY
        }
    }
}
