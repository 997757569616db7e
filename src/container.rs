/*!
Streaming, importance-weighted summaries of a variable-selection chain.

The move operator proposes coordinates non-uniformly, so each visited state
carries an importance weight and posterior expectations are weighted averages
`Σ wₜ f(γₜ) / Σ wₜ`. [`StreamingSampleContainer`] keeps only the running sums,
so memory does not grow with the number of samples.

# Examples

```rust
use mini_bvs::container::StreamingSampleContainer;
use mini_bvs::sample::Snapshot;
use ndarray::array;

let mut container = StreamingSampleContainer::new();
container.push(&Snapshot {
    gamma: vec![true, false],
    add_prob: array![0.9, 0.2],
    beta: None,
    weight: 1.0,
    log_h_ratio: None,
}).unwrap();
container.push(&Snapshot {
    gamma: vec![true, false],
    add_prob: array![0.7, 0.4],
    beta: None,
    weight: 3.0,
    log_h_ratio: None,
}).unwrap();
let pip = container.pip().unwrap();
assert!((pip[0] - 0.75).abs() < 1e-12);
assert!((pip[1] - 0.35).abs() < 1e-12);
```
*/

use ndarray::{Array1, Zip};

use crate::error::{Result, SelectionError};
use crate::log_odds::sigmoid;
use crate::sample::Snapshot;

/// Weighted running sums over the snapshots pushed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingSampleContainer {
    n_samples: usize,
    weight_sum: f64,
    add_prob_sum: Option<Array1<f64>>,
    gamma_sum: Option<Array1<f64>>,
    num_active_sum: f64,
    beta_sum: Option<Array1<f64>>,
    beta_sq_sum: Option<Array1<f64>>,
    h_sum: f64,
    h_weight_sum: f64,
}

fn accumulate(acc: &mut Option<Array1<f64>>, values: &Array1<f64>, weight: f64) -> Result<()> {
    match acc {
        Some(sum) => {
            if sum.len() != values.len() {
                return Err(SelectionError::ShapeMismatch {
                    what: "snapshot",
                    expected: sum.len(),
                    found: values.len(),
                });
            }
            sum.scaled_add(weight, values);
        }
        None => *acc = Some(values * weight),
    }
    Ok(())
}

fn merge_sums(acc: &mut Option<Array1<f64>>, other: &Option<Array1<f64>>) -> Result<()> {
    if let Some(values) = other {
        accumulate(acc, values, 1.0)?;
    }
    Ok(())
}

impl StreamingSampleContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots pushed.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /**
    Adds one snapshot with its importance weight.

    # Errors

    Returns [`SelectionError::ShapeMismatch`] if the snapshot's vectors do not
    match the lengths of earlier snapshots.
    */
    pub fn push(&mut self, snapshot: &Snapshot) -> Result<()> {
        let w = snapshot.weight;
        accumulate(&mut self.add_prob_sum, &snapshot.add_prob, w)?;
        let gamma: Array1<f64> = snapshot.gamma.iter().map(|&g| f64::from(u8::from(g))).collect();
        accumulate(&mut self.gamma_sum, &gamma, w)?;
        if let Some(beta) = &snapshot.beta {
            accumulate(&mut self.beta_sum, beta, w)?;
            accumulate(&mut self.beta_sq_sum, &beta.mapv(|b| b * b), w)?;
        }
        if let Some(ratio) = snapshot.log_h_ratio {
            self.h_sum += w * sigmoid(ratio);
            self.h_weight_sum += w;
        }
        self.num_active_sum += w * gamma.sum();
        self.weight_sum += w;
        self.n_samples += 1;
        Ok(())
    }

    /// Folds the sums of another chain into this one.
    pub fn merge(&mut self, other: &StreamingSampleContainer) -> Result<()> {
        merge_sums(&mut self.add_prob_sum, &other.add_prob_sum)?;
        merge_sums(&mut self.gamma_sum, &other.gamma_sum)?;
        merge_sums(&mut self.beta_sum, &other.beta_sum)?;
        merge_sums(&mut self.beta_sq_sum, &other.beta_sq_sum)?;
        self.num_active_sum += other.num_active_sum;
        self.h_sum += other.h_sum;
        self.h_weight_sum += other.h_weight_sum;
        self.weight_sum += other.weight_sum;
        self.n_samples += other.n_samples;
        Ok(())
    }

    fn weighted_mean(&self, sum: &Option<Array1<f64>>) -> Option<Array1<f64>> {
        if self.weight_sum > 0.0 {
            sum.as_ref().map(|s| s / self.weight_sum)
        } else {
            None
        }
    }

    /// Posterior inclusion probabilities, the weighted mean of `add_prob`.
    pub fn pip(&self) -> Option<Array1<f64>> {
        self.weighted_mean(&self.add_prob_sum)
    }

    /// Weighted frequency with which each covariate was included.
    pub fn inclusion_frequency(&self) -> Option<Array1<f64>> {
        self.weighted_mean(&self.gamma_sum)
    }

    /// Posterior mean coefficients over covariates followed by the assumed block.
    pub fn beta(&self) -> Option<Array1<f64>> {
        self.weighted_mean(&self.beta_sum)
    }

    /// Posterior standard deviation of each coefficient.
    pub fn beta_std(&self) -> Option<Array1<f64>> {
        let mean = self.beta()?;
        let mean_sq = self.weighted_mean(&self.beta_sq_sum)?;
        Some(Zip::from(&mean_sq).and(&mean).map_collect(|&m2, &m| (m2 - m * m).max(0.0).sqrt()))
    }

    /**
    Posterior mean of each covariate coefficient given that the covariate is included.

    Covariates that were never included get zero. Entries for the assumed
    block equal [`beta`](Self::beta), since those columns are always included.
    */
    pub fn conditional_beta(&self) -> Option<Array1<f64>> {
        let mut conditional = self.beta()?;
        let frequency = self.inclusion_frequency()?;
        for (b, &f) in conditional.iter_mut().zip(frequency.iter()) {
            *b = if f > 0.0 { *b / f } else { 0.0 };
        }
        Some(conditional)
    }

    /// Posterior mean of the shared inclusion rate when it is inferred.
    pub fn h_mean(&self) -> Option<f64> {
        (self.h_weight_sum > 0.0).then(|| self.h_sum / self.h_weight_sum)
    }

    /// Posterior mean number of included covariates.
    pub fn mean_num_active(&self) -> Option<f64> {
        (self.weight_sum > 0.0).then(|| self.num_active_sum / self.weight_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn random_snapshots(p: usize, n: usize, seed: u64) -> Vec<Snapshot> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..n)
            .map(|_| Snapshot {
                gamma: (0..p).map(|_| rng.gen_bool(0.5)).collect(),
                add_prob: Array1::from_shape_fn(p, |_| rng.gen()),
                beta: Some(Array1::from_shape_fn(p + 1, |_| rng.sample(StandardNormal))),
                weight: rng.gen(),
                log_h_ratio: Some(rng.sample(StandardNormal)),
            })
            .collect()
    }

    fn direct_mean(snapshots: &[Snapshot], f: impl Fn(&Snapshot) -> Array1<f64>) -> Array1<f64> {
        let total: f64 = snapshots.iter().map(|s| s.weight).sum();
        snapshots
            .iter()
            .fold(Array1::zeros(f(&snapshots[0]).len()), |acc, s| acc + f(s) * s.weight)
            / total
    }

    #[test]
    fn test_weighted_averages_match_direct_means() {
        let snapshots = random_snapshots(5, 40, 11);
        let mut container = StreamingSampleContainer::new();
        for s in &snapshots {
            container.push(s).unwrap();
        }
        assert_eq!(container.n_samples(), 40);

        let pip = direct_mean(&snapshots, |s| s.add_prob.clone());
        let beta = direct_mean(&snapshots, |s| s.beta.clone().unwrap());
        let beta_sq = direct_mean(&snapshots, |s| s.beta.clone().unwrap().mapv(|b| b * b));
        let freq = direct_mean(&snapshots, |s| {
            let mut g: Array1<f64> = s.gamma.iter().map(|&g| if g { 1.0 } else { 0.0 }).collect();
            g.append(ndarray::Axis(0), ndarray::array![1.0].view()).unwrap();
            g
        });
        let h = direct_mean(&snapshots, |s| ndarray::array![sigmoid(s.log_h_ratio.unwrap())]);

        assert_abs_diff_eq!(container.pip().unwrap(), pip, epsilon = 1e-12);
        assert_abs_diff_eq!(container.beta().unwrap(), beta, epsilon = 1e-12);
        assert_abs_diff_eq!(
            container.beta_std().unwrap(),
            (beta_sq - beta.mapv(|b| b * b)).mapv(f64::sqrt),
            epsilon = 1e-10
        );
        let conditional = container.conditional_beta().unwrap();
        for j in 0..5 {
            assert_abs_diff_eq!(conditional[j], beta[j] / freq[j], epsilon = 1e-10);
        }
        assert_abs_diff_eq!(conditional[5], beta[5], epsilon = 1e-12);
        assert_abs_diff_eq!(container.h_mean().unwrap(), h[0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            container.mean_num_active().unwrap(),
            freq.slice(ndarray::s![..5]).sum(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_merge_equals_single_stream() {
        let snapshots = random_snapshots(4, 30, 12);
        let mut whole = StreamingSampleContainer::new();
        let mut first = StreamingSampleContainer::new();
        let mut second = StreamingSampleContainer::new();
        for (i, s) in snapshots.iter().enumerate() {
            whole.push(s).unwrap();
            if i < 13 {
                first.push(s).unwrap();
            } else {
                second.push(s).unwrap();
            }
        }
        first.merge(&second).unwrap();
        assert_eq!(first.n_samples(), whole.n_samples());
        assert_abs_diff_eq!(first.pip().unwrap(), whole.pip().unwrap(), epsilon = 1e-12);
        assert_abs_diff_eq!(first.beta().unwrap(), whole.beta().unwrap(), epsilon = 1e-12);
        assert_abs_diff_eq!(first.h_mean().unwrap(), whole.h_mean().unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_and_optional_summaries() {
        let empty = StreamingSampleContainer::new();
        assert!(empty.pip().is_none());
        assert!(empty.h_mean().is_none());

        let mut no_beta = StreamingSampleContainer::new();
        no_beta
            .push(&Snapshot {
                gamma: vec![false, false],
                add_prob: ndarray::array![0.1, 0.2],
                beta: None,
                weight: 2.0,
                log_h_ratio: None,
            })
            .unwrap();
        assert!(no_beta.beta().is_none());
        assert!(no_beta.conditional_beta().is_none());
        assert!(no_beta.h_mean().is_none());
        assert_eq!(no_beta.mean_num_active(), Some(0.0));
    }

    #[test]
    fn test_mismatched_snapshot_is_rejected() {
        let mut container = StreamingSampleContainer::new();
        let snap = |p: usize| Snapshot {
            gamma: vec![false; p],
            add_prob: Array1::zeros(p),
            beta: None,
            weight: 1.0,
            log_h_ratio: None,
        };
        container.push(&snap(3)).unwrap();
        assert_eq!(
            container.push(&snap(4)),
            Err(SelectionError::ShapeMismatch {
                what: "snapshot",
                expected: 3,
                found: 4
            })
        );
    }
}
