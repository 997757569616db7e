//! Running per-chain statistics and the multi-chain R-hat diagnostic.

use std::collections::VecDeque;

use ndarray::prelude::*;
use ndarray::Zip;
use ndarray_stats::QuantileExt;

use crate::error::{Result, SelectionError};
use crate::sample::Move;

/// Moves remembered for the recent `h`-update rate.
const MOVE_WINDOW: usize = 100;

/// Running mean and mean of squares of a chain's inclusion-probability trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTracker {
    n_params: usize,
    n: u64,
    h_move_rate: f64,
    mean: Array1<f64>,    // n_params
    mean_sq: Array1<f64>, // n_params
    move_queue: VecDeque<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub n: u64,
    /// Fraction of the last moves that updated `h`.
    pub h_move_rate: f64,
    pub mean: Array1<f64>, // n_params
    pub sm2: Array1<f64>,  // n_params
}

impl ChainTracker {
    pub fn new(n_params: usize) -> Self {
        Self {
            n_params,
            n: 0,
            h_move_rate: 0.0,
            mean: Array1::zeros(n_params),
            mean_sq: Array1::zeros(n_params),
            move_queue: VecDeque::with_capacity(MOVE_WINDOW + 1),
        }
    }

    /// Records one step: the traced values and the move that produced them.
    pub fn step(&mut self, x: ArrayView1<f64>, last_move: Option<Move>) -> Result<()> {
        if x.len() != self.n_params {
            return Err(SelectionError::ShapeMismatch {
                what: "tracked values",
                expected: self.n_params,
                found: x.len(),
            });
        }
        self.n += 1;

        self.move_queue.push_back(last_move == Some(Move::UpdateH));
        if self.move_queue.len() > MOVE_WINDOW {
            self.move_queue.pop_front();
        }
        self.h_move_rate =
            self.move_queue.iter().filter(|&&h| h).count() as f64 / self.move_queue.len() as f64;

        let n = self.n as f64;
        self.mean = (&self.mean * (n - 1.0) + &x) / n;
        self.mean_sq = (&self.mean_sq * (n - 1.0) + x.mapv(|v| v * v)) / n;
        Ok(())
    }

    /// Unbiased within-chain variance. Zero until two steps have been recorded.
    pub fn sm2(&self) -> Array1<f64> {
        if self.n < 2 {
            return Array1::zeros(self.n_params);
        }
        let n = self.n as f64;
        ((&self.mean_sq - self.mean.pow2()) * n / (n - 1.0)).mapv(|v| v.max(0.0))
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            n: self.n,
            h_move_rate: self.h_move_rate,
            mean: self.mean.clone(),
            sm2: self.sm2(),
        }
    }
}

/**
Potential scale reduction factor per parameter from the summaries of several chains.

A parameter that never moved in any chain and agrees across chains (e.g. a
covariate whose inclusion probability is pinned at one) gets `1.0`. Zero
within-chain variance with disagreeing chains gives `+∞`.

# Errors

Returns [`SelectionError::InvalidConfig`] for fewer than two chains and
[`SelectionError::ShapeMismatch`] when the chains track different numbers of
parameters.
*/
pub fn collect_rhat(all_chain_stats: &[&ChainStats]) -> Result<Array1<f64>> {
    if all_chain_stats.len() < 2 {
        return Err(SelectionError::InvalidConfig(format!(
            "R-hat needs at least two chains, got {}",
            all_chain_stats.len()
        )));
    }
    let n_params = all_chain_stats[0].mean.len();
    if let Some(bad) = all_chain_stats.iter().find(|s| s.mean.len() != n_params) {
        return Err(SelectionError::ShapeMismatch {
            what: "chain statistics",
            expected: n_params,
            found: bad.mean.len(),
        });
    }

    let means: Vec<ArrayView1<f64>> = all_chain_stats.iter().map(|x| x.mean.view()).collect();
    let means = ndarray::stack(Axis(0), &means).map_err(stack_error)?;
    let sm2s: Vec<ArrayView1<f64>> = all_chain_stats.iter().map(|x| x.sm2.view()).collect();
    let sm2s = ndarray::stack(Axis(0), &sm2s).map_err(stack_error)?;

    let n_chains = all_chain_stats.len() as f64;
    let w = sm2s.sum_axis(Axis(0)) / n_chains;
    let global_means = means.sum_axis(Axis(0)) / n_chains;
    let diffs = &means - &global_means.insert_axis(Axis(0));
    let b = diffs.pow2().sum_axis(Axis(0)) / (n_chains - 1.0);

    let n: f64 = all_chain_stats.iter().map(|x| x.n as f64).sum::<f64>() / n_chains;
    let rhat = Zip::from(&b).and(&w).map_collect(|&b, &w| {
        if w > 0.0 {
            ((b + w * (n - 1.0) / n) / w).sqrt()
        } else if b > 0.0 {
            f64::INFINITY
        } else {
            1.0
        }
    });
    Ok(rhat)
}

fn stack_error(e: ndarray::ShapeError) -> SelectionError {
    SelectionError::InvalidConfig(format!("cannot stack chain statistics: {e}"))
}

/// Largest R-hat, ignoring `NaN` entries. `None` when every entry is `NaN`.
pub fn max_rhat(rhat: &Array1<f64>) -> Option<f64> {
    let max = *rhat.max_skipnan();
    (!max.is_nan()).then_some(max)
}
