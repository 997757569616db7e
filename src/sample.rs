//! The mutable state of one chain and the snapshot it emits after every move.

use ndarray::Array1;

/// The transition taken by the last move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Toggle the inclusion of covariate `p`.
    Flip(usize),
    /// Redraw the shared inclusion rate `h` from its conditional posterior.
    UpdateH,
}

/// Per-step state of a variable-selection chain.
///
/// Every field is declared up front. Fields that only exist for some
/// configurations (`beta`, the Beta posterior of `h`) are `Option`s.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    /// Inclusion indicator per covariate.
    pub gamma: Vec<bool>,
    /// Sorted indices where `gamma` is true.
    pub active: Vec<usize>,
    /// Conditional probability that each covariate is included, given all others.
    pub add_prob: Array1<f64>,
    /// Unnormalized proposal over the next move. Entry `P` is the `h`-update
    /// weight and is present only when `h` is inferred.
    pub i_prob: Array1<f64>,
    /// Coefficients over covariates followed by the always-included block.
    pub beta: Option<Array1<f64>>,
    /// Prior log-odds `log h − log(1 − h)` per covariate.
    pub log_h_ratio: Array1<f64>,
    /// Posterior Beta parameters of `h` given the current active set.
    pub h_alpha: Option<f64>,
    pub h_beta: Option<f64>,
    /// Relative proposal mass of the `h`-update move.
    pub xi: f64,
    /// Importance weight `1 / mean(i_prob)`.
    pub weight: f64,
    /// Last move, `None` before the first one.
    pub idx: Option<Move>,
    /// Number of moves taken.
    pub t: usize,
    /// Moves during which `xi` adapts.
    pub adapt_steps: usize,
}

/// What a [`ChainState`] hands to a sample container.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub gamma: Vec<bool>,
    pub add_prob: Array1<f64>,
    pub beta: Option<Array1<f64>>,
    pub weight: f64,
    /// Current `log h − log(1 − h)`, present only when `h` is inferred.
    pub log_h_ratio: Option<f64>,
}

/// Initial proposal mass of the `h`-update move.
pub(crate) const XI_INIT: f64 = 5.0;

impl ChainState {
    pub(crate) fn new(
        gamma: Vec<bool>,
        log_h_ratio: Array1<f64>,
        h_prior: Option<(f64, f64)>,
        beta: Option<Array1<f64>>,
    ) -> Self {
        let p = gamma.len();
        let active = gamma
            .iter()
            .enumerate()
            .filter_map(|(i, &g)| g.then_some(i))
            .collect();
        Self {
            gamma,
            active,
            add_prob: Array1::zeros(p),
            i_prob: Array1::zeros(p + usize::from(h_prior.is_some())),
            beta,
            log_h_ratio,
            h_alpha: h_prior.map(|(a, _)| a),
            h_beta: h_prior.map(|(_, b)| b),
            xi: XI_INIT,
            weight: 0.0,
            idx: None,
            t: 0,
            adapt_steps: 0,
        }
    }

    pub fn p(&self) -> usize {
        self.gamma.len()
    }

    pub fn num_active(&self) -> usize {
        self.active.len()
    }

    /// Whether the shared inclusion rate is inferred by this chain.
    pub fn infers_h(&self) -> bool {
        self.h_alpha.is_some()
    }

    /// Current shared inclusion rate when it is inferred.
    pub fn h(&self) -> Option<f64> {
        if self.infers_h() {
            self.log_h_ratio.first().map(|r| 1.0 / (1.0 + (-r).exp()))
        } else {
            None
        }
    }

    /// Toggles covariate `p` and keeps `active` sorted.
    pub(crate) fn flip(&mut self, p: usize) {
        self.gamma[p] = !self.gamma[p];
        match self.active.binary_search(&p) {
            Ok(pos) => {
                self.active.remove(pos);
            }
            Err(pos) => self.active.insert(pos, p),
        }
    }

    /// Checks that `active` lists exactly the indices where `gamma` is true.
    pub fn is_consistent(&self) -> bool {
        self.active.windows(2).all(|w| w[0] < w[1])
            && self.active.len() == self.gamma.iter().filter(|&&g| g).count()
            && self.active.iter().all(|&i| self.gamma[i])
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            gamma: self.gamma.clone(),
            add_prob: self.add_prob.clone(),
            beta: self.beta.clone(),
            weight: self.weight,
            log_h_ratio: if self.infers_h() {
                self.log_h_ratio.first().copied()
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_keeps_active_sorted() {
        let mut state = ChainState::new(vec![false; 6], Array1::zeros(6), None, None);
        for p in [4, 1, 5, 1, 0] {
            state.flip(p);
            assert!(state.is_consistent());
        }
        assert_eq!(state.active, vec![0, 4, 5]);
        assert_eq!(state.num_active(), 3);
    }

    #[test]
    fn test_optional_fields_follow_configuration() {
        let fixed = ChainState::new(vec![false; 3], Array1::zeros(3), None, None);
        assert_eq!(fixed.i_prob.len(), 3);
        assert!(fixed.h().is_none());
        assert!(fixed.snapshot().log_h_ratio.is_none());

        let inferred = ChainState::new(
            vec![true, false, false],
            Array1::zeros(3),
            Some((1.0, 9.0)),
            Some(Array1::zeros(4)),
        );
        assert_eq!(inferred.active, vec![0]);
        assert_eq!(inferred.i_prob.len(), 4);
        assert_eq!(inferred.h(), Some(0.5));
        assert_eq!(inferred.snapshot().log_h_ratio, Some(0.0));
        assert_eq!(inferred.snapshot().beta.map(|b| b.len()), Some(4));
    }
}
