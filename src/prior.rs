//! Coefficient priors.
//!
//! Both supported priors share the same log-odds code path. The differences are
//! captured by three capabilities: the ridge added to the Gram diagonal, the
//! log-odds offset contributed by one covariate, and the shrinkage applied to the
//! projected response.

use std::fmt::Debug;

/// Role of a column in the working design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// A covariate whose inclusion is sampled.
    Covariate,
    /// A user-supplied covariate that is always included.
    Assumed,
    /// The always-included intercept column.
    Intercept,
}

/// Capability interface implemented by the coefficient priors.
pub trait CoefficientPrior: Debug + Send + Sync {
    /// Value added to the Gram diagonal for a column of the given kind.
    fn ridge(&self, kind: ColumnKind) -> f64;

    /// Log-odds contribution of one covariate besides the likelihood term.
    ///
    /// `half_log_det_ratio` is `½ log det(F₊) − ½ log det(F₋)` of the ridged
    /// Gram matrices with and without the covariate. It is only evaluated by
    /// priors for which [`CoefficientPrior::uses_log_det`] is true.
    fn log_odds_offset(&self, half_log_det_ratio: f64) -> f64;

    /// Whether [`CoefficientPrior::log_odds_offset`] depends on the log-determinant ratio.
    fn uses_log_det(&self) -> bool;

    /// Factor multiplying the projected response `Zᵀ F⁻¹ Z` in the residual sum of squares.
    fn shrinkage(&self) -> f64;

    fn name(&self) -> &'static str;
}

/// Independent Gaussian prior `β_j ~ N(0, σ²/τ)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Isotropic {
    pub tau: f64,
    pub tau_intercept: f64,
    half_log_tau: f64,
}

impl Isotropic {
    pub fn new(tau: f64, tau_intercept: f64) -> Self {
        Self {
            tau,
            tau_intercept,
            half_log_tau: 0.5 * tau.ln(),
        }
    }
}

impl CoefficientPrior for Isotropic {
    fn ridge(&self, kind: ColumnKind) -> f64 {
        match kind {
            ColumnKind::Covariate | ColumnKind::Assumed => self.tau,
            ColumnKind::Intercept => self.tau_intercept,
        }
    }

    fn log_odds_offset(&self, half_log_det_ratio: f64) -> f64 {
        self.half_log_tau - half_log_det_ratio
    }

    fn uses_log_det(&self) -> bool {
        true
    }

    fn shrinkage(&self) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        "isotropic"
    }
}

/// Zellner's g-prior `β ~ N(0, c σ² (XᵀX)⁻¹)`, applied to the whole active block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GPrior {
    pub c: f64,
    c_one_c: f64,
    log_one_c_sqrt: f64,
}

impl GPrior {
    pub fn new(c: f64) -> Self {
        Self {
            c,
            c_one_c: c / (1.0 + c),
            log_one_c_sqrt: 0.5 * c.ln_1p(),
        }
    }
}

impl CoefficientPrior for GPrior {
    fn ridge(&self, _kind: ColumnKind) -> f64 {
        0.0
    }

    fn log_odds_offset(&self, _half_log_det_ratio: f64) -> f64 {
        -self.log_one_c_sqrt
    }

    fn uses_log_det(&self) -> bool {
        false
    }

    fn shrinkage(&self) -> f64 {
        self.c_one_c
    }

    fn name(&self) -> &'static str {
        "gprior"
    }
}
