/*!
Configuration of the variable-selection sampler.

[`SamplerConfig`] gathers every hyperparameter recognised by
[`NormalLikelihoodSampler`](crate::model::NormalLikelihoodSampler). It starts
from sensible defaults and is adjusted with consuming `with_*` setters:

```rust
use mini_bvs::config::{InclusionPrior, PriorKind, SamplerConfig};

let config = SamplerConfig::default()
    .with_prior(PriorKind::GPrior)
    .with_c(50.0)
    .with_inclusion(InclusionPrior::InferredBeta { alpha: 1.0, beta: 9.0 });
assert!(config.inclusion.is_inferred());
```
*/

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Beta, Distribution};

use crate::error::{Result, SelectionError};
use crate::prior::{CoefficientPrior, GPrior, Isotropic};

/// Which coefficient prior to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorKind {
    #[default]
    Isotropic,
    GPrior,
}

impl FromStr for PriorKind {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "isotropic" => Ok(PriorKind::Isotropic),
            "gprior" => Ok(PriorKind::GPrior),
            other => Err(SelectionError::UnknownPrior(other.to_string())),
        }
    }
}

impl fmt::Display for PriorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorKind::Isotropic => write!(f, "isotropic"),
            PriorKind::GPrior => write!(f, "gprior"),
        }
    }
}

/// Prior on the inclusion rate `h`.
#[derive(Debug, Clone, PartialEq)]
pub enum InclusionPrior {
    /// Expected number `S` of included covariates; `h = S / P` for every covariate.
    FixedRate(f64),
    /// One fixed inclusion probability per covariate.
    FixedPerCovariate(Array1<f64>),
    /// `h ~ Beta(alpha, beta)`, shared by all covariates and inferred by the chain.
    InferredBeta { alpha: f64, beta: f64 },
}

impl InclusionPrior {
    pub fn is_inferred(&self) -> bool {
        matches!(self, InclusionPrior::InferredBeta { .. })
    }

    /// Beta hyperparameters when `h` is inferred.
    pub fn beta_params(&self) -> Option<(f64, f64)> {
        match self {
            InclusionPrior::InferredBeta { alpha, beta } => Some((*alpha, *beta)),
            _ => None,
        }
    }

    pub(crate) fn validate(&self, p: usize) -> Result<()> {
        match self {
            InclusionPrior::FixedRate(s) => {
                if !(s.is_finite() && *s > 0.0 && *s < p as f64) {
                    return Err(SelectionError::InvalidConfig(format!(
                        "S must satisfy 0 < S < P = {p}, got {s}"
                    )));
                }
            }
            InclusionPrior::FixedPerCovariate(h) => {
                if h.len() != p {
                    return Err(SelectionError::ShapeMismatch {
                        what: "per-covariate inclusion probabilities",
                        expected: p,
                        found: h.len(),
                    });
                }
                if let Some(bad) = h.iter().find(|&&v| !(v > 0.0 && v < 1.0)) {
                    return Err(SelectionError::InvalidConfig(format!(
                        "per-covariate inclusion probabilities must lie in (0, 1), got {bad}"
                    )));
                }
            }
            InclusionPrior::InferredBeta { alpha, beta } => {
                if !(alpha.is_finite() && beta.is_finite() && *alpha > 0.0 && *beta > 0.0) {
                    return Err(SelectionError::InvalidConfig(format!(
                        "Beta hyperparameters must be positive, got ({alpha}, {beta})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Prior log-odds `log h − log(1 − h)` per covariate at the start of a chain.
    pub fn initial_log_h_ratio(&self, p: usize) -> Array1<f64> {
        match self {
            InclusionPrior::FixedRate(s) => {
                let h = s / p as f64;
                Array1::from_elem(p, h.ln() - (-h).ln_1p())
            }
            InclusionPrior::FixedPerCovariate(h) => h.mapv(|h| h.ln() - (-h).ln_1p()),
            InclusionPrior::InferredBeta { alpha, beta } => {
                let h = alpha / (alpha + beta);
                Array1::from_elem(p, h.ln() - (-h).ln_1p())
            }
        }
    }

    /// Draws a new shared `log h − log(1 − h)` from `Beta(α + k, β + P − k)`.
    ///
    /// Fixed priors have nothing to update and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`SelectionError::InvalidConfig`] when the posterior shapes are not a
    /// valid Beta distribution, or when `num_active` exceeds `p`.
    pub fn resample_log_h_ratio<R: Rng + ?Sized>(
        &self,
        num_active: usize,
        p: usize,
        rng: &mut R,
    ) -> Result<Option<f64>> {
        let InclusionPrior::InferredBeta { alpha, beta } = self else {
            return Ok(None);
        };
        let num_inactive = p.checked_sub(num_active).ok_or_else(|| {
            SelectionError::InvalidConfig(format!(
                "{num_active} active covariates out of {p}"
            ))
        })?;
        let a = alpha + num_active as f64;
        let b = beta + num_inactive as f64;
        let dist = Beta::new(a, b).map_err(|e| {
            SelectionError::InvalidConfig(format!("h posterior Beta({a}, {b}): {e}"))
        })?;
        let h: f64 = dist.sample(rng).clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        Ok(Some(h.ln() - (-h).ln_1p()))
    }
}

impl Default for InclusionPrior {
    fn default() -> Self {
        InclusionPrior::FixedRate(5.0)
    }
}

/// Hyperparameters and options of [`NormalLikelihoodSampler`](crate::model::NormalLikelihoodSampler).
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Covariates that are always included (N × Pa).
    pub x_assumed: Option<Array2<f64>>,
    pub inclusion: InclusionPrior,
    pub prior: PriorKind,
    /// Coefficient precision of the isotropic prior.
    pub tau: f64,
    /// Intercept precision of the isotropic prior.
    pub tau_intercept: f64,
    /// Shrinkage constant of the g-prior.
    pub c: f64,
    pub nu0: f64,
    pub lambda0: f64,
    /// Exploration floor; every covariate keeps at least `explore / P` proposal mass.
    pub explore: f64,
    /// Target fraction of moves that update `h` when it is inferred.
    pub xi_target: f64,
    pub include_intercept: bool,
    pub precompute_xx: bool,
    pub compute_betas: bool,
    /// Draw coefficients from their conditional posterior instead of reporting the mean.
    pub sample_betas: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            x_assumed: None,
            inclusion: InclusionPrior::default(),
            prior: PriorKind::Isotropic,
            tau: 0.01,
            tau_intercept: 1.0e-4,
            c: 100.0,
            nu0: 0.0,
            lambda0: 0.0,
            explore: 5.0,
            xi_target: 0.2,
            include_intercept: true,
            precompute_xx: false,
            compute_betas: false,
            sample_betas: false,
        }
    }
}

impl SamplerConfig {
    pub fn with_x_assumed(mut self, x_assumed: Array2<f64>) -> Self {
        self.x_assumed = Some(x_assumed);
        self
    }

    pub fn with_inclusion(mut self, inclusion: InclusionPrior) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// Shorthand for [`InclusionPrior::FixedRate`].
    pub fn with_s(self, s: f64) -> Self {
        self.with_inclusion(InclusionPrior::FixedRate(s))
    }

    pub fn with_prior(mut self, prior: PriorKind) -> Self {
        self.prior = prior;
        self
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_tau_intercept(mut self, tau_intercept: f64) -> Self {
        self.tau_intercept = tau_intercept;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_nu0(mut self, nu0: f64) -> Self {
        self.nu0 = nu0;
        self
    }

    pub fn with_lambda0(mut self, lambda0: f64) -> Self {
        self.lambda0 = lambda0;
        self
    }

    pub fn with_explore(mut self, explore: f64) -> Self {
        self.explore = explore;
        self
    }

    pub fn with_xi_target(mut self, xi_target: f64) -> Self {
        self.xi_target = xi_target;
        self
    }

    pub fn with_intercept(mut self, include_intercept: bool) -> Self {
        self.include_intercept = include_intercept;
        self
    }

    pub fn with_precompute_xx(mut self, precompute_xx: bool) -> Self {
        self.precompute_xx = precompute_xx;
        self
    }

    pub fn with_compute_betas(mut self, compute_betas: bool) -> Self {
        self.compute_betas = compute_betas;
        self
    }

    pub fn with_sample_betas(mut self, sample_betas: bool) -> Self {
        self.sample_betas = sample_betas;
        self
    }

    /// Whether samples carry a coefficient vector.
    pub fn betas_enabled(&self) -> bool {
        self.compute_betas || self.sample_betas
    }

    /// Checks every scalar hyperparameter and the inclusion prior against `p` covariates.
    pub fn validate(&self, p: usize) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SelectionError::InvalidConfig(format!(
                    "{name} must satisfy {name} > 0.0, got {value}"
                )))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SelectionError::InvalidConfig(format!(
                    "{name} must satisfy {name} >= 0.0, got {value}"
                )))
            }
        }

        self.inclusion.validate(p)?;
        match self.prior {
            PriorKind::Isotropic => {
                positive("tau", self.tau)?;
                positive("tau_intercept", self.tau_intercept)?;
            }
            PriorKind::GPrior => positive("c", self.c)?,
        }
        positive("explore", self.explore)?;
        non_negative("nu0", self.nu0)?;
        non_negative("lambda0", self.lambda0)?;
        if !(self.xi_target > 0.0 && self.xi_target < 1.0) {
            return Err(SelectionError::InvalidConfig(format!(
                "xi_target must satisfy 0 < xi_target < 1, got {}",
                self.xi_target
            )));
        }
        Ok(())
    }

    pub(crate) fn build_prior(&self) -> Box<dyn CoefficientPrior> {
        match self.prior {
            PriorKind::Isotropic => Box::new(Isotropic::new(self.tau, self.tau_intercept)),
            PriorKind::GPrior => Box::new(GPrior::new(self.c)),
        }
    }
}
