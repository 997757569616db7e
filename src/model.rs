/*!
Problem constants of the Normal-likelihood variable-selection model.

[`NormalLikelihoodSampler`] is built once from the data and a
[`SamplerConfig`] and is immutable afterwards, so it can be shared read-only
(e.g. through an `Arc`) by any number of independent chains.

The likelihood is `Y ~ N(Xb β, σ²)` with `σ² ~ InvGamma(ν₀/2, ν₀λ₀/2)`, where the
working design matrix `Xb = [X ‖ X_assumed ‖ 1]` appends the always-included
block to the `P` selectable covariates.

# Examples

```rust
use mini_bvs::config::SamplerConfig;
use mini_bvs::model::NormalLikelihoodSampler;
use ndarray::{Array1, Array2};

let x = Array2::from_shape_fn((20, 4), |(i, j)| ((i * 7 + j * 3) % 5) as f64 - 2.0);
let y = Array1::from_shape_fn(20, |i| x[[i, 1]] * 0.8);
let sampler = NormalLikelihoodSampler::new(x, y, SamplerConfig::default().with_s(1.0)).unwrap();
assert_eq!(sampler.p(), 4);
assert_eq!(sampler.num_assumed(), 1); // the intercept
```
*/

use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};

use crate::config::{InclusionPrior, SamplerConfig};
use crate::error::{Result, SelectionError};
use crate::linalg::{cholesky, gram_block, log_det_cholesky, triangular_solve};
use crate::prior::{CoefficientPrior, ColumnKind};
use crate::sample::ChainState;

/// Guards denominators derived from squared norms and determinants.
pub(crate) const EPSILON: f64 = 1.0e-18;

/// Precomputed factorization of the always-included block on its own.
#[derive(Debug, Clone)]
pub(crate) struct AssumedBlock {
    /// Column indices of the block in `Xb`.
    pub indices: Vec<usize>,
    /// `|L_a⁻¹ Z_a|²`.
    pub zt_sq: f64,
    /// `Σ log diag L_a`.
    pub half_log_det: f64,
}

/// Immutable model constants and hyperparameters.
#[derive(Debug)]
pub struct NormalLikelihoodSampler {
    pub(crate) xb: Array2<f64>,
    pub(crate) z: Array1<f64>,
    pub(crate) yy: f64,
    pub(crate) xx: Option<Array2<f64>>,
    pub(crate) xx_diag: Array1<f64>,
    pub(crate) ridge: Array1<f64>,
    pub(crate) column_kinds: Vec<ColumnKind>,
    pub(crate) prior: Box<dyn CoefficientPrior>,
    pub(crate) inclusion: InclusionPrior,
    pub(crate) assumed: Option<AssumedBlock>,
    pub(crate) n: usize,
    pub(crate) p: usize,
    pub(crate) pa: usize,
    pub(crate) n_nu0: f64,
    pub(crate) explore: f64,
    pub(crate) xi_target: f64,
    pub(crate) compute_betas: bool,
    pub(crate) sample_betas: bool,
}

fn check_finite(what: &'static str, values: ArrayView2<f64>) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(SelectionError::InvalidConfig(format!(
            "{what} contains non-finite values"
        )))
    }
}

impl NormalLikelihoodSampler {
    /**
    Validates the inputs and precomputes every quantity the chain reuses.

    # Errors

    Returns [`SelectionError::ShapeMismatch`] when `y` or `x_assumed` do not have
    `N` rows, and [`SelectionError::InvalidConfig`] for empty or non-finite data
    or hyperparameters outside their admissible range.
    */
    pub fn new(x: Array2<f64>, y: Array1<f64>, config: SamplerConfig) -> Result<Self> {
        let (n, p) = x.dim();
        if n == 0 || p == 0 {
            return Err(SelectionError::InvalidConfig(format!(
                "X must be non-empty, got shape ({n}, {p})"
            )));
        }
        if y.len() != n {
            return Err(SelectionError::ShapeMismatch {
                what: "Y",
                expected: n,
                found: y.len(),
            });
        }
        check_finite("X", x.view())?;
        check_finite("Y", y.view().insert_axis(Axis(1)))?;
        config.validate(p)?;

        let ones = Array2::<f64>::ones((n, 1));
        let mut blocks = vec![x.view()];
        let mut column_kinds = vec![ColumnKind::Covariate; p];
        if let Some(xa) = config.x_assumed.as_ref() {
            if xa.nrows() != n {
                return Err(SelectionError::ShapeMismatch {
                    what: "X_assumed rows",
                    expected: n,
                    found: xa.nrows(),
                });
            }
            check_finite("X_assumed", xa.view())?;
            blocks.push(xa.view());
            column_kinds.extend(std::iter::repeat(ColumnKind::Assumed).take(xa.ncols()));
        }
        if config.include_intercept {
            blocks.push(ones.view());
            column_kinds.push(ColumnKind::Intercept);
        }
        let xb = concatenate(Axis(1), &blocks).map_err(|e| {
            SelectionError::InvalidConfig(format!("failed to assemble design matrix: {e}"))
        })?;
        let pa = xb.ncols() - p;

        let prior = config.build_prior();
        let ridge = Array1::from_iter(column_kinds.iter().map(|&kind| prior.ridge(kind)));
        let z = xb.t().dot(&y);
        let yy = y.dot(&y) + config.nu0 * config.lambda0;
        let xx = config.precompute_xx.then(|| xb.t().dot(&xb));
        let xx_diag = match xx.as_ref() {
            Some(xx) => xx.diag().to_owned(),
            None => xb.map_axis(Axis(0), |col| col.dot(&col)),
        };

        let assumed = if pa > 0 {
            let indices: Vec<usize> = (p..p + pa).collect();
            let mut f = gram_block(xb.view(), xx.as_ref(), &indices, &indices);
            for (r, &col) in indices.iter().enumerate() {
                f[[r, r]] += ridge[col];
            }
            let l = cholesky(f.view())?;
            let zt = triangular_solve(l.view(), z.select(Axis(0), &indices).view(), true)?;
            Some(AssumedBlock {
                indices,
                zt_sq: zt.dot(&zt),
                half_log_det: log_det_cholesky(l.view()),
            })
        } else {
            None
        };

        let sampler = Self {
            xb,
            z,
            yy,
            xx,
            xx_diag,
            ridge,
            column_kinds,
            prior,
            inclusion: config.inclusion.clone(),
            assumed,
            n,
            p,
            pa,
            n_nu0: n as f64 + config.nu0,
            explore: config.explore / p as f64,
            xi_target: config.xi_target,
            compute_betas: config.betas_enabled(),
            sample_betas: config.sample_betas,
        };

        match &sampler.inclusion {
            InclusionPrior::FixedRate(s) => log::info!(
                "initialized sampler with {} prior and (N, P, Pa, S) = ({n}, {p}, {pa}, {s:.1})",
                sampler.prior.name()
            ),
            InclusionPrior::FixedPerCovariate(_) => log::info!(
                "initialized sampler with {} prior, per-covariate inclusion and (N, P, Pa) = ({n}, {p}, {pa})",
                sampler.prior.name()
            ),
            InclusionPrior::InferredBeta { alpha, beta } => log::info!(
                "initialized sampler with {} prior, inferred inclusion rate Beta({alpha:.2}, {beta:.2}) and (N, P, Pa) = ({n}, {p}, {pa})",
                sampler.prior.name()
            ),
        }
        Ok(sampler)
    }

    /// Number of observations.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of selectable covariates.
    pub fn p(&self) -> usize {
        self.p
    }

    /// Number of always-included columns (assumed covariates plus intercept).
    pub fn num_assumed(&self) -> usize {
        self.pa
    }

    pub fn column_kinds(&self) -> &[ColumnKind] {
        &self.column_kinds
    }

    /// Active covariates followed by the always-included block, as column indices of `Xb`.
    pub(crate) fn activeb(&self, active: &[usize]) -> Vec<usize> {
        let mut activeb = Vec::with_capacity(active.len() + self.pa);
        activeb.extend_from_slice(active);
        if let Some(assumed) = &self.assumed {
            activeb.extend_from_slice(&assumed.indices);
        }
        activeb
    }

    /// Builds a chain state for the inclusion pattern `gamma` with probabilities not yet computed.
    pub fn state_from_gamma(&self, gamma: Vec<bool>) -> Result<ChainState> {
        if gamma.len() != self.p {
            return Err(SelectionError::ShapeMismatch {
                what: "gamma",
                expected: self.p,
                found: gamma.len(),
            });
        }
        Ok(ChainState::new(
            gamma,
            self.inclusion.initial_log_h_ratio(self.p),
            self.inclusion.beta_params(),
            self.compute_betas.then(|| Array1::zeros(self.p + self.pa)),
        ))
    }
}
