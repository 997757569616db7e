/*!
Conditional inclusion log-odds for every covariate.

For covariate `p` the log-odds are
`log P(γ_p = 1 | γ_-p, Y) − log P(γ_p = 0 | γ_-p, Y)`, i.e. the log Bayes factor
of the two nested models plus the prior log-odds of inclusion.

Let `B` be the active covariates followed by the always-included block,
`F = Xb_Bᵀ Xb_B + Λ` the ridged Gram matrix of that block, `L` its Cholesky factor,
`Zt = L⁻¹ Z_B` and `RSS = YY − s |Zt|²`, with `s` the shrinkage of the prior.
A single factorization of `F` serves every covariate:

- an inactive covariate `j` enters through its Schur complement
  `G_j = x_jᵀx_j + λ_j − |L⁻¹ Xb_Bᵀ x_j|²` and the squared whitened cross term
  `W_j² = (z_j − (L⁻¹ Xb_Bᵀ x_j)·Zt)² / G_j`;
- an active covariate is removed with the leave-one-out inverses of `F⁻¹`,
  except for a single active covariate, where the reduced model is the empty
  (or assumed-only) model and is known in closed form.
*/

use ndarray::{Array1, Axis};
use rand::RngCore;
use rand_distr::{Distribution, Gamma, StandardNormal};

use crate::error::{Result, SelectionError};
use crate::linalg::{
    cholesky, cholesky_inverse, gram_block, leave_one_out_inverses, log_det_cholesky,
    triangular_solve, triangular_solve_matrix,
};
use crate::model::{NormalLikelihoodSampler, EPSILON};
use crate::sample::ChainState;

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl NormalLikelihoodSampler {
    /// Computes the inclusion log-odds of every covariate for the pattern in `state`.
    ///
    /// # Errors
    ///
    /// [`SelectionError::DegenerateChain`] if every covariate is active, and
    /// [`SelectionError::CholeskyFailed`] if the active Gram matrix cannot be factorized.
    pub fn compute_log_odds(&self, state: &ChainState) -> Result<Array1<f64>> {
        Ok(self.log_odds_and_beta(state, None)?.0)
    }

    /// Inclusion probabilities `sigmoid(log_odds)`.
    pub fn compute_add_prob(&self, state: &ChainState) -> Result<Array1<f64>> {
        Ok(self.compute_log_odds(state)?.mapv(sigmoid))
    }

    /// Log-odds plus, when `beta_rng` is given, the coefficient vector of the current pattern.
    pub(crate) fn log_odds_and_beta(
        &self,
        state: &ChainState,
        beta_rng: Option<&mut dyn RngCore>,
    ) -> Result<(Array1<f64>, Option<Array1<f64>>)> {
        let p = self.p;
        let active = &state.active;
        let k = active.len();
        if k >= p {
            return Err(SelectionError::DegenerateChain {
                num_active: k,
                num_covariates: p,
            });
        }

        let inactive: Vec<usize> = (0..p).filter(|&j| !state.gamma[j]).collect();
        let activeb = self.activeb(active);
        let s = self.prior.shrinkage();
        let half_n_nu0 = 0.5 * self.n_nu0;
        let log_h = &state.log_h_ratio;
        let mut log_odds = Array1::<f64>::zeros(p);

        if activeb.is_empty() {
            for &j in &inactive {
                let g = self.xx_diag[j] + self.ridge[j];
                let w_sq = self.z[j].powi(2) / (g + EPSILON);
                log_odds[j] = log_h[j]
                    + self.inactive_offset(g)
                    - half_n_nu0 * log1m(s * w_sq / self.yy);
            }
            let beta = beta_rng.map(|_| Array1::zeros(p + self.pa));
            return Ok((log_odds, beta));
        }

        let mut f = gram_block(self.xb.view(), self.xx.as_ref(), &activeb, &activeb);
        for (r, &col) in activeb.iter().enumerate() {
            f[[r, r]] += self.ridge[col];
        }
        let l = cholesky(f.view())?;
        let z_b = self.z.select(Axis(0), &activeb);
        let zt = triangular_solve(l.view(), z_b.view(), true)?;
        let zt_sq = zt.dot(&zt);
        let rss = self.yy - s * zt_sq;
        let log_rss = rss.max(EPSILON).ln();

        // Inactive covariates: one more column appended to the active block.
        if !inactive.is_empty() {
            let cross = gram_block(self.xb.view(), self.xx.as_ref(), &activeb, &inactive);
            let xt = triangular_solve_matrix(l.view(), cross.view(), true)?;
            for (col, &j) in inactive.iter().enumerate() {
                let xt_j = xt.column(col);
                let g = self.xx_diag[j] + self.ridge[j] - xt_j.dot(&xt_j);
                let w_sq = (self.z[j] - xt_j.dot(&zt)).powi(2) / (g + EPSILON);
                log_odds[j] =
                    log_h[j] + self.inactive_offset(g) - half_n_nu0 * log1m(s * w_sq / rss);
            }
        }

        // Active covariates: the reduced model drops one column of the block.
        let half_log_det = log_det_cholesky(l.view());
        if k == 1 {
            let (zt_sq_loo, half_log_det_loo) = match &self.assumed {
                Some(assumed) => (assumed.zt_sq, assumed.half_log_det),
                None => (0.0, 0.0),
            };
            let i = active[0];
            log_odds[i] = log_h[i]
                + self.prior.log_odds_offset(half_log_det - half_log_det_loo)
                + half_n_nu0 * ((self.yy - s * zt_sq_loo).max(EPSILON).ln() - log_rss);
        } else if k >= 2 {
            let f_inv = cholesky_inverse(l.view())?;
            let loo = leave_one_out_inverses(f_inv.view(), k);
            for (pos, (&i, f_loo)) in active.iter().zip(loo.iter()).enumerate() {
                let keep: Vec<usize> = (0..activeb.len()).filter(|&r| r != pos).collect();
                let z_loo = z_b.select(Axis(0), &keep);
                let zt_sq_loo = z_loo.dot(&f_loo.dot(&z_loo));
                // det F₋ᵢ = det F · (F⁻¹)ᵢᵢ
                let half_log_det_ratio = -0.5 * f_inv[[pos, pos]].max(EPSILON).ln();
                log_odds[i] = log_h[i]
                    + self.prior.log_odds_offset(half_log_det_ratio)
                    + half_n_nu0 * ((self.yy - s * zt_sq_loo).max(EPSILON).ln() - log_rss);
            }
        }

        let beta = match beta_rng {
            Some(rng) => {
                let mut coef = triangular_solve(l.t(), zt.view(), false)? * s;
                if self.sample_betas {
                    // σ² ~ InvGamma((N + ν₀)/2, RSS/2), β ~ N(mean, s σ² F⁻¹).
                    let sigma_sq = 1.0 / precision_posterior(half_n_nu0, rss)?.sample(&mut *rng);
                    let noise: Array1<f64> =
                        Array1::from_shape_fn(activeb.len(), |_| StandardNormal.sample(&mut *rng));
                    let whitened = triangular_solve(l.t(), noise.view(), false)?;
                    coef = coef + whitened * (s * sigma_sq).sqrt();
                }
                let mut beta = Array1::<f64>::zeros(p + self.pa);
                for (r, &col) in activeb.iter().enumerate() {
                    beta[col] = coef[r];
                }
                Some(beta)
            }
            None => None,
        };

        Ok((log_odds, beta))
    }

    /// Prior offset for adding a column whose Schur complement is `g`.
    fn inactive_offset(&self, g: f64) -> f64 {
        if self.prior.uses_log_det() {
            self.prior.log_odds_offset(0.5 * g.max(EPSILON).ln())
        } else {
            self.prior.log_odds_offset(0.0)
        }
    }

    /**
    Log marginal likelihood of the inclusion pattern `gamma`, up to a constant
    shared by all patterns.

    This factorizes the full active block from scratch, so it costs O(k³) per
    call and is meant for model comparison and checks rather than sampling.
    */
    pub fn log_evidence(&self, gamma: &[bool]) -> Result<f64> {
        if gamma.len() != self.p {
            return Err(SelectionError::ShapeMismatch {
                what: "gamma",
                expected: self.p,
                found: gamma.len(),
            });
        }
        let active: Vec<usize> = (0..self.p).filter(|&j| gamma[j]).collect();
        let activeb = self.activeb(&active);
        let s = self.prior.shrinkage();

        let (zt_sq, half_log_det) = if activeb.is_empty() {
            (0.0, 0.0)
        } else {
            let mut f = gram_block(self.xb.view(), self.xx.as_ref(), &activeb, &activeb);
            for (r, &col) in activeb.iter().enumerate() {
                f[[r, r]] += self.ridge[col];
            }
            let l = cholesky(f.view())?;
            let zt = triangular_solve(l.view(), self.z.select(Axis(0), &activeb).view(), true)?;
            (zt.dot(&zt), log_det_cholesky(l.view()))
        };
        let half_log_det_assumed = self.assumed.as_ref().map_or(0.0, |a| a.half_log_det);

        // The isotropic offset is affine in the log-det ratio, so summing the
        // per-covariate offset at zero and subtracting the block ratio once is exact.
        let mut log_ev = active.len() as f64 * self.prior.log_odds_offset(0.0);
        if self.prior.uses_log_det() {
            log_ev -= half_log_det - half_log_det_assumed;
        }
        log_ev -= 0.5 * self.n_nu0 * (self.yy - s * zt_sq).max(EPSILON).ln();
        Ok(log_ev)
    }
}

/// `log(1 − x)` for a ratio that must stay below one.
fn log1m(x: f64) -> f64 {
    (-x.min(1.0 - f64::EPSILON)).ln_1p()
}

/// Posterior of the noise precision `1/σ²`: `Gamma((N + ν₀)/2, scale 2/RSS)`.
fn precision_posterior(half_n_nu0: f64, rss: f64) -> Result<Gamma<f64>> {
    Gamma::new(half_n_nu0, 2.0 / rss.max(EPSILON)).map_err(|e| {
        SelectionError::InvalidConfig(format!(
            "noise posterior Gamma({half_n_nu0}, 2/{rss}): {e}"
        ))
    })
}
