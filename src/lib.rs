/*!
Bayesian variable selection for linear regression.

A chain over inclusion indicators γ ∈ {0,1}^P visits covariate subsets in
proportion to their closed-form marginal likelihood under a Normal likelihood
with an Inverse-Gamma prior on the noise variance. Every step updates the
inclusion log-odds of all covariates at once from a single Cholesky
factorization of the active block, and a tempered Gibbs move picks the next
coordinate to update.

- [`model::NormalLikelihoodSampler`] holds the data and hyperparameters.
- [`gibbs`] advances a [`sample::ChainState`] by one move.
- [`core::VariableSelector`] runs seeded chains in parallel and merges them
  into a [`core::SelectionSummary`].
*/

pub mod config;
pub mod container;
pub mod core;
pub mod distributions;
pub mod error;
pub mod gibbs;
pub mod io;
pub mod linalg;
pub mod log_odds;
pub mod model;
pub mod prior;
pub mod sample;
pub mod stats;
