//! Error type shared by the sampler, the driver and the I/O helpers.

use thiserror::Error;

/// Everything that can go wrong while building or running a variable-selection chain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    /// A hyperparameter or option lies outside its admissible range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two inputs disagree on a dimension.
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unknown prior '{0}', expected 'isotropic' or 'gprior'")]
    UnknownPrior(String),

    /// The chain selected every covariate. This points to a misspecified prior
    /// or to data without signal, and the chain cannot continue.
    #[error(
        "the chain has been driven into a regime where {num_active} of {num_covariates} \
         covariates are active; check the inclusion prior and whether the data carries signal"
    )]
    DegenerateChain {
        num_active: usize,
        num_covariates: usize,
    },

    #[error("cholesky factorization of a {dim}x{dim} matrix failed after {attempts} jitter attempts")]
    CholeskyFailed { dim: usize, attempts: usize },

    /// A triangular factor has a zero on its diagonal.
    #[error("triangular solve against a singular {dim}x{dim} factor")]
    SingularFactor { dim: usize },

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SelectionError {
    fn from(err: std::io::Error) -> Self {
        SelectionError::Io(err.to_string())
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for SelectionError {
    fn from(err: csv::Error) -> Self {
        SelectionError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SelectionError>;
