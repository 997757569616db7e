//! Dense linear algebra used by the log-odds computation.
//!
//! The sampler keeps its data in `ndarray` and addresses matrices through index
//! lists, so callers never slice or mutate shared buffers. Factorizations and
//! triangular solves are delegated to `nalgebra`; the conversion happens here.

use nalgebra::{Cholesky, DMatrix};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Result, SelectionError};

/// Maximum number of jittered retries before a factorization is declared failed.
pub const MAX_JITTER_ATTEMPTS: usize = 8;

const MIN_JITTER: f64 = 1.0e-12;
const RELATIVE_JITTER: f64 = 1.0e-10;

fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn try_cholesky(a: ArrayView2<f64>, jitter: f64) -> Option<Array2<f64>> {
    let mut m = to_dmatrix(a);
    for i in 0..m.nrows() {
        m[(i, i)] += jitter;
    }
    let l = Cholesky::new(m)?.l();
    // A zero or non-finite pivot would poison every later solve.
    l.diagonal()
        .iter()
        .all(|d| d.is_finite() && *d > 0.0)
        .then(|| to_array2(&l))
}

/**
Computes the lower-triangular Cholesky factor `L` with `A = L Lᵀ`.

If `A` is not numerically positive definite, the factorization is retried with
a diagonal jitter that starts at `1e-10 · mean(diag A)` and grows tenfold per
attempt. After [`MAX_JITTER_ATTEMPTS`] failures, [`SelectionError::CholeskyFailed`]
is returned.

# Examples

```rust
use mini_bvs::linalg::cholesky;
use ndarray::arr2;

let a = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
let l = cholesky(a.view()).unwrap();
let back = l.dot(&l.t());
assert!((back[[0, 1]] - 2.0).abs() < 1e-12);
```
*/
pub fn cholesky(a: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(SelectionError::ShapeMismatch {
            what: "cholesky input columns",
            expected: n,
            found: a.ncols(),
        });
    }
    if let Some(l) = try_cholesky(a, 0.0) {
        return Ok(l);
    }

    let mean_diag = a.diag().mean().unwrap_or(0.0).abs();
    let mut jitter = if mean_diag.is_finite() {
        (RELATIVE_JITTER * mean_diag).max(MIN_JITTER)
    } else {
        MIN_JITTER
    };
    for attempt in 1..=MAX_JITTER_ATTEMPTS {
        if let Some(l) = try_cholesky(a, jitter) {
            log::warn!(
                "cholesky of {n}x{n} matrix required jitter {jitter:.3e} (attempt {attempt})"
            );
            return Ok(l);
        }
        jitter *= 10.0;
    }
    Err(SelectionError::CholeskyFailed {
        dim: n,
        attempts: MAX_JITTER_ATTEMPTS,
    })
}

fn solve(a: ArrayView2<f64>, b: DMatrix<f64>, lower: bool) -> Result<DMatrix<f64>> {
    let a = to_dmatrix(a);
    let x = if lower {
        a.solve_lower_triangular(&b)
    } else {
        a.solve_upper_triangular(&b)
    };
    x.ok_or(SelectionError::SingularFactor { dim: a.nrows() })
}

/// Solves `A x = b` for a triangular `A`.
///
/// With `lower = true` the lower triangle of `a` is used (forward substitution),
/// otherwise the upper triangle (backward substitution). Pass `l.t()` to solve
/// against the transpose of a lower Cholesky factor.
pub fn triangular_solve(
    a: ArrayView2<f64>,
    b: ArrayView1<f64>,
    lower: bool,
) -> Result<Array1<f64>> {
    let rhs = DMatrix::from_iterator(b.len(), 1, b.iter().copied());
    let x = solve(a, rhs, lower)?;
    Ok(Array1::from_iter(x.iter().copied()))
}

/// [`triangular_solve`] for a block of right-hand sides.
pub fn triangular_solve_matrix(
    a: ArrayView2<f64>,
    b: ArrayView2<f64>,
    lower: bool,
) -> Result<Array2<f64>> {
    Ok(to_array2(&solve(a, to_dmatrix(b), lower)?))
}

/// Dense inverse `(L Lᵀ)⁻¹` from a lower Cholesky factor.
pub fn cholesky_inverse(l: ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = l.nrows();
    let l_inv = solve(l, DMatrix::identity(n, n), true)?;
    Ok(to_array2(&(l_inv.transpose() * l_inv)))
}

/// `Σ log Lᵢᵢ`, i.e. half the log-determinant of `L Lᵀ`.
pub fn log_det_cholesky(l: ArrayView2<f64>) -> f64 {
    l.diag().iter().map(|d| d.ln()).sum()
}

/**
Given the dense inverse `F` of a symmetric k×k matrix `A`, returns for every
`i < n` the inverse of `A` with row and column `i` deleted:

`F_loo,i = F_{¬i,¬i} − F_{¬i,i} F_{i,¬i} / F_{i,i}`

Each result costs O(k²), so the whole batch replaces `n` separate O(k³)
refactorizations. Rows `n..k` are never removed; callers use them for blocks
that must stay in every reduced model.
*/
pub fn leave_one_out_inverses(f: ArrayView2<f64>, n: usize) -> Vec<Array2<f64>> {
    let k = f.nrows();
    (0..n.min(k))
        .map(|i| {
            let keep: Vec<usize> = (0..k).filter(|&j| j != i).collect();
            let f_ii = f[[i, i]];
            Array2::from_shape_fn((k - 1, k - 1), |(a, b)| {
                let (ja, jb) = (keep[a], keep[b]);
                f[[ja, jb]] - f[[ja, i]] * f[[i, jb]] / f_ii
            })
        })
        .collect()
}

/// Gram block `Xbᵀ[:, rows] Xb[:, cols]`, read from the precomputed Gram matrix when present.
pub fn gram_block(
    xb: ArrayView2<f64>,
    xx: Option<&Array2<f64>>,
    rows: &[usize],
    cols: &[usize],
) -> Array2<f64> {
    match xx {
        Some(xx) => xx.select(Axis(0), rows).select(Axis(1), cols),
        None => xb
            .select(Axis(1), rows)
            .t()
            .dot(&xb.select(Axis(1), cols)),
    }
}
