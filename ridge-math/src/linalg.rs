// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Symmetric Positive-Definite Solves
//!
//! The ridge normal equations `(X^T·X + λI)·W = X^T·Y` always produce a
//! symmetric system. It is positive definite whenever `λ > 0`, and only
//! positive semi-definite when `λ = 0` and the design is rank-deficient.
//!
//! Solving goes through a Cholesky factorization `A = L·L^T` followed by
//! forward and back substitution. Instead of clamping small pivots (which
//! silently regularizes), a pivot that collapses below a relative tolerance
//! is reported as an error so the caller can surface it.
//!
//! ## Cost
//!
//! - Factorization: O(d³/3)
//! - Substitution: O(d²·k) for a `d × k` right-hand side

use nalgebra::{Cholesky, DMatrix};
use thiserror::Error;

/// Relative pivot tolerance.
///
/// A squared Cholesky pivot `L[i][i]²` smaller than
/// `PIVOT_RTOL · max_i |A[i][i]|` marks the system as numerically singular.
/// This corresponds to a condition number around `1e12`.
pub const PIVOT_RTOL: f64 = 1e-12;

/// Failure modes of a symmetric solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("system matrix is not square ({rows}×{cols})")]
    NotSquare { rows: usize, cols: usize },

    #[error("right-hand side has {rhs_rows} rows but the system has dimension {dim}")]
    DimensionMismatch { dim: usize, rhs_rows: usize },

    #[error("system matrix of dimension {dim} is not positive definite")]
    NotPositiveDefinite { dim: usize },

    #[error("pivot {pivot} collapsed to {value:e} (tolerance {tolerance:e})")]
    IllConditioned {
        pivot: usize,
        value: f64,
        tolerance: f64,
    },

    #[error("solution contains non-finite values")]
    NonFinite,
}

/// Solve `A·X = B` for symmetric positive-definite `A`.
///
/// `A` is `d × d`, `B` is `d × k`. Returns `X` as `d × k`.
///
/// Only the lower triangle of `A` is read by the factorization, so a
/// matrix that is symmetric up to rounding is handled consistently.
pub fn cholesky_solve(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>, LinalgError> {
    let (rows, cols) = a.shape();
    if rows != cols {
        return Err(LinalgError::NotSquare { rows, cols });
    }
    if b.nrows() != rows {
        return Err(LinalgError::DimensionMismatch {
            dim: rows,
            rhs_rows: b.nrows(),
        });
    }

    let scale = a.diagonal().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tolerance = PIVOT_RTOL * scale;

    let chol = Cholesky::new(a.clone()).ok_or(LinalgError::NotPositiveDefinite { dim: rows })?;

    // Cholesky::new only rejects non-positive pivots; near-zero ones still pass.
    let l = chol.l_dirty();
    for i in 0..rows {
        let pivot_sq = l[(i, i)] * l[(i, i)];
        if !(pivot_sq > tolerance) {
            return Err(LinalgError::IllConditioned {
                pivot: i,
                value: pivot_sq,
                tolerance,
            });
        }
    }

    let x = chol.solve(b);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LinalgError::NonFinite);
    }
    Ok(x)
}

/// Check that a square matrix is symmetric to within an absolute tolerance.
pub fn is_symmetric(m: &DMatrix<f64>, tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > tol {
                return false;
            }
        }
    }
    true
}
