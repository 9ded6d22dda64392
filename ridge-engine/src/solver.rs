// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Closed-form ridge solve from accumulated statistics.
//!
//! Given `XXT` (d × d) and `YXT` (K × d):
//!
//! `W_raw = (XXT + λI)^{-1} · YXT^T`   (d × K)
//!
//! Solved via Cholesky in f64. This minimizes `‖Y − X·W‖² + λ‖W‖²`.
//! With bias augmentation the first row of `W_raw` is the intercept.
//!
//! A singular system is an error. No larger λ is substituted.

use nalgebra::DMatrix;
use ridge_math::cholesky_solve;

use crate::error::{dims, Result, RidgeError};

/// Output of a closed-form solve.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeSolution {
    /// Weight matrix (`input_dim × output_dim`)
    pub wout: DMatrix<f64>,
    /// Intercept (`1 × output_dim`), present only with bias augmentation
    pub bias: Option<DMatrix<f64>>,
}

/// Solve the regularized normal equations.
pub fn solve(
    xxt: &DMatrix<f64>,
    yxt: &DMatrix<f64>,
    ridge: f64,
    input_bias: bool,
) -> Result<RidgeSolution> {
    if !ridge.is_finite() || ridge < 0.0 {
        return Err(RidgeError::InvalidConfig(format!(
            "ridge must be finite and non-negative, got {ridge}"
        )));
    }
    if !xxt.is_square() {
        return Err(RidgeError::shape("XXT", "a square matrix", dims(xxt.shape())));
    }
    let d = xxt.nrows();
    if yxt.ncols() != d {
        return Err(RidgeError::shape(
            "YXT",
            format!("{} columns to match XXT", d),
            dims(yxt.shape()),
        ));
    }
    let min_dim = 1 + usize::from(input_bias);
    if d < min_dim {
        return Err(RidgeError::shape(
            "XXT",
            format!("dimension of at least {min_dim}"),
            dims(xxt.shape()),
        ));
    }

    let system = xxt + DMatrix::<f64>::identity(d, d) * ridge;
    let rhs = yxt.transpose();

    let raw = cholesky_solve(&system, &rhs).map_err(|source| RidgeError::SingularSystem {
        dim: d,
        ridge,
        source,
    })?;

    if input_bias {
        let bias = raw.rows(0, 1).into_owned();
        let wout = raw.rows(1, d - 1).into_owned();
        Ok(RidgeSolution {
            wout,
            bias: Some(bias),
        })
    } else {
        Ok(RidgeSolution { wout: raw, bias: None })
    }
}
