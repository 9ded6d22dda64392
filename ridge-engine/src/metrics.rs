// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

// ─── Evaluation utilities ────────────────────────────

use nalgebra::DMatrix;

use crate::error::{dims, Result, RidgeError};

fn check_same_shape(predicted: &DMatrix<f64>, actual: &DMatrix<f64>) -> Result<()> {
    if predicted.shape() != actual.shape() {
        return Err(RidgeError::shape(
            "prediction vs target",
            dims(actual.shape()),
            dims(predicted.shape()),
        ));
    }
    Ok(())
}

/// Residual sum of squares over every entry.
pub fn rss(predicted: &DMatrix<f64>, actual: &DMatrix<f64>) -> Result<f64> {
    check_same_shape(predicted, actual)?;
    Ok((predicted - actual).norm_squared())
}

/// Compute Normalized Mean Squared Error (NMSE), averaged over output columns.
///
/// `NMSE = MSE(predicted, actual) / variance(actual)`
///
/// Lower is better. NMSE < 1 means the model beats predicting the mean.
/// A constant target column contributes its raw MSE.
pub fn nmse(predicted: &DMatrix<f64>, actual: &DMatrix<f64>) -> Result<f64> {
    check_same_shape(predicted, actual)?;
    let (n, k) = actual.shape();
    if n == 0 || k == 0 {
        return Ok(0.0);
    }
    let n_f = n as f64;

    let mut total = 0.0;
    for j in 0..k {
        let col = actual.column(j);
        let mean = col.sum() / n_f;
        let variance = col.iter().map(|&y| (y - mean) * (y - mean)).sum::<f64>() / n_f;
        let mse = (predicted.column(j) - col).norm_squared() / n_f;
        total += if variance > 1e-12 { mse / variance } else { mse };
    }
    Ok(total / k as f64)
}
