// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Batch preparation for readout learning.
//!
//! Turns a raw `(input, target)` pair into the design and target matrices
//! consumed by the accumulator:
//!
//! 1. Promote 1-D series to `T × 1` matrices (when reshaping is allowed)
//! 2. Drop the first `transient` timesteps of both series
//! 3. Prepend a constant column of ones to the inputs (bias augmentation)
//!
//! Batches are time-major: one row per timestep, one column per feature.

use nalgebra::DMatrix;

use crate::error::{dims, Result, RidgeError};

/// Borrowed view over a time series batch.
#[derive(Debug, Clone, Copy)]
pub enum Timeseries<'a> {
    /// One scalar per timestep.
    Flat(&'a [f64]),
    /// Time-major matrix: `T` rows × feature columns.
    Matrix(&'a DMatrix<f64>),
}

impl<'a> From<&'a [f64]> for Timeseries<'a> {
    fn from(values: &'a [f64]) -> Self {
        Self::Flat(values)
    }
}

impl<'a> From<&'a Vec<f64>> for Timeseries<'a> {
    fn from(values: &'a Vec<f64>) -> Self {
        Self::Flat(values)
    }
}

impl<'a> From<&'a DMatrix<f64>> for Timeseries<'a> {
    fn from(values: &'a DMatrix<f64>) -> Self {
        Self::Matrix(values)
    }
}

impl Timeseries<'_> {
    /// Number of timesteps.
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(values) => values.len(),
            Self::Matrix(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize as a `T × features` matrix.
    pub fn to_matrix(&self, allow_reshape: bool, role: &str) -> Result<DMatrix<f64>> {
        match self {
            Self::Matrix(m) => Ok((*m).clone()),
            Self::Flat(values) if allow_reshape => {
                Ok(DMatrix::from_column_slice(values.len(), 1, values))
            }
            Self::Flat(values) => Err(RidgeError::shape(
                format!("{role} batch"),
                "a 2-D time-major matrix",
                format!("a 1-D series of length {}", values.len()),
            )),
        }
    }
}

/// Options controlling [`prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOptions {
    pub input_bias: bool,
    pub transient: usize,
    pub allow_reshape: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            input_bias: true,
            transient: 0,
            allow_reshape: true,
        }
    }
}

/// A batch ready for accumulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBatch {
    /// Design matrix `X'` (`T' × d`), bias column first when enabled
    pub x: DMatrix<f64>,
    /// Target matrix `Y'` (`T' × output_dim`)
    pub y: DMatrix<f64>,
}

impl PreparedBatch {
    /// Timesteps remaining after trimming.
    pub fn timesteps(&self) -> usize {
        self.x.nrows()
    }

    /// Width of the design matrix, including the bias column.
    pub fn design_dim(&self) -> usize {
        self.x.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.y.ncols()
    }
}

/// Validate and shape one `(input, target)` batch.
///
/// The target is required here; callers that accept an optional target
/// report its absence as [`RidgeError::MissingTarget`] under their own name.
pub fn prepare(
    x: Timeseries<'_>,
    y: Timeseries<'_>,
    options: &PrepareOptions,
) -> Result<PreparedBatch> {
    let x = x.to_matrix(options.allow_reshape, "input")?;
    let y = y.to_matrix(options.allow_reshape, "target")?;

    let x = trim_transient(x, options.transient)?;
    let y = trim_transient(y, options.transient)?;

    if x.nrows() != y.nrows() {
        return Err(RidgeError::shape(
            "input/target timesteps after trimming",
            format!("{} timesteps", x.nrows()),
            format!("{} timesteps", y.nrows()),
        ));
    }
    if x.ncols() == 0 || y.ncols() == 0 {
        return Err(RidgeError::shape(
            "input/target features",
            "at least one column each",
            format!("input {}, target {}", dims(x.shape()), dims(y.shape())),
        ));
    }

    let x = if options.input_bias {
        x.insert_column(0, 1.0)
    } else {
        x
    };

    Ok(PreparedBatch { x, y })
}

fn trim_transient(m: DMatrix<f64>, transient: usize) -> Result<DMatrix<f64>> {
    let length = m.nrows();
    if transient >= length {
        return Err(RidgeError::InvalidTransient { transient, length });
    }
    if transient == 0 {
        return Ok(m);
    }
    Ok(m.remove_rows(0, transient))
}
