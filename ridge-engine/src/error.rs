// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Error taxonomy for readout training.
//!
//! Every variant identifies the buffer, dimension or shape involved so a
//! failed training run can be diagnosed from the message alone. Nothing here
//! is retried internally.

use std::fmt::Display;

use ridge_math::LinalgError;
use thiserror::Error;

use crate::readout::ReadoutState;

pub type Result<T> = std::result::Result<T, RidgeError>;

#[derive(Debug, Error)]
pub enum RidgeError {
    /// Two arrays that must agree in shape do not.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// The washout period swallows the whole batch.
    #[error("transient of {transient} timesteps must be shorter than the batch ({length} timesteps)")]
    InvalidTransient { transient: usize, length: usize },

    /// Dimensions or statistics buffers were used before being set up.
    #[error("{what} is not initialized")]
    DimensionUninitialized { what: String },

    #[error("buffer `{name}` already exists")]
    BufferAlreadyExists { name: String },

    /// The regularized normal equations could not be solved.
    #[error("ridge system of dimension {dim} with ridge = {ridge} is singular: {source}")]
    SingularSystem {
        dim: usize,
        ridge: f64,
        #[source]
        source: LinalgError,
    },

    /// A lock guarding shared training state is unusable.
    #[error("lock `{lock}` is unavailable: {reason}")]
    Concurrency { lock: String, reason: String },

    #[error("target batch is missing for readout `{readout}`")]
    MissingTarget { readout: String },

    /// A lifecycle callback was invoked from the wrong state.
    #[error("readout `{readout}` cannot {operation} while {state}")]
    InvalidState {
        readout: String,
        operation: &'static str,
        state: ReadoutState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RidgeError {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl Display,
        actual: impl Display,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn uninitialized(what: impl Into<String>) -> Self {
        Self::DimensionUninitialized { what: what.into() }
    }

    pub(crate) fn poisoned(lock: impl Into<String>) -> Self {
        Self::Concurrency {
            lock: lock.into(),
            reason: "poisoned by a worker that panicked while holding it".to_string(),
        }
    }
}

/// Render a matrix shape as `rows×cols`.
pub(crate) fn dims((rows, cols): (usize, usize)) -> String {
    format!("{rows}×{cols}")
}
