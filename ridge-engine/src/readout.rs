// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Ridge readout: hyperparameters, fitted parameters and training lifecycle.
//!
//! The readout computes `output = X · Wout + bias` over a time-major batch
//! and is fitted by accumulating sufficient statistics across batches:
//!
//! ```text
//! Unconfigured ─initialize─▶ Initialized ─allocate_buffers─▶ BuffersAllocated
//!                                                                 │ partial_fit
//!                                   reset_buffers                 ▼
//!                 Solved ◀──────finalize───────────────────── Accumulating ⟲
//! ```
//!
//! `partial_fit` takes `&self` and may be called from many workers at once.
//! `finalize` takes `&mut self`, so every worker borrow must have ended
//! before the solve runs.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::DMatrix;

use crate::accumulate::{accumulate, StatisticsBuffers};
use crate::config::RidgeConfig;
use crate::error::{dims, Result, RidgeError};
use crate::prepare::{prepare, PrepareOptions, Timeseries};
use crate::session::TrainingSession;
use crate::solver::{solve, RidgeSolution};

/// Lifecycle position of a [`RidgeReadout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadoutState {
    /// Dimensions unknown.
    Unconfigured,
    /// Dimensions and initial parameters known, no statistics buffers yet.
    Initialized,
    /// Buffers exist and hold no batches.
    BuffersAllocated,
    /// At least one batch has been folded into the buffers.
    Accumulating,
    /// `Wout` (and `bias`) hold the closed-form solution.
    Solved,
}

impl fmt::Display for ReadoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unconfigured => "unconfigured",
            Self::Initialized => "initialized",
            Self::BuffersAllocated => "buffers allocated",
            Self::Accumulating => "accumulating",
            Self::Solved => "solved",
        };
        f.write_str(s)
    }
}

/// A linear readout trained by incremental ridge regression.
#[derive(Debug)]
pub struct RidgeReadout {
    config: RidgeConfig,
    input_dim: Option<usize>,
    output_dim: Option<usize>,
    wout: Option<DMatrix<f64>>,
    bias: Option<DMatrix<f64>>,
    buffers_allocated: bool,
    solved: bool,
    batches: AtomicUsize,
}

impl RidgeReadout {
    pub fn new(config: RidgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            input_dim: None,
            output_dim: None,
            wout: None,
            bias: None,
            buffers_allocated: false,
            solved: false,
            batches: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &RidgeConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    pub fn output_dim(&self) -> Option<usize> {
        self.output_dim
    }

    /// Weight matrix (`input_dim × output_dim`).
    pub fn wout(&self) -> Option<&DMatrix<f64>> {
        self.wout.as_ref()
    }

    /// Intercept (`1 × output_dim`), only with `input_bias`.
    pub fn bias(&self) -> Option<&DMatrix<f64>> {
        self.bias.as_ref()
    }

    /// Batches accumulated since the buffers were allocated or last reset.
    pub fn batches_seen(&self) -> usize {
        self.batches.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ReadoutState {
        if self.solved {
            ReadoutState::Solved
        } else if self.buffers_allocated {
            if self.batches_seen() > 0 {
                ReadoutState::Accumulating
            } else {
                ReadoutState::BuffersAllocated
            }
        } else if self.input_dim.is_some() {
            ReadoutState::Initialized
        } else {
            ReadoutState::Unconfigured
        }
    }

    fn invalid_state(&self, operation: &'static str) -> RidgeError {
        RidgeError::InvalidState {
            readout: self.config.name.clone(),
            operation,
            state: self.state(),
        }
    }

    fn design_dim(&self) -> Result<usize> {
        let input_dim = self
            .input_dim
            .ok_or_else(|| RidgeError::uninitialized(format!("input_dim of `{}`", self.name())))?;
        Ok(self.config.design_dim(input_dim))
    }

    fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            input_bias: self.config.input_bias,
            transient: self.config.transient,
            allow_reshape: true,
        }
    }

    // ─── Lifecycle callbacks ─────────────────────────

    /// Infer dimensions from a representative batch and set starting parameters.
    ///
    /// The target may be omitted when `output_dim` is configured.
    pub fn initialize(
        &mut self,
        sample_input: Timeseries<'_>,
        sample_target: Option<Timeseries<'_>>,
    ) -> Result<()> {
        if self.buffers_allocated || self.solved {
            return Err(self.invalid_state("initialize"));
        }

        let x = sample_input.to_matrix(true, "input")?;
        let input_dim = x.ncols();
        if input_dim == 0 {
            return Err(RidgeError::shape("sample input", "at least one feature", dims(x.shape())));
        }

        let output_dim = match (sample_target, self.config.output_dim) {
            (Some(target), configured) => {
                let inferred = target.to_matrix(true, "target")?.ncols();
                if let Some(expected) = configured {
                    if expected != inferred {
                        return Err(RidgeError::shape(
                            format!("target of `{}`", self.name()),
                            format!("{expected} output columns"),
                            format!("{inferred} output columns"),
                        ));
                    }
                }
                inferred
            }
            (None, Some(configured)) => configured,
            (None, None) => {
                return Err(RidgeError::uninitialized(format!(
                    "output_dim of `{}` (no sample target given)",
                    self.name()
                )))
            }
        };
        if output_dim == 0 {
            return Err(RidgeError::shape("sample target", "at least one output", "0 outputs"));
        }

        let wout = match &self.config.wout_init {
            Some(init) => {
                if init.shape() != (input_dim, output_dim) {
                    return Err(RidgeError::shape(
                        format!("initial Wout of `{}`", self.name()),
                        dims((input_dim, output_dim)),
                        dims(init.shape()),
                    ));
                }
                init.clone()
            }
            None => DMatrix::zeros(input_dim, output_dim),
        };

        self.input_dim = Some(input_dim);
        self.output_dim = Some(output_dim);
        self.wout = Some(wout);
        self.bias = self
            .config
            .input_bias
            .then(|| DMatrix::zeros(1, output_dim));

        tracing::debug!(readout = self.name(), input_dim, output_dim, "initialized readout");
        Ok(())
    }

    /// Create the `XXT` and `YXT` buffers in the session store.
    ///
    /// Must complete before any worker calls [`partial_fit`](Self::partial_fit).
    pub fn allocate_buffers(&mut self, session: &TrainingSession) -> Result<()> {
        let d = self.design_dim()?;
        let k = self
            .output_dim
            .ok_or_else(|| RidgeError::uninitialized(format!("output_dim of `{}`", self.name())))?;
        if self.buffers_allocated {
            return Err(RidgeError::BufferAlreadyExists {
                name: self.config.xxt_key(),
            });
        }

        let store = session.store();
        let xxt_key = self.config.xxt_key();
        store.create(&xxt_key, (d, d))?;
        if let Err(e) = store.create(&self.config.yxt_key(), (k, d)) {
            // Keep allocation all-or-nothing.
            store.remove(&xxt_key)?;
            return Err(e);
        }

        self.buffers_allocated = true;
        self.batches.store(0, Ordering::Release);
        tracing::debug!(readout = self.name(), design_dim = d, output_dim = k, "allocated statistics buffers");
        Ok(())
    }

    /// Fold one training batch into the shared statistics.
    ///
    /// Safe to call concurrently from several workers sharing `session`.
    pub fn partial_fit(
        &self,
        session: &TrainingSession,
        x: Timeseries<'_>,
        y: Option<Timeseries<'_>>,
    ) -> Result<()> {
        if self.solved {
            return Err(self.invalid_state("partial_fit"));
        }
        if !self.buffers_allocated {
            return Err(RidgeError::uninitialized(format!(
                "statistics buffers of `{}`",
                self.name()
            )));
        }
        let y = y.ok_or_else(|| RidgeError::MissingTarget {
            readout: self.config.name.clone(),
        })?;

        let batch = prepare(x, y, &self.prepare_options())?;
        let buffers = StatisticsBuffers::open(session.store(), &self.config)?;
        accumulate(&buffers, session.lock(), &batch)?;

        self.batches.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Solve for `Wout` and `bias` from the accumulated statistics.
    ///
    /// Calling it again without new batches reproduces the same parameters.
    pub fn finalize(&mut self, session: &TrainingSession) -> Result<RidgeSolution> {
        if !self.buffers_allocated {
            return Err(RidgeError::uninitialized(format!(
                "statistics buffers of `{}`",
                self.name()
            )));
        }
        if self.batches_seen() == 0 {
            tracing::warn!(readout = self.name(), "solving with no accumulated batches");
        }

        let (xxt, yxt) = StatisticsBuffers::open(session.store(), &self.config)?.snapshot()?;
        let solution = match solve(&xxt, &yxt, self.config.ridge, self.config.input_bias) {
            Ok(solution) => solution,
            Err(e) => {
                tracing::warn!(readout = self.name(), error = %e, "ridge solve failed");
                return Err(e);
            }
        };

        self.wout = Some(solution.wout.clone());
        self.bias = solution.bias.clone();
        self.solved = true;
        tracing::info!(
            readout = self.name(),
            batches = self.batches_seen(),
            ridge = self.config.ridge,
            wout_norm = solution.wout.norm(),
            "readout solved"
        );

        Ok(solution)
    }

    /// Zero the statistics buffers so training restarts from scratch.
    ///
    /// Fitted parameters are kept until the next [`finalize`](Self::finalize).
    pub fn reset_buffers(&mut self, session: &TrainingSession) -> Result<()> {
        if !self.buffers_allocated {
            return Err(RidgeError::uninitialized(format!(
                "statistics buffers of `{}`",
                self.name()
            )));
        }
        StatisticsBuffers::open(session.store(), &self.config)?.zero()?;
        self.batches.store(0, Ordering::Release);
        self.solved = false;
        tracing::debug!(readout = self.name(), "reset statistics buffers");
        Ok(())
    }

    // ─── Forward pass ────────────────────────────────

    /// Apply the readout: `Y = X · Wout + bias`, one output row per timestep.
    pub fn run(&self, x: Timeseries<'_>) -> Result<DMatrix<f64>> {
        let wout = self
            .wout
            .as_ref()
            .ok_or_else(|| RidgeError::uninitialized(format!("Wout of `{}`", self.name())))?;
        let x = x.to_matrix(true, "input")?;
        if x.ncols() != wout.nrows() {
            return Err(RidgeError::shape(
                format!("input of `{}`", self.name()),
                format!("{} features", wout.nrows()),
                format!("{} features", x.ncols()),
            ));
        }

        let mut y = x * wout;
        if let Some(bias) = &self.bias {
            for (j, b) in bias.iter().enumerate() {
                y.column_mut(j).add_scalar_mut(*b);
            }
        }
        Ok(y)
    }

    // ─── Sequential training ─────────────────────────

    /// Bring the readout to empty statistics, using `sample` to infer
    /// dimensions when needed. Statistics left by an earlier run, solved or
    /// not, are zeroed so the solve sees only the batches of this run.
    pub(crate) fn ready_for_batches(
        &mut self,
        session: &TrainingSession,
        sample: &(DMatrix<f64>, DMatrix<f64>),
    ) -> Result<()> {
        match self.state() {
            ReadoutState::Unconfigured => {
                self.initialize((&sample.0).into(), Some((&sample.1).into()))?;
                self.allocate_buffers(session)
            }
            ReadoutState::Initialized => self.allocate_buffers(session),
            ReadoutState::Accumulating | ReadoutState::Solved => self.reset_buffers(session),
            ReadoutState::BuffersAllocated => Ok(()),
        }
    }

    /// Run the full callback sequence over `batches` on the current thread.
    ///
    /// The solution depends only on `batches`: anything accumulated before
    /// the call is discarded.
    pub fn fit(
        &mut self,
        session: &TrainingSession,
        batches: &[(DMatrix<f64>, DMatrix<f64>)],
    ) -> Result<RidgeSolution> {
        let first = batches
            .first()
            .ok_or_else(|| RidgeError::InvalidConfig("fit needs at least one batch".into()))?;
        self.ready_for_batches(session, first)?;
        for (x, y) in batches {
            self.partial_fit(session, x.into(), Some(y.into()))?;
        }
        self.finalize(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_batch(rows: usize, offset: f64) -> (DMatrix<f64>, DMatrix<f64>) {
        // y = 1.5·x0 − 2·x1 + 0.25
        let x = DMatrix::from_fn(rows, 2, |i, j| {
            let t = offset + i as f64;
            if j == 0 {
                (t * 0.7).sin()
            } else {
                (t * 1.3).cos()
            }
        });
        let y = DMatrix::from_fn(rows, 1, |i, _| 1.5 * x[(i, 0)] - 2.0 * x[(i, 1)] + 0.25);
        (x, y)
    }

    fn ready(config: RidgeConfig) -> (RidgeReadout, TrainingSession) {
        let session = TrainingSession::default();
        let mut readout = RidgeReadout::new(config).unwrap();
        let (x, y) = linear_batch(4, 0.0);
        readout.initialize((&x).into(), Some((&y).into())).unwrap();
        readout.allocate_buffers(&session).unwrap();
        (readout, session)
    }

    #[test]
    fn test_lifecycle_states() {
        let session = TrainingSession::default();
        let mut readout = RidgeReadout::new(RidgeConfig::new(1e-6)).unwrap();
        assert_eq!(readout.state(), ReadoutState::Unconfigured);

        let (x, y) = linear_batch(20, 0.0);
        readout.initialize((&x).into(), Some((&y).into())).unwrap();
        assert_eq!(readout.state(), ReadoutState::Initialized);
        assert_eq!(readout.input_dim(), Some(2));
        assert_eq!(readout.output_dim(), Some(1));
        assert_eq!(readout.wout().unwrap(), &DMatrix::zeros(2, 1));
        assert_eq!(readout.bias().unwrap(), &DMatrix::zeros(1, 1));

        readout.allocate_buffers(&session).unwrap();
        assert_eq!(readout.state(), ReadoutState::BuffersAllocated);
        assert_eq!(session.store().get("ridge/XXT").unwrap().shape(), (3, 3));
        assert_eq!(session.store().get("ridge/YXT").unwrap().shape(), (1, 3));

        readout.partial_fit(&session, (&x).into(), Some((&y).into())).unwrap();
        assert_eq!(readout.state(), ReadoutState::Accumulating);
        assert_eq!(readout.batches_seen(), 1);

        readout.finalize(&session).unwrap();
        assert_eq!(readout.state(), ReadoutState::Solved);
        assert_relative_eq!(readout.wout().unwrap()[(0, 0)], 1.5, epsilon = 1e-4);
        assert_relative_eq!(readout.wout().unwrap()[(1, 0)], -2.0, epsilon = 1e-4);
        assert_relative_eq!(readout.bias().unwrap()[(0, 0)], 0.25, epsilon = 1e-4);

        readout.reset_buffers(&session).unwrap();
        assert_eq!(readout.state(), ReadoutState::BuffersAllocated);
        assert_eq!(readout.batches_seen(), 0);
    }

    #[test]
    fn test_partial_fit_before_allocation() {
        let session = TrainingSession::default();
        let readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        let (x, y) = linear_batch(4, 0.0);
        let err = readout
            .partial_fit(&session, (&x).into(), Some((&y).into()))
            .unwrap_err();
        assert!(matches!(err, RidgeError::DimensionUninitialized { .. }));
    }

    #[test]
    fn test_allocate_before_initialize() {
        let session = TrainingSession::default();
        let mut readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        let err = readout.allocate_buffers(&session).unwrap_err();
        assert!(matches!(err, RidgeError::DimensionUninitialized { .. }));
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_double_allocation() {
        let (mut readout, session) = ready(RidgeConfig::default());
        let err = readout.allocate_buffers(&session).unwrap_err();
        assert!(matches!(err, RidgeError::BufferAlreadyExists { .. }));
    }

    #[test]
    fn test_allocation_conflict_rolls_back() {
        let session = TrainingSession::default();
        session.store().create("ridge/YXT", (1, 1)).unwrap();

        let mut readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        let (x, y) = linear_batch(4, 0.0);
        readout.initialize((&x).into(), Some((&y).into())).unwrap();
        let err = readout.allocate_buffers(&session).unwrap_err();
        assert!(matches!(err, RidgeError::BufferAlreadyExists { .. }));
        assert!(!session.store().contains("ridge/XXT"));
        assert_eq!(readout.state(), ReadoutState::Initialized);
    }

    #[test]
    fn test_initialize_after_allocation_rejected() {
        let (mut readout, _session) = ready(RidgeConfig::default());
        let (x, y) = linear_batch(4, 0.0);
        let err = readout.initialize((&x).into(), Some((&y).into())).unwrap_err();
        assert!(matches!(
            err,
            RidgeError::InvalidState { state: ReadoutState::BuffersAllocated, .. }
        ));
    }

    #[test]
    fn test_partial_fit_after_solve_requires_reset() {
        let (mut readout, session) = ready(RidgeConfig::new(1e-3));
        let (x, y) = linear_batch(10, 0.0);
        readout.partial_fit(&session, (&x).into(), Some((&y).into())).unwrap();
        readout.finalize(&session).unwrap();

        let err = readout
            .partial_fit(&session, (&x).into(), Some((&y).into()))
            .unwrap_err();
        assert!(matches!(err, RidgeError::InvalidState { state: ReadoutState::Solved, .. }));

        readout.reset_buffers(&session).unwrap();
        readout.partial_fit(&session, (&x).into(), Some((&y).into())).unwrap();
        assert_eq!(readout.state(), ReadoutState::Accumulating);
    }

    #[test]
    fn test_missing_target_names_readout() {
        let (readout, session) = ready(RidgeConfig::default().with_name("esn-out"));
        let (x, _) = linear_batch(4, 0.0);
        let err = readout.partial_fit(&session, (&x).into(), None).unwrap_err();
        assert!(matches!(err, RidgeError::MissingTarget { ref readout } if readout == "esn-out"));
    }

    #[test]
    fn test_wrong_width_batch_is_shape_mismatch() {
        let (readout, session) = ready(RidgeConfig::default());
        let x = DMatrix::from_element(5, 3, 1.0);
        let y = DMatrix::from_element(5, 1, 1.0);
        let err = readout
            .partial_fit(&session, (&x).into(), Some((&y).into()))
            .unwrap_err();
        assert!(matches!(err, RidgeError::ShapeMismatch { .. }));
        assert_eq!(readout.batches_seen(), 0);
    }

    #[test]
    fn test_output_dim_from_config() {
        let mut readout = RidgeReadout::new(RidgeConfig::default().with_output_dim(3)).unwrap();
        let x = DMatrix::from_element(4, 2, 0.5);
        readout.initialize((&x).into(), None).unwrap();
        assert_eq!(readout.output_dim(), Some(3));

        let mut readout = RidgeReadout::new(RidgeConfig::default().with_output_dim(3)).unwrap();
        let y = DMatrix::from_element(4, 2, 0.5);
        let err = readout.initialize((&x).into(), Some((&y).into())).unwrap_err();
        assert!(matches!(err, RidgeError::ShapeMismatch { .. }));

        let mut readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        let err = readout.initialize((&x).into(), None).unwrap_err();
        assert!(matches!(err, RidgeError::DimensionUninitialized { .. }));
    }

    #[test]
    fn test_initial_weights() {
        let init = DMatrix::from_row_slice(2, 1, &[1.0, -1.0]);
        let mut readout =
            RidgeReadout::new(RidgeConfig::default().with_wout_init(init.clone())).unwrap();
        let (x, y) = linear_batch(4, 0.0);
        readout.initialize((&x).into(), Some((&y).into())).unwrap();
        assert_eq!(readout.wout().unwrap(), &init);

        let out = readout.run((&x).into()).unwrap();
        for t in 0..4 {
            assert_relative_eq!(out[(t, 0)], x[(t, 0)] - x[(t, 1)], epsilon = 1e-12);
        }

        let bad = DMatrix::zeros(3, 1);
        let mut readout = RidgeReadout::new(RidgeConfig::default().with_wout_init(bad)).unwrap();
        let err = readout.initialize((&x).into(), Some((&y).into())).unwrap_err();
        assert!(matches!(err, RidgeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_run_applies_bias() {
        let session = TrainingSession::default();
        let mut readout = RidgeReadout::new(RidgeConfig::new(1e-8)).unwrap();
        let batches: Vec<_> = (0..3).map(|b| linear_batch(15, b as f64 * 15.0)).collect();
        readout.fit(&session, &batches).unwrap();

        let (x, y) = linear_batch(6, 100.0);
        let pred = readout.run((&x).into()).unwrap();
        assert_eq!(pred.shape(), (6, 1));
        assert_relative_eq!(pred, y, epsilon = 1e-5);
    }

    #[test]
    fn test_run_before_initialize_and_bad_width() {
        let readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        let x = DMatrix::from_element(2, 2, 1.0);
        assert!(matches!(
            readout.run((&x).into()),
            Err(RidgeError::DimensionUninitialized { .. })
        ));

        let (readout, _session) = ready(RidgeConfig::default());
        let x = DMatrix::from_element(2, 5, 1.0);
        assert!(matches!(readout.run((&x).into()), Err(RidgeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let (mut readout, session) = ready(RidgeConfig::new(0.1));
        let (x, y) = linear_batch(12, 0.0);
        readout.partial_fit(&session, (&x).into(), Some((&y).into())).unwrap();

        let first = readout.finalize(&session).unwrap();
        let second = readout.finalize(&session).unwrap();
        assert_eq!(first, second);
        assert_eq!(readout.wout().unwrap(), &second.wout);
    }

    #[test]
    fn test_fit_discards_earlier_partial_fits() {
        let batches: Vec<_> = (0..3).map(|b| linear_batch(10, b as f64 * 10.0)).collect();

        let fresh_session = TrainingSession::new("fresh");
        let mut fresh = RidgeReadout::new(RidgeConfig::new(0.1)).unwrap();
        let expected = fresh.fit(&fresh_session, &batches).unwrap();

        let (mut readout, session) = ready(RidgeConfig::new(0.1));
        let (x, y) = linear_batch(7, 50.0);
        readout.partial_fit(&session, (&x).into(), Some((&y).into())).unwrap();
        assert_eq!(readout.state(), ReadoutState::Accumulating);

        let got = readout.fit(&session, &batches).unwrap();
        assert_eq!(readout.batches_seen(), 3);
        assert_eq!(got, expected);
    }

    #[test]
    fn test_fit_without_batches() {
        let session = TrainingSession::default();
        let mut readout = RidgeReadout::new(RidgeConfig::default()).unwrap();
        assert!(matches!(
            readout.fit(&session, &[]),
            Err(RidgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_rejects_negative_ridge() {
        assert!(matches!(
            RidgeReadout::new(RidgeConfig::new(-0.1)),
            Err(RidgeError::InvalidConfig(_))
        ));
    }
}
