// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Parallel readout training orchestrator.
//!
//! Pipeline:
//! 1. Setup: initialize from the first batch and allocate buffers (single thread)
//! 2. Accumulate: batches are dealt round-robin to `workers` scoped threads,
//!    each calling `partial_fit` against the shared session
//! 3. Barrier: all workers are joined
//! 4. Solve: one `finalize` call

use std::thread;

use nalgebra::DMatrix;

use crate::error::{Result, RidgeError};
use crate::readout::RidgeReadout;
use crate::session::TrainingSession;
use crate::solver::RidgeSolution;

type Batch = (DMatrix<f64>, DMatrix<f64>);

/// Distributes batch accumulation over worker threads.
#[derive(Debug, Clone)]
pub struct ReadoutTrainer {
    /// Number of worker threads (at least 1)
    pub workers: usize,
}

impl Default for ReadoutTrainer {
    fn default() -> Self {
        let workers = thread::available_parallelism().map_or(1, |n| n.get());
        Self { workers }
    }
}

impl ReadoutTrainer {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Train `readout` on `batches` of `(input, target)` pairs.
    ///
    /// Statistics left from any earlier run are zeroed first, so the solution
    /// depends only on `batches`. A worker stops at its first failing batch.
    /// The error of the lowest-numbered failing worker is returned and no
    /// solve is attempted; the next `fit` starts over from empty statistics.
    pub fn fit(
        &self,
        readout: &mut RidgeReadout,
        session: &TrainingSession,
        batches: &[Batch],
    ) -> Result<RidgeSolution> {
        let first = batches
            .first()
            .ok_or_else(|| RidgeError::InvalidConfig("fit needs at least one batch".into()))?;
        readout.ready_for_batches(session, first)?;

        self.accumulate_all(readout, session, batches, |readout, session, (x, y)| {
            readout.partial_fit(session, x.into(), Some(y.into()))
        })?;

        readout.finalize(session)
    }

    /// Deal `batches` round-robin over scoped workers, each applying `step`.
    fn accumulate_all<F>(
        &self,
        readout: &RidgeReadout,
        session: &TrainingSession,
        batches: &[Batch],
        step: F,
    ) -> Result<()>
    where
        F: Fn(&RidgeReadout, &TrainingSession, &Batch) -> Result<()> + Sync,
    {
        let workers = self.workers.min(batches.len()).max(1);
        tracing::debug!(readout = readout.name(), workers, batches = batches.len(), "starting parallel accumulation");

        let step = &step;
        let outcomes: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    scope.spawn(move || -> Result<()> {
                        for batch in batches.iter().skip(w).step_by(workers) {
                            step(readout, session, batch)?;
                        }
                        Ok(())
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(w, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(RidgeError::Concurrency {
                            lock: session.lock().name().to_string(),
                            reason: format!("worker {w} panicked during accumulation"),
                        })
                    })
                })
                .collect()
        });

        outcomes.into_iter().collect()
    }
}
