// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Sufficient-statistics accumulation.
//!
//! For a prepared batch `(X', Y')` the contribution is
//!
//! ```text
//! xxt = X'^T · X'    (d × d, symmetric)
//! yxt = Y'^T · X'    (output_dim × d)
//! ```
//!
//! and is added into the shared `XXT` / `YXT` buffers. Addition is
//! commutative and associative, so the final statistics depend only on the
//! set of batches, not on their order or grouping across workers.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::buffers::{BufferStore, SharedBuffer};
use crate::config::RidgeConfig;
use crate::error::Result;
use crate::prepare::PreparedBatch;
use crate::session::AccumulationLock;

/// Handles to the two statistics buffers of one readout.
#[derive(Debug, Clone)]
pub struct StatisticsBuffers {
    pub xxt: Arc<SharedBuffer>,
    pub yxt: Arc<SharedBuffer>,
}

impl StatisticsBuffers {
    /// Open the buffers of the readout described by `config`.
    pub fn open(store: &BufferStore, config: &RidgeConfig) -> Result<Self> {
        Ok(Self {
            xxt: store.get(&config.xxt_key())?,
            yxt: store.get(&config.yxt_key())?,
        })
    }

    /// Copy both buffers out as `(XXT, YXT)`.
    pub fn snapshot(&self) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        Ok((self.xxt.snapshot()?, self.yxt.snapshot()?))
    }

    /// Zero both buffers.
    pub fn zero(&self) -> Result<()> {
        self.xxt.zero()?;
        self.yxt.zero()
    }
}

/// One batch's contribution to the statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossProducts {
    pub xxt: DMatrix<f64>,
    pub yxt: DMatrix<f64>,
}

impl CrossProducts {
    pub fn of(batch: &PreparedBatch) -> Self {
        Self {
            xxt: batch.x.tr_mul(&batch.x),
            yxt: batch.y.tr_mul(&batch.x),
        }
    }
}

/// Fold one prepared batch into the shared statistics.
///
/// Cross-products are computed before entering the critical section. Inside
/// it, both buffer shapes are checked and both write guards are held before
/// either buffer is written, so a failed call leaves no partial update behind.
pub fn accumulate(
    buffers: &StatisticsBuffers,
    lock: &AccumulationLock,
    batch: &PreparedBatch,
) -> Result<()> {
    let contribution = CrossProducts::of(batch);

    let _guard = lock.acquire()?;
    buffers.xxt.check_shape(contribution.xxt.shape())?;
    buffers.yxt.check_shape(contribution.yxt.shape())?;
    let mut xxt = buffers.xxt.write()?;
    let mut yxt = buffers.yxt.write()?;
    *xxt += &contribution.xxt;
    *yxt += &contribution.yxt;

    tracing::trace!(
        xxt = buffers.xxt.name(),
        timesteps = batch.timesteps(),
        "accumulated batch"
    );
    Ok(())
}
