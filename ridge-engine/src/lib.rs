// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Incremental ridge-regression readout for reservoir computing.
//!
//! Batches of `(reservoir state, target)` pairs are folded into shared
//! sufficient statistics, possibly from many workers, and the readout weights
//! are then obtained from one closed-form solve.

pub mod accumulate;
pub mod buffers;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prepare;
pub mod readout;
pub mod session;
pub mod solver;
pub mod trainer;

pub use accumulate::{accumulate, CrossProducts, StatisticsBuffers};
pub use buffers::{BufferStore, SharedBuffer};
pub use config::RidgeConfig;
pub use error::{Result, RidgeError};
pub use prepare::{prepare, PrepareOptions, PreparedBatch, Timeseries};
pub use readout::{ReadoutState, RidgeReadout};
pub use session::{AccumulationLock, TrainingSession};
pub use solver::{solve, RidgeSolution};
pub use trainer::ReadoutTrainer;
