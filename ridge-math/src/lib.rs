// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

pub mod linalg;

pub use linalg::{cholesky_solve, is_symmetric, LinalgError, PIVOT_RTOL};
