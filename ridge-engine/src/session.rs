// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Training session: the shared state of one training run.
//!
//! A session owns the [`BufferStore`] holding every readout's statistics and
//! the single [`AccumulationLock`] serializing updates to them. Workers share
//! the session by reference; nothing here is global.

use std::sync::{Mutex, MutexGuard};

use crate::buffers::BufferStore;
use crate::error::{Result, RidgeError};

/// Named exclusive section for read-accumulate-write sequences.
///
/// Acquisition blocks without a timeout. A lock poisoned by a panicking
/// holder is reported as [`RidgeError::Concurrency`], since the buffers it
/// protected may hold a partial update.
#[derive(Debug)]
pub struct AccumulationLock {
    name: String,
    inner: Mutex<()>,
}

impl AccumulationLock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter the critical section. Released when the guard drops.
    pub fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        self.inner.lock().map_err(|_| RidgeError::poisoned(&self.name))
    }
}

/// Buffers and lock shared by every worker of a training run.
#[derive(Debug)]
pub struct TrainingSession {
    store: BufferStore,
    lock: AccumulationLock,
}

impl Default for TrainingSession {
    fn default() -> Self {
        Self::new("training")
    }
}

impl TrainingSession {
    /// The lock is named `<name>/accumulate`.
    pub fn new(name: &str) -> Self {
        Self {
            store: BufferStore::new(),
            lock: AccumulationLock::new(format!("{name}/accumulate")),
        }
    }

    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    pub fn lock(&self) -> &AccumulationLock {
        &self.lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_session_names_lock() {
        let session = TrainingSession::new("esn");
        assert_eq!(session.lock().name(), "esn/accumulate");
        assert!(session.store().is_empty());
        assert_eq!(TrainingSession::default().lock().name(), "training/accumulate");
    }

    #[test]
    fn test_acquire_release() {
        let lock = AccumulationLock::new("l");
        {
            let _guard = lock.acquire().unwrap();
        }
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_poisoned_lock_is_concurrency_error() {
        let lock = Arc::new(AccumulationLock::new("poisoned"));
        let held = Arc::clone(&lock);
        let joined = thread::spawn(move || {
            let _guard = held.acquire().unwrap();
            panic!("worker died inside the critical section");
        })
        .join();
        assert!(joined.is_err());

        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, RidgeError::Concurrency { ref lock, .. } if lock == "poisoned"));
    }
}
