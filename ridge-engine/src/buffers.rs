// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Named shared matrix storage.
//!
//! A [`BufferStore`] maps names to fixed-shape [`SharedBuffer`]s. Handles
//! returned by [`BufferStore::get`] are live: a write through any handle is
//! visible to every other holder of the same name.
//!
//! Buffers are created during a single-threaded setup phase. The internal
//! locks exist for memory safety only; the atomicity of a multi-buffer
//! update is provided by the session's accumulation lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nalgebra::DMatrix;

use crate::error::{dims, Result, RidgeError};

/// A named, fixed-shape `f64` matrix shared between workers.
#[derive(Debug)]
pub struct SharedBuffer {
    name: String,
    shape: (usize, usize),
    data: RwLock<DMatrix<f64>>,
}

impl SharedBuffer {
    fn zeros(name: &str, shape: (usize, usize)) -> Self {
        Self {
            name: name.to_string(),
            shape,
            data: RwLock::new(DMatrix::zeros(shape.0, shape.1)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape fixed at creation.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Ensure `shape` matches this buffer.
    pub fn check_shape(&self, shape: (usize, usize)) -> Result<()> {
        if shape != self.shape {
            return Err(RidgeError::shape(
                format!("buffer `{}`", self.name),
                dims(self.shape),
                dims(shape),
            ));
        }
        Ok(())
    }

    /// Borrow the current contents.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, DMatrix<f64>>> {
        self.data.read().map_err(|_| RidgeError::poisoned(&self.name))
    }

    /// Exclusive access to the contents. The shape must not change.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, DMatrix<f64>>> {
        self.data.write().map_err(|_| RidgeError::poisoned(&self.name))
    }

    /// Copy out the current contents.
    pub fn snapshot(&self) -> Result<DMatrix<f64>> {
        Ok(self.read()?.clone())
    }

    /// Replace the contents wholesale.
    pub fn set(&self, value: DMatrix<f64>) -> Result<()> {
        self.check_shape(value.shape())?;
        *self.write()? = value;
        Ok(())
    }

    /// Add `delta` in place.
    pub fn add_assign(&self, delta: &DMatrix<f64>) -> Result<()> {
        self.check_shape(delta.shape())?;
        *self.write()? += delta;
        Ok(())
    }

    /// Reset every entry to zero.
    pub fn zero(&self) -> Result<()> {
        self.write()?.fill(0.0);
        Ok(())
    }
}

/// Registry of named shared buffers for one training run.
#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: RwLock<HashMap<String, Arc<SharedBuffer>>>,
}

const STORE_LOCK: &str = "buffer store";

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-initialized buffer. Fails if `name` is already taken.
    pub fn create(&self, name: &str, shape: (usize, usize)) -> Result<Arc<SharedBuffer>> {
        if shape.0 == 0 || shape.1 == 0 {
            return Err(RidgeError::shape(
                format!("buffer `{name}`"),
                "non-empty shape",
                dims(shape),
            ));
        }

        let mut buffers = self
            .buffers
            .write()
            .map_err(|_| RidgeError::poisoned(STORE_LOCK))?;
        if buffers.contains_key(name) {
            return Err(RidgeError::BufferAlreadyExists {
                name: name.to_string(),
            });
        }

        let buffer = Arc::new(SharedBuffer::zeros(name, shape));
        buffers.insert(name.to_string(), Arc::clone(&buffer));
        tracing::debug!(buffer = name, shape = %dims(shape), "created buffer");
        Ok(buffer)
    }

    /// Live handle to a buffer.
    pub fn get(&self, name: &str) -> Result<Arc<SharedBuffer>> {
        let buffers = self
            .buffers
            .read()
            .map_err(|_| RidgeError::poisoned(STORE_LOCK))?;
        buffers
            .get(name)
            .cloned()
            .ok_or_else(|| RidgeError::uninitialized(format!("buffer `{name}`")))
    }

    /// Replace a buffer's contents wholesale.
    pub fn set(&self, name: &str, value: DMatrix<f64>) -> Result<()> {
        self.get(name)?.set(value)
    }

    /// Zero a buffer so training can restart from scratch.
    pub fn reset(&self, name: &str) -> Result<()> {
        self.get(name)?.zero()
    }

    /// Drop a buffer from the store. Outstanding handles stay valid.
    pub fn remove(&self, name: &str) -> Result<Option<Arc<SharedBuffer>>> {
        let mut buffers = self
            .buffers
            .write()
            .map_err(|_| RidgeError::poisoned(STORE_LOCK))?;
        Ok(buffers.remove(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers
            .read()
            .map(|buffers| buffers.contains_key(name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.buffers.read().map(|buffers| buffers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
