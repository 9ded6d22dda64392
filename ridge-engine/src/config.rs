// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Icarus-Proprietary
// See LICENSE in the repository root for full license terms.

//! Hyperparameters for a ridge readout.
//!
//! Bias augmentation and transient trimming are independent options; any
//! combination is valid.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RidgeError};

/// Configuration of a single ridge readout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeConfig {
    /// Readout name, used as the key prefix of its statistics buffers
    pub name: String,
    /// L2 regularization strength (λ ≥ 0). Zero reduces to ordinary least squares.
    pub ridge: f64,
    /// Learn an intercept by augmenting inputs with a constant feature
    pub input_bias: bool,
    /// Leading timesteps dropped from every batch (washout)
    pub transient: usize,
    /// Output dimension; inferred from the first target batch when unset
    pub output_dim: Option<usize>,
    /// Starting weights (`input_dim × output_dim`), zeros when unset
    pub wout_init: Option<DMatrix<f64>>,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            name: "ridge".to_string(),
            ridge: 0.0,
            input_bias: true,
            transient: 0,
            output_dim: None,
            wout_init: None,
        }
    }
}

impl RidgeConfig {
    pub fn new(ridge: f64) -> Self {
        Self {
            ridge,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_input_bias(mut self, input_bias: bool) -> Self {
        self.input_bias = input_bias;
        self
    }

    /// Discard the first `transient` timesteps of every batch.
    pub fn with_transient(mut self, transient: usize) -> Self {
        self.transient = transient;
        self
    }

    pub fn with_output_dim(mut self, output_dim: usize) -> Self {
        self.output_dim = Some(output_dim);
        self
    }

    /// Provide starting weights instead of zeros.
    pub fn with_wout_init(mut self, wout: DMatrix<f64>) -> Self {
        self.wout_init = Some(wout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RidgeError::InvalidConfig("readout name must not be empty".into()));
        }
        if !self.ridge.is_finite() || self.ridge < 0.0 {
            return Err(RidgeError::InvalidConfig(format!(
                "ridge must be finite and non-negative, got {}",
                self.ridge
            )));
        }
        if self.output_dim == Some(0) {
            return Err(RidgeError::InvalidConfig("output_dim must be positive".into()));
        }
        Ok(())
    }

    /// Width of the regression design: `input_dim`, plus one with bias.
    pub fn design_dim(&self, input_dim: usize) -> usize {
        input_dim + usize::from(self.input_bias)
    }

    /// Store key of the `X^T·X` buffer.
    pub fn xxt_key(&self) -> String {
        format!("{}/XXT", self.name)
    }

    /// Store key of the `Y^T·X` buffer.
    pub fn yxt_key(&self) -> String {
        format!("{}/YXT", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RidgeConfig::default();
        assert_eq!(config.ridge, 0.0);
        assert!(config.input_bias);
        assert_eq!(config.transient, 0);
        assert!(config.output_dim.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_keys() {
        let config = RidgeConfig::new(1e-3)
            .with_name("readout-0")
            .with_input_bias(false)
            .with_transient(10)
            .with_output_dim(3);
        assert_eq!(config.ridge, 1e-3);
        assert!(!config.input_bias);
        assert_eq!(config.transient, 10);
        assert_eq!(config.output_dim, Some(3));
        assert_eq!(config.xxt_key(), "readout-0/XXT");
        assert_eq!(config.yxt_key(), "readout-0/YXT");
        assert_eq!(config.design_dim(5), 5);
        assert_eq!(RidgeConfig::default().design_dim(5), 6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RidgeConfig::new(-1.0).validate().is_err());
        assert!(RidgeConfig::new(f64::NAN).validate().is_err());
        assert!(RidgeConfig::new(f64::INFINITY).validate().is_err());
        assert!(RidgeConfig::default().with_output_dim(0).validate().is_err());
        assert!(RidgeConfig::default().with_name("").validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: RidgeConfig =
            serde_json::from_str(r#"{ "ridge": 0.5, "transient": 3 }"#).unwrap();
        assert_eq!(config.ridge, 0.5);
        assert_eq!(config.transient, 3);
        assert!(config.input_bias);
        assert_eq!(config.name, "ridge");
    }

    #[test]
    fn test_json_roundtrip_with_initial_weights() {
        let config = RidgeConfig::new(0.1).with_wout_init(DMatrix::from_element(2, 1, 0.25));
        let json = serde_json::to_string(&config).unwrap();
        let back: RidgeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
