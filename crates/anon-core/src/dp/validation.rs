//! Input Validation for Differential Privacy Parameters
//!
//! Rejects parameters that would make a noise release meaningless before any
//! value is touched.
//!
//! # Parameter Constraints
//!
//! ## Epsilon (ε)
//! - Must be positive and finite
//! - Smaller = more private, but more noise
//! - Values above [`MAX_EPSILON`] are accepted with a warning
//!
//! ## Delta (δ)
//! - Must be in (0, 1) for the Gaussian mechanism
//! - Should be cryptographically small (< 1/dataset_size)
//! - Values above [`MAX_DELTA`] are accepted with a warning
//!
//! ## Sensitivity (Δf)
//! - Must be positive and finite
//! - For per-record value perturbation: the width of the value range one
//!   record may contribute

use crate::error::ConfigError;
use tracing::warn;

/// Epsilon beyond which privacy protection is negligible
pub const MAX_EPSILON: f64 = 10.0;

/// Delta beyond which the (ε, δ) guarantee is considered weak
pub const MAX_DELTA: f64 = 0.01;

/// Minimum epsilon (smaller would add unbounded noise)
pub const MIN_EPSILON: f64 = 1e-10;

/// Minimum sensitivity
pub const MIN_SENSITIVITY: f64 = 1e-15;

fn invalid(name: &'static str, value: f64, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate epsilon
pub fn validate_epsilon(epsilon: f64) -> Result<(), ConfigError> {
    if !epsilon.is_finite() {
        return Err(invalid("epsilon", epsilon, "must be a finite number"));
    }
    if epsilon <= 0.0 {
        return Err(invalid("epsilon", epsilon, "must be positive"));
    }
    if epsilon < MIN_EPSILON {
        return Err(invalid("epsilon", epsilon, "too small, noise would be unbounded"));
    }
    if epsilon > MAX_EPSILON {
        warn!(epsilon, max = MAX_EPSILON, "epsilon provides minimal privacy protection");
    }
    Ok(())
}

/// Validate delta for (ε, δ)-DP
pub fn validate_delta(delta: f64) -> Result<(), ConfigError> {
    if !delta.is_finite() {
        return Err(invalid("delta", delta, "must be a finite number"));
    }
    if delta <= 0.0 || delta >= 1.0 {
        return Err(invalid("delta", delta, "must be in (0, 1)"));
    }
    if delta > MAX_DELTA {
        warn!(delta, max = MAX_DELTA, "delta is large, privacy guarantee is weak");
    }
    Ok(())
}

/// Validate sensitivity
pub fn validate_sensitivity(sensitivity: f64) -> Result<(), ConfigError> {
    if !sensitivity.is_finite() {
        return Err(invalid("sensitivity", sensitivity, "must be a finite number"));
    }
    if sensitivity <= 0.0 {
        return Err(invalid("sensitivity", sensitivity, "must be positive"));
    }
    if sensitivity < MIN_SENSITIVITY {
        return Err(invalid("sensitivity", sensitivity, "too small, likely a computation error"));
    }
    Ok(())
}

/// Validate that delta is below 1/n for a dataset of `records`
pub fn validate_delta_for_dataset(delta: f64, records: usize) -> Result<(), ConfigError> {
    if records == 0 {
        return Err(ConfigError::InvalidDataset("dataset must contain at least one record".to_string()));
    }
    let max_delta = 1.0 / records as f64;
    if delta > max_delta {
        return Err(ConfigError::InvalidParameter {
            name: "delta",
            value: delta.to_string(),
            reason: format!("too large for {} records, should be < {}", records, max_delta),
        });
    }
    Ok(())
}
