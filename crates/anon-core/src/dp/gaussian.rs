//! Gaussian Mechanism for Differential Privacy
//!
//! Adds N(0, σ²) noise with
//!
//! ```text
//! σ = Δ₂f · √(2 ln(1.25/δ)) / ε
//! ```
//!
//! giving (ε, δ)-differential privacy. The bound is proven for ε < 1 only;
//! larger ε is accepted with a warning since the calibrated σ no longer
//! carries the stated guarantee. Standard normal samples come from the
//! Box-Muller transform.

use super::validation::{validate_delta, validate_epsilon, validate_sensitivity};
use crate::error::ConfigError;
use rand::Rng;
use std::f64::consts::PI;
use tracing::warn;

/// ε at or above which the classical σ bound stops holding
pub const CLASSICAL_BOUND_EPSILON: f64 = 1.0;

/// Gaussian mechanism for (ε, δ)-differential privacy
pub struct GaussianMechanism;

impl GaussianMechanism {
    /// Sample from N(0, 1) using the Box-Muller transform
    pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // u1 in (0, 1] keeps ln finite
        let u1 = 1.0 - rng.gen::<f64>();
        let u2 = rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Sample from N(0, σ²); `sigma` must be positive and finite
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> f64 {
        Self::sample_standard_normal(rng) * sigma
    }

    /// σ = Δf · √(2 ln(1.25/δ)) / ε
    pub fn compute_sigma(sensitivity: f64, epsilon: f64, delta: f64) -> Result<f64, ConfigError> {
        validate_sensitivity(sensitivity)?;
        validate_epsilon(epsilon)?;
        validate_delta(delta)?;
        if !Self::within_classical_bound(epsilon) {
            warn!(
                epsilon,
                bound = CLASSICAL_BOUND_EPSILON,
                "gaussian sigma bound assumes epsilon < 1, guarantee is not proven"
            );
        }
        Ok(sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon)
    }

    /// Whether the classical σ bound covers `epsilon`
    pub fn within_classical_bound(epsilon: f64) -> bool {
        epsilon < CLASSICAL_BOUND_EPSILON
    }

    pub fn add_noise<R: Rng + ?Sized>(
        rng: &mut R,
        value: f64,
        sensitivity: f64,
        epsilon: f64,
        delta: f64,
    ) -> Result<f64, ConfigError> {
        let sigma = Self::compute_sigma(sensitivity, epsilon, delta)?;
        Ok(value + Self::sample(rng, sigma))
    }

    /// Var = σ²
    pub fn variance(sensitivity: f64, epsilon: f64, delta: f64) -> Result<f64, ConfigError> {
        let sigma = Self::compute_sigma(sensitivity, epsilon, delta)?;
        Ok(sigma * sigma)
    }

    /// Half-width of the interval holding 95% of the noise, 1.96σ
    pub fn confidence_interval_95(sensitivity: f64, epsilon: f64, delta: f64) -> Result<f64, ConfigError> {
        Ok(1.96 * Self::compute_sigma(sensitivity, epsilon, delta)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_compute_sigma() {
        let sigma = GaussianMechanism::compute_sigma(1.0, 1.0, 1e-5).unwrap();
        let expected = (2.0 * (1.25f64 / 1e-5).ln()).sqrt();
        assert!((sigma - expected).abs() < 1e-12);
        // σ shrinks as ε grows
        assert!(GaussianMechanism::compute_sigma(1.0, 2.0, 1e-5).unwrap() < sigma);
    }

    #[test]
    fn test_classical_bound_range() {
        assert!(GaussianMechanism::within_classical_bound(0.5));
        assert!(!GaussianMechanism::within_classical_bound(1.0));
        assert!(!GaussianMechanism::within_classical_bound(3.0));
        // accepted outside the bound, σ still follows the formula
        let sigma = GaussianMechanism::compute_sigma(2.0, 4.0, 1e-5).unwrap();
        assert!((sigma - 0.5 * (2.0 * (1.25f64 / 1e-5).ln()).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_delta_rejected() {
        assert!(GaussianMechanism::compute_sigma(1.0, 1.0, 0.0).is_err());
        assert!(GaussianMechanism::compute_sigma(1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let n = 20_000;
        let samples: Vec<f64> = (0..n)
            .map(|_| GaussianMechanism::sample_standard_normal(&mut rng))
            .collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((variance - 1.0).abs() < 0.05, "variance {}", variance);
    }

    #[test]
    fn test_confidence_interval() {
        let sigma = GaussianMechanism::compute_sigma(1.0, 0.5, 1e-6).unwrap();
        let ci = GaussianMechanism::confidence_interval_95(1.0, 0.5, 1e-6).unwrap();
        assert!((ci - 1.96 * sigma).abs() < 1e-12);
        assert!((GaussianMechanism::variance(1.0, 0.5, 1e-6).unwrap() - sigma * sigma).abs() < 1e-9);
    }
}
