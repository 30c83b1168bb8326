//! Laplace Mechanism for Differential Privacy
//!
//! Adds noise from Laplace(0, b) with `b = Δf/ε`, giving (ε, 0)-DP for a
//! value with L1 sensitivity Δf.
//!
//! # Inverse CDF Sampling
//!
//! ```text
//! U ~ Uniform(-0.5, 0.5)
//! X = -b * sign(U) * ln(1 - 2|U|)  ~  Laplace(0, b)
//! ```

use super::validation::{validate_epsilon, validate_sensitivity};
use crate::error::ConfigError;
use rand::Rng;

/// Laplace mechanism for (ε, 0)-differential privacy
pub struct LaplaceMechanism;

impl LaplaceMechanism {
    /// Sample from Laplace(0, scale); `scale` must be positive and finite
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
        let u = centered_uniform(rng);
        -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
    }

    /// Add Laplace noise calibrated to `sensitivity / epsilon`
    pub fn add_noise<R: Rng + ?Sized>(
        rng: &mut R,
        value: f64,
        sensitivity: f64,
        epsilon: f64,
    ) -> Result<f64, ConfigError> {
        let scale = Self::compute_scale(sensitivity, epsilon)?;
        Ok(value + Self::sample(rng, scale))
    }

    /// scale = Δf / ε
    pub fn compute_scale(sensitivity: f64, epsilon: f64) -> Result<f64, ConfigError> {
        validate_sensitivity(sensitivity)?;
        validate_epsilon(epsilon)?;
        Ok(sensitivity / epsilon)
    }

    /// Var(Lap(0, b)) = 2b²
    pub fn variance(sensitivity: f64, epsilon: f64) -> Result<f64, ConfigError> {
        let scale = Self::compute_scale(sensitivity, epsilon)?;
        Ok(2.0 * scale * scale)
    }

    pub fn std_dev(sensitivity: f64, epsilon: f64) -> Result<f64, ConfigError> {
        Ok(Self::variance(sensitivity, epsilon)?.sqrt())
    }

    /// Half-width of the interval holding 95% of the noise, `-b ln(0.05)`
    pub fn confidence_interval_95(sensitivity: f64, epsilon: f64) -> Result<f64, ConfigError> {
        let scale = Self::compute_scale(sensitivity, epsilon)?;
        Ok(-scale * 0.05_f64.ln())
    }
}

/// Uniform sample in the open interval (-0.5, 0.5)
fn centered_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u = rng.gen::<f64>() - 0.5;
        if u > -0.5 {
            return u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_sample_is_finite() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(LaplaceMechanism::sample(&mut rng, 1.0).is_finite());
        }
    }

    #[test]
    fn test_add_noise_rejects_invalid_parameters() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        assert!(LaplaceMechanism::add_noise(&mut rng, 1.0, 1.0, 0.0).is_err());
        assert!(LaplaceMechanism::add_noise(&mut rng, 1.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_variance_calculation() {
        let variance = LaplaceMechanism::variance(1.0, 0.1).unwrap();
        // 2 * (1/0.1)^2
        assert!((variance - 200.0).abs() < 1e-10);
        assert!((LaplaceMechanism::std_dev(1.0, 0.1).unwrap() - 200f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_confidence_interval() {
        let half_width = LaplaceMechanism::confidence_interval_95(1.0, 1.0).unwrap();
        assert!((half_width - 20f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_mean_approximately_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let n = 10_000;
        let mean: f64 = (0..n).map(|_| LaplaceMechanism::sample(&mut rng, 1.0)).sum::<f64>() / n as f64;
        let se = 2f64.sqrt() / (n as f64).sqrt();
        assert!(mean.abs() < 4.0 * se, "mean {} too far from 0", mean);
    }

    #[test]
    fn test_sample_variance_approximately_correct() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let scale = 2.0;
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| LaplaceMechanism::sample(&mut rng, scale)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let expected = 2.0 * scale * scale;
        assert!(
            (variance - expected).abs() / expected < 0.1,
            "variance {} too far from expected {}",
            variance,
            expected
        );
    }
}
