//! Privacy budget accounting across noise releases
//!
//! A single [`apply_differential_privacy`](super::apply_differential_privacy)
//! call reports the ε it spends. Callers that publish several noisy releases
//! of the same records charge each release against a [`BudgetAccount`].
//!
//! ## Basic composition
//! k releases at ε_i each cost Σε_i.
//!
//! ## Advanced composition
//! For k releases and slack δ' > 0, the total is
//! `√(2k ln(1/δ')) · ε + k · ε · (e^ε − 1)`, using the RMS of the individual
//! ε values for heterogeneous releases.

use super::validation::{validate_delta, validate_epsilon};
use crate::error::{AnonError, ConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("privacy budget exhausted: need ε={required:.4}, have ε={remaining:.4}")]
    Exhausted { required: f64, remaining: f64 },

    #[error("privacy budget exhausted: need δ={required:e}, have δ={remaining:e}")]
    DeltaExhausted { required: f64, remaining: f64 },

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    /// The release itself failed after the budget check
    #[error(transparent)]
    Anon(AnonError),
}

impl From<AnonError> for BudgetError {
    fn from(error: AnonError) -> Self {
        match error {
            AnonError::Config(c) => BudgetError::Invalid(c),
            other => BudgetError::Anon(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CompositionTheorem {
    Basic,
    Advanced { delta_prime: f64 },
}

/// Running ε/δ spend against a fixed allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAccount {
    total_epsilon: f64,
    total_delta: f64,
    consumed_delta: f64,
    history: Vec<f64>,
    composition: CompositionTheorem,
}

impl BudgetAccount {
    /// Pure ε budget under basic composition
    ///
    /// The total must be a valid ε: positive and finite.
    pub fn new(total_epsilon: f64) -> Result<Self, BudgetError> {
        validate_epsilon(total_epsilon)?;
        Ok(Self {
            total_epsilon,
            total_delta: 0.0,
            consumed_delta: 0.0,
            history: Vec::new(),
            composition: CompositionTheorem::Basic,
        })
    }

    /// (ε, δ) budget under advanced composition with slack `delta_prime`
    pub fn with_delta(total_epsilon: f64, total_delta: f64, delta_prime: f64) -> Result<Self, BudgetError> {
        let account = Self::new(total_epsilon)?;
        if !(0.0..1.0).contains(&total_delta) {
            return Err(invalid_delta("total_delta", total_delta, "must be in [0, 1)"));
        }
        validate_delta(delta_prime).map_err(|_| invalid_delta("delta_prime", delta_prime, "must be in (0, 1)"))?;
        Ok(Self {
            total_delta,
            composition: CompositionTheorem::Advanced { delta_prime },
            ..account
        })
    }

    pub fn total_epsilon(&self) -> f64 {
        self.total_epsilon
    }

    pub fn composition(&self) -> CompositionTheorem {
        self.composition
    }

    pub fn release_count(&self) -> usize {
        self.history.len()
    }

    /// ε spent so far under the configured composition theorem
    pub fn spent_epsilon(&self) -> f64 {
        compose(&self.history, self.composition)
    }

    pub fn remaining_epsilon(&self) -> f64 {
        (self.total_epsilon - self.spent_epsilon()).max(0.0)
    }

    pub fn remaining_delta(&self) -> f64 {
        (self.total_delta - self.consumed_delta).max(0.0)
    }

    /// Whether a release costing (ε, δ) still fits
    pub fn can_afford(&self, epsilon: f64, delta: f64) -> bool {
        let mut history = self.history.clone();
        history.push(epsilon);
        let delta_fits = delta <= 0.0 || self.consumed_delta + delta <= self.total_delta;
        compose(&history, self.composition) <= self.total_epsilon && delta_fits
    }

    /// Charge a pure-ε release
    pub fn check_and_consume(&mut self, epsilon: f64) -> Result<(), BudgetError> {
        self.check_and_consume_with_delta(epsilon, 0.0)
    }

    /// Charge an (ε, δ) release, leaving the account untouched on failure
    pub fn check_and_consume_with_delta(&mut self, epsilon: f64, delta: f64) -> Result<(), BudgetError> {
        validate_epsilon(epsilon)?;
        if !(0.0..1.0).contains(&delta) {
            return Err(invalid_delta("delta", delta, "must be in [0, 1)"));
        }
        if delta > 0.0 && self.consumed_delta + delta > self.total_delta {
            return Err(BudgetError::DeltaExhausted {
                required: delta,
                remaining: self.remaining_delta(),
            });
        }
        if !self.can_afford(epsilon, delta) {
            return Err(BudgetError::Exhausted {
                required: epsilon,
                remaining: self.remaining_epsilon(),
            });
        }

        self.history.push(epsilon);
        self.consumed_delta += delta;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.consumed_delta = 0.0;
    }
}

fn invalid_delta(name: &'static str, value: f64, reason: &str) -> BudgetError {
    ConfigError::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn compose(history: &[f64], composition: CompositionTheorem) -> f64 {
    match composition {
        CompositionTheorem::Basic => basic_composition(history),
        CompositionTheorem::Advanced { delta_prime } => {
            if history.is_empty() {
                return 0.0;
            }
            let k = history.len() as f64;
            let rms = (history.iter().map(|e| e * e).sum::<f64>() / k).sqrt();
            advanced_composition(rms, history.len(), delta_prime)
        }
    }
}

/// Σε_i
pub fn basic_composition(epsilons: &[f64]) -> f64 {
    epsilons.iter().sum()
}

/// `√(2k ln(1/δ')) · ε + k · ε · (e^ε − 1)` for k releases at ε each
pub fn advanced_composition(epsilon: f64, k: usize, delta_prime: f64) -> f64 {
    let k = k as f64;
    (2.0 * k * (1.0 / delta_prime).ln()).sqrt() * epsilon + k * epsilon * (epsilon.exp() - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumption_reduces_remaining() {
        let mut budget = BudgetAccount::new(1.0).unwrap();
        budget.check_and_consume(0.1).unwrap();
        budget.check_and_consume(0.2).unwrap();
        assert_eq!(budget.release_count(), 2);
        assert!((budget.remaining_epsilon() - 0.7).abs() < 1e-10);
    }

    #[test]
    fn test_exhaustion_leaves_account_unchanged() {
        let mut budget = BudgetAccount::new(0.5).unwrap();
        budget.check_and_consume(0.3).unwrap();
        budget.check_and_consume(0.15).unwrap();

        let err = budget.check_and_consume(0.1).unwrap_err();
        assert!(matches!(err, BudgetError::Exhausted { .. }));
        assert_eq!(budget.release_count(), 2);
    }

    #[test]
    fn test_invalid_epsilon_rejected() {
        let mut budget = BudgetAccount::new(1.0).unwrap();
        assert!(matches!(budget.check_and_consume(0.0), Err(BudgetError::Invalid(_))));
        assert!(matches!(
            budget.check_and_consume_with_delta(0.1, 1.5),
            Err(BudgetError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_totals_rejected() {
        for total in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(BudgetAccount::new(total), Err(BudgetError::Invalid(_))), "total {}", total);
        }
        assert!(BudgetAccount::with_delta(1.0, -1e-6, 1e-6).is_err());
        assert!(BudgetAccount::with_delta(1.0, 1e-5, 0.0).is_err());
        assert!(BudgetAccount::with_delta(f64::NAN, 1e-5, 1e-6).is_err());
        assert!(BudgetAccount::with_delta(1.0, 0.0, 1e-6).is_ok());
    }

    #[test]
    fn test_delta_budget() {
        let mut budget = BudgetAccount::with_delta(10.0, 2e-6, 1e-6).unwrap();
        budget.check_and_consume_with_delta(0.1, 1e-6).unwrap();
        budget.check_and_consume_with_delta(0.1, 1e-6).unwrap();
        assert!(matches!(
            budget.check_and_consume_with_delta(0.1, 1e-6),
            Err(BudgetError::DeltaExhausted { .. })
        ));
    }

    #[test]
    fn test_advanced_composition_tighter_for_many_releases() {
        let basic = 0.1 * 100.0;
        let advanced = advanced_composition(0.1, 100, 1e-6);
        // ≈ 5.26 + 1.05
        assert!(advanced < basic);
        assert!(advanced < 8.0);
    }

    #[test]
    fn test_advanced_account_outlasts_basic() {
        let mut budget = BudgetAccount::with_delta(5.0, 1e-5, 1e-6).unwrap();
        for _ in 0..50 {
            budget.check_and_consume(0.1).unwrap();
        }
        assert!(budget.remaining_epsilon() > 0.0);
        assert!(budget.can_afford(0.1, 0.0));
    }

    #[test]
    fn test_reset_and_serde() {
        let mut budget = BudgetAccount::new(2.0).unwrap();
        budget.check_and_consume(0.5).unwrap();

        let json = serde_json::to_string(&budget).unwrap();
        let restored: BudgetAccount = serde_json::from_str(&json).unwrap();
        assert!((restored.remaining_epsilon() - 1.5).abs() < 1e-10);

        budget.reset();
        assert_eq!(budget.remaining_epsilon(), 2.0);
    }
}
