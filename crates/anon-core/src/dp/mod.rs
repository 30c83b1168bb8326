//! Differential privacy noise engine
//!
//! Perturbs numeric attributes value by value with calibrated noise:
//! - Laplace mechanism for (ε, 0)-DP, scale `Δ/ε`
//! - Gaussian mechanism for (ε, δ)-DP, `σ = Δ·√(2 ln(1.25/δ))/ε`
//!
//! # Mathematical Guarantees
//!
//! For neighboring datasets D and D' and any output set S:
//!
//! P[M(D) ∈ S] ≤ e^ε · P[M(D') ∈ S] + δ
//!
//! # Composition across attributes
//!
//! Under [`Composition::Parallel`] every attribute is perturbed at the full ε.
//! Under [`Composition::Sequential`] ε is split evenly across the m attributes.
//!
//! The attributes describe the same records, so the release always composes
//! sequentially across them: the aggregate ε in the report is the sum of the
//! per-attribute ε values. Under `Parallel` that is m·ε, not ε. The policy
//! name only says how the declared ε is handed to each attribute.
//!
//! # Example
//!
//! ```
//! use anon_core::dp::{apply_differential_privacy, DifferentialPrivacyConfig};
//! use anon_core::{Attribute, AttributeRole, AttributeType, CancellationToken, Dataset, Value};
//!
//! let schema = vec![Attribute::new("income", AttributeRole::Sensitive, AttributeType::Numeric)];
//! let rows = (0..10).map(|i| vec![Value::from(1000.0 * i as f64)]).collect();
//! let dataset = Dataset::new(schema, rows).unwrap();
//!
//! let config = DifferentialPrivacyConfig::new(1.0, 100.0).with_seed(7);
//! let (noisy, report) = apply_differential_privacy(&dataset, &config, &CancellationToken::new())
//!     .unwrap()
//!     .completed()
//!     .unwrap();
//! assert_eq!(noisy.len(), 10);
//! assert_eq!(report.attributes[0].scale, 100.0);
//! ```

pub mod budget;
pub mod gaussian;
pub mod laplace;
pub mod validation;

pub use budget::{advanced_composition, basic_composition, BudgetAccount, BudgetError, CompositionTheorem};
pub use gaussian::GaussianMechanism;
pub use laplace::LaplaceMechanism;
pub use validation::{validate_delta, validate_epsilon, validate_sensitivity};

use crate::cancel::{bail_if_cancelled, CancellationToken, Outcome};
use crate::dataset::{AttributeType, Dataset, Value};
use crate::error::{AnonError, ConfigError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default δ for the Gaussian mechanism
pub const DEFAULT_DELTA: f64 = 1e-6;

/// Rows processed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 1024;

fn default_delta() -> f64 {
    DEFAULT_DELTA
}

fn default_sensitivity() -> f64 {
    1.0
}

/// Noise distribution
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseMechanism {
    #[default]
    Laplace,
    Gaussian {
        #[serde(default = "default_delta")]
        delta: f64,
    },
}

impl NoiseMechanism {
    pub fn delta(&self) -> Option<f64> {
        match self {
            NoiseMechanism::Laplace => None,
            NoiseMechanism::Gaussian { delta } => Some(*delta),
        }
    }

    /// Noise scale for one attribute: Laplace `b` or Gaussian `σ`
    pub fn scale(&self, sensitivity: f64, epsilon: f64) -> std::result::Result<f64, ConfigError> {
        match self {
            NoiseMechanism::Laplace => LaplaceMechanism::compute_scale(sensitivity, epsilon),
            NoiseMechanism::Gaussian { delta } => GaussianMechanism::compute_sigma(sensitivity, epsilon, *delta),
        }
    }

    /// Variance of the noise added at the given scale
    pub fn variance_at(&self, scale: f64) -> f64 {
        match self {
            NoiseMechanism::Laplace => 2.0 * scale * scale,
            NoiseMechanism::Gaussian { .. } => scale * scale,
        }
    }

    fn sample(&self, rng: &mut ChaCha20Rng, scale: f64) -> f64 {
        match self {
            NoiseMechanism::Laplace => LaplaceMechanism::sample(rng, scale),
            NoiseMechanism::Gaussian { .. } => GaussianMechanism::sample(rng, scale),
        }
    }
}

impl fmt::Display for NoiseMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseMechanism::Laplace => write!(f, "laplace"),
            NoiseMechanism::Gaussian { delta } => write!(f, "gaussian(δ={})", delta),
        }
    }
}

impl FromStr for NoiseMechanism {
    type Err = ConfigError;

    /// Parses `laplace` or `gaussian`; the latter takes [`DEFAULT_DELTA`]
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "laplace" => Ok(NoiseMechanism::Laplace),
            "gaussian" => Ok(NoiseMechanism::Gaussian { delta: DEFAULT_DELTA }),
            _ => Err(ConfigError::UnknownName {
                kind: "noise mechanism",
                value: s.to_string(),
            }),
        }
    }
}

/// How the declared ε is handed to several attributes
///
/// This is an allocation policy, not a claim about the guarantee. Noise on m
/// attributes of the same records costs the sum of the per-attribute ε
/// values, which [`NoiseReport::aggregate_epsilon`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    /// Every attribute gets the full ε; the release costs m·ε
    #[default]
    Parallel,
    /// Each of m attributes gets ε / m; the release costs ε
    Sequential,
}

impl FromStr for Composition {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Composition::Parallel),
            "sequential" | "split" => Ok(Composition::Sequential),
            _ => Err(ConfigError::UnknownName {
                kind: "composition",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialPrivacyConfig {
    /// Attributes to perturb; empty means every numeric attribute
    #[serde(default)]
    pub numeric_attributes: Vec<String>,
    pub epsilon: f64,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub mechanism: NoiseMechanism,
    /// Clip noisy values to the attribute's observed range
    #[serde(default)]
    pub bounded_domain: bool,
    #[serde(default)]
    pub composition: Composition,
    /// Seed for reproducible noise; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DifferentialPrivacyConfig {
    pub fn new(epsilon: f64, sensitivity: f64) -> Self {
        Self {
            numeric_attributes: Vec::new(),
            epsilon,
            sensitivity,
            mechanism: NoiseMechanism::Laplace,
            bounded_domain: false,
            composition: Composition::Parallel,
            seed: None,
        }
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mechanism(mut self, mechanism: NoiseMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_bounded_domain(mut self, bounded: bool) -> Self {
        self.bounded_domain = bounded;
        self
    }

    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = composition;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        validate_epsilon(self.epsilon)?;
        validate_sensitivity(self.sensitivity)?;
        if let Some(delta) = self.mechanism.delta() {
            validate_delta(delta)?;
        }
        Ok(())
    }

    /// ε given to each of `attributes` perturbed attributes
    pub fn per_attribute_epsilon(&self, attributes: usize) -> f64 {
        match self.composition {
            Composition::Parallel => self.epsilon,
            Composition::Sequential => self.epsilon / attributes.max(1) as f64,
        }
    }
}

/// Noise applied to one attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeNoise {
    pub attribute: String,
    pub epsilon: f64,
    /// Laplace `b` or Gaussian `σ`
    pub scale: f64,
    pub variance: f64,
    pub noised_values: usize,
    pub clipped_values: usize,
    /// Observed `(min, max)` used for clipping
    pub domain: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseReport {
    pub mechanism: NoiseMechanism,
    pub composition: Composition,
    pub epsilon: f64,
    pub sensitivity: f64,
    /// Total ε spent by the release: the per-attribute ε values summed
    /// (sequential composition over attributes of the same records)
    pub aggregate_epsilon: f64,
    pub aggregate_delta: Option<f64>,
    pub bounded_domain: bool,
    pub attributes: Vec<AttributeNoise>,
    pub notes: Vec<String>,
}

/// Add calibrated noise to numeric attributes
///
/// Nulls stay null and non-numeric cells (generalized bands, suppression
/// markers) pass through untouched. Row order, lineage and suppression flags
/// are preserved.
///
/// # Errors
///
/// - [`ConfigError`] for invalid ε, δ, sensitivity or attribute selection
/// - [`AnonError::NumericDomain`] when a scale or noisy value is not finite
pub fn apply_differential_privacy(
    dataset: &Dataset,
    config: &DifferentialPrivacyConfig,
    cancel: &CancellationToken,
) -> Result<Outcome<(Dataset, NoiseReport)>> {
    config.validate()?;
    let columns = resolve_numeric_attributes(dataset, &config.numeric_attributes)?;
    bail_if_cancelled!(cancel);

    if let Some(delta) = config.mechanism.delta() {
        if let Err(e) = validation::validate_delta_for_dataset(delta, dataset.len()) {
            warn!(%e, "delta exceeds 1/n");
        }
    }

    let epsilon = config.per_attribute_epsilon(columns.len());
    let mut attributes = Vec::with_capacity(columns.len());
    for &col in &columns {
        let name = dataset.attribute(col).name.clone();
        let scale = config.mechanism.scale(config.sensitivity, epsilon)?;
        if !scale.is_finite() {
            return Err(AnonError::NumericDomain {
                attribute: name,
                value: scale,
                reason: "noise scale is not finite".to_string(),
            });
        }
        let domain = if config.bounded_domain {
            observed_range(dataset, col)
        } else {
            None
        };
        attributes.push(AttributeNoise {
            attribute: name,
            epsilon,
            scale,
            variance: config.mechanism.variance_at(scale),
            noised_values: 0,
            clipped_values: 0,
            domain,
        });
    }

    let mut rng = match config.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(dataset.len());
    for (row_idx, source) in dataset.rows().iter().enumerate() {
        if row_idx % CANCEL_CHECK_INTERVAL == 0 {
            bail_if_cancelled!(cancel);
        }
        let mut row = source.clone();
        for (noise, &col) in attributes.iter_mut().zip(&columns) {
            let Value::Number(original) = row[col] else {
                continue;
            };
            let mut noisy = original + config.mechanism.sample(&mut rng, noise.scale);
            if !noisy.is_finite() {
                return Err(AnonError::NumericDomain {
                    attribute: noise.attribute.clone(),
                    value: noisy,
                    reason: format!("noisy value for record {} is not finite", row_idx),
                });
            }
            if let Some((lo, hi)) = noise.domain {
                if noisy < lo || noisy > hi {
                    noisy = noisy.clamp(lo, hi);
                    noise.clipped_values += 1;
                }
            }
            row[col] = Value::Number(noisy);
            noise.noised_values += 1;
        }
        rows.push(row);
    }

    let per_attribute: Vec<f64> = attributes.iter().map(|a| a.epsilon).collect();
    let aggregate_epsilon = basic_composition(&per_attribute);
    let aggregate_delta = config.mechanism.delta().map(|d| d * attributes.len() as f64);

    let mut notes = Vec::new();
    if config.bounded_domain {
        notes.push(
            "noisy values were clipped to each attribute's observed range; clipping is post-processing \
             and is counted within the declared epsilon"
                .to_string(),
        );
    }
    if config.mechanism.delta().is_some() && !GaussianMechanism::within_classical_bound(epsilon) {
        notes.push(format!(
            "gaussian noise at epsilon {} per attribute: the sigma bound is proven for epsilon < 1 only",
            epsilon
        ));
    }
    if config.composition == Composition::Parallel && attributes.len() > 1 {
        notes.push(format!(
            "parallel policy: each of {} attributes used the full epsilon {}; the attributes share records, \
             so the release composes sequentially to epsilon {}",
            attributes.len(),
            config.epsilon,
            aggregate_epsilon
        ));
    }

    info!(
        mechanism = %config.mechanism,
        attributes = attributes.len(),
        epsilon = config.epsilon,
        aggregate_epsilon,
        "noise applied"
    );
    for noise in &attributes {
        debug!(attribute = %noise.attribute, scale = noise.scale, clipped = noise.clipped_values, "attribute perturbed");
    }

    let lineage = dataset.lineage().map(<[usize]>::to_vec);
    let suppressed = (0..dataset.len()).map(|i| dataset.is_suppressed(i)).collect();
    let noisy = Dataset::derived(dataset.schema().to_vec(), rows, lineage, suppressed);

    Ok(Outcome::Completed((
        noisy,
        NoiseReport {
            mechanism: config.mechanism,
            composition: config.composition,
            epsilon: config.epsilon,
            sensitivity: config.sensitivity,
            aggregate_epsilon,
            aggregate_delta,
            bounded_domain: config.bounded_domain,
            attributes,
            notes,
        },
    )))
}

/// Charge the release's aggregate ε (and δ) against `account`, then apply noise
///
/// The account is left untouched when validation fails, the budget is
/// insufficient or the release itself fails. Configuration problems surface
/// as [`BudgetError::Invalid`]; any other engine error is passed through
/// unchanged as [`BudgetError::Anon`].
pub fn apply_with_budget(
    dataset: &Dataset,
    config: &DifferentialPrivacyConfig,
    account: &mut BudgetAccount,
    cancel: &CancellationToken,
) -> std::result::Result<Outcome<(Dataset, NoiseReport)>, BudgetError> {
    config.validate()?;
    let columns = resolve_numeric_attributes(dataset, &config.numeric_attributes)?;
    let epsilon = config.per_attribute_epsilon(columns.len()) * columns.len() as f64;
    let delta = config.mechanism.delta().map_or(0.0, |d| d * columns.len() as f64);

    let mut trial = account.clone();
    trial.check_and_consume_with_delta(epsilon, delta)?;

    match apply_differential_privacy(dataset, config, cancel) {
        Ok(Outcome::Completed(result)) => {
            *account = trial;
            Ok(Outcome::Completed(result))
        }
        Ok(Outcome::Cancelled) => Ok(Outcome::Cancelled),
        Err(e) => Err(e.into()),
    }
}

fn resolve_numeric_attributes(dataset: &Dataset, names: &[String]) -> Result<Vec<usize>> {
    if names.is_empty() {
        let all: Vec<usize> = dataset
            .numeric_attributes()
            .into_iter()
            .filter_map(|name| dataset.index_of(name))
            .collect();
        if all.is_empty() {
            return Err(AnonError::invalid(
                "numeric_attributes",
                "[]",
                "dataset has no numeric attributes to perturb",
            ));
        }
        return Ok(all);
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::DuplicateAttribute(name.clone()).into());
        }
        let col = dataset.require(name)?;
        let kind = dataset.attribute(col).kind;
        if kind != AttributeType::Numeric {
            return Err(AnonError::invalid(
                "numeric_attributes",
                name,
                format!("attribute is {}, not numeric", kind),
            ));
        }
        columns.push(col);
    }
    Ok(columns)
}

fn observed_range(dataset: &Dataset, col: usize) -> Option<(f64, f64)> {
    dataset
        .column(col)
        .filter_map(Value::as_f64)
        .fold(None, |range, x| match range {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}
