//! Re-identification Risk Assessment
//!
//! Partitions records into equivalence classes over the quasi-identifiers and
//! scores each class under an attacker model:
//!
//! - **Prosecutor**: the attacker knows the target is in the data; risk `1/s`
//! - **Journalist**: the data is a sample with fraction `f` of a population;
//!   risk `min(1, f/s)` (equal to prosecutor without a fraction)
//! - **Marketer**: the attacker re-identifies as many records as possible;
//!   expected fraction `classes / records`
//!
//! Assessment never modifies the dataset.
//!
//! # Example
//!
//! ```ignore
//! use anon_core::risk::{assess, RiskConfig, AttackerModel};
//!
//! let config = RiskConfig::new(vec!["age".into(), "zip".into()])
//!     .with_attacker_model(AttackerModel::Journalist)
//!     .with_sampling_fraction(0.1);
//! let report = assess(&dataset, &config)?;
//! println!("{} unique records, level {:?}", report.unique_records, report.risk_level);
//! ```

use crate::dataset::{Dataset, Value, ValueKey};
use crate::equivalence::{partition_rows, EquivalenceClass};
use crate::error::{AnonError, ConfigError, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Seed used for deterministic sampling when none is configured
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

/// Upper bound of the low risk band
pub const LOW_RISK_THRESHOLD: f64 = 0.33;

/// Upper bound of the medium risk band
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.67;

/// Population uniqueness is only estimated above this many records
pub const POPULATION_ESTIMATE_MIN_RECORDS: usize = 100;

/// Scale from sample uniqueness to the population estimate
pub const POPULATION_UNIQUENESS_FACTOR: f64 = 1.5;

/// Attacker knowledge assumed when scoring risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackerModel {
    #[default]
    Prosecutor,
    Journalist,
    Marketer,
}

impl FromStr for AttackerModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prosecutor" => Ok(AttackerModel::Prosecutor),
            "journalist" => Ok(AttackerModel::Journalist),
            "marketer" => Ok(AttackerModel::Marketer),
            _ => Err(ConfigError::UnknownName {
                kind: "attacker model",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttackerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackerModel::Prosecutor => f.write_str("prosecutor"),
            AttackerModel::Journalist => f.write_str("journalist"),
            AttackerModel::Marketer => f.write_str("marketer"),
        }
    }
}

/// Coarse classification of a risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= LOW_RISK_THRESHOLD {
            RiskLevel::Low
        } else if score <= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Parameters of a risk assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub quasi_identifiers: Vec<String>,
    #[serde(default)]
    pub sensitive_attribute: Option<String>,
    #[serde(default)]
    pub attacker_model: AttackerModel,
    /// Classes smaller than this count as violations
    #[serde(default = "default_k_threshold")]
    pub k_threshold: usize,
    /// Analyse a seeded sample of this many rows (clamped to the dataset)
    #[serde(default)]
    pub sample_size: Option<usize>,
    /// Fraction of the population present in the data (journalist model)
    #[serde(default)]
    pub sampling_fraction: Option<f64>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_k_threshold() -> usize {
    3
}

fn default_seed() -> u64 {
    DEFAULT_SAMPLE_SEED
}

impl RiskConfig {
    pub fn new(quasi_identifiers: Vec<String>) -> Self {
        Self {
            quasi_identifiers,
            sensitive_attribute: None,
            attacker_model: AttackerModel::default(),
            k_threshold: default_k_threshold(),
            sample_size: None,
            sampling_fraction: None,
            seed: DEFAULT_SAMPLE_SEED,
        }
    }

    /// Configuration taken from the roles declared in the schema
    pub fn for_dataset(dataset: &Dataset) -> Self {
        let qis = dataset
            .quasi_identifiers()
            .into_iter()
            .map(String::from)
            .collect();
        let mut config = Self::new(qis);
        config.sensitive_attribute = dataset.sensitive_attributes().first().map(|s| s.to_string());
        config
    }

    pub fn with_sensitive_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.sensitive_attribute = Some(attribute.into());
        self
    }

    pub fn with_attacker_model(mut self, model: AttackerModel) -> Self {
        self.attacker_model = model;
        self
    }

    pub fn with_k_threshold(mut self, k: usize) -> Self {
        self.k_threshold = k;
        self
    }

    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = Some(size);
        self
    }

    pub fn with_sampling_fraction(mut self, fraction: f64) -> Self {
        self.sampling_fraction = Some(fraction);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve attribute names against the dataset and check parameters
    fn resolve(&self, dataset: &Dataset) -> Result<(Vec<usize>, Option<usize>)> {
        let qis = resolve_quasi_identifiers(dataset, &self.quasi_identifiers)?;
        if self.k_threshold == 0 {
            return Err(AnonError::invalid("k_threshold", 0, "must be at least 1"));
        }
        if let Some(f) = self.sampling_fraction {
            if !f.is_finite() || f <= 0.0 || f > 1.0 {
                return Err(AnonError::invalid("sampling_fraction", f, "must be in (0, 1]"));
            }
        }
        if self.sample_size == Some(0) {
            return Err(AnonError::invalid("sample_size", 0, "must be at least 1"));
        }
        let sensitive = match &self.sensitive_attribute {
            Some(name) => Some(dataset.require(name)?),
            None => None,
        };
        Ok((qis, sensitive))
    }
}

/// Resolve quasi-identifier names to column indices
///
/// Rejects an empty list, duplicates and names missing from the schema.
pub(crate) fn resolve_quasi_identifiers(dataset: &Dataset, names: &[String]) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Err(ConfigError::EmptyQuasiIdentifiers.into());
    }
    let mut seen = HashSet::new();
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::DuplicateAttribute(name.clone()).into());
        }
        indices.push(dataset.require(name)?);
    }
    Ok(indices)
}

/// Risk summary for one equivalence class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRisk {
    /// Quasi-identifier labels of the class
    pub values: Vec<String>,
    pub size: usize,
    /// Per-record risk under the configured attacker model
    pub risk: f64,
}

/// Disclosure risks for the sensitive attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitiveRisk {
    pub attribute: String,
    /// Record-weighted mean of 1 / distinct sensitive values per class
    pub disclosure_risk: f64,
    /// Fraction of records in classes with a single sensitive value
    pub homogeneity_risk: f64,
}

/// Result of a risk assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub attacker_model: AttackerModel,
    pub quasi_identifiers: Vec<String>,
    pub k_threshold: usize,
    /// Rows analysed (after sampling and excluding suppressed rows)
    pub records_analyzed: usize,
    pub class_count: usize,
    pub min_class_size: usize,
    /// Classes smaller than `k_threshold`
    pub violating_classes: usize,
    /// Records in violating classes
    pub records_at_risk: usize,
    /// Records alone in their class
    pub unique_records: usize,
    /// Mean per-record risk under the configured model
    pub mean_risk: f64,
    /// Maximum per-record risk under the configured model
    pub max_risk: f64,
    /// Worst-case record risk, 1 / smallest class
    pub prosecutor_risk: f64,
    /// Worst-case record risk scaled by the sampling fraction
    pub journalist_risk: f64,
    /// Expected fraction of records re-identified, classes / records
    pub marketer_risk: f64,
    pub risk_level: RiskLevel,
    /// unique records / records analysed
    pub sample_uniqueness: f64,
    /// `min(1.5 × sample uniqueness, 1)`, assuming a much larger population;
    /// only estimated when more than 100 records were analysed
    pub estimated_population_uniqueness: Option<f64>,
    pub sensitive: Option<SensitiveRisk>,
    /// Classes ordered by size ascending
    pub classes: Vec<ClassRisk>,
}

impl RiskReport {
    /// Metric name → value view of the scalar results
    pub fn metrics(&self) -> BTreeMap<&'static str, f64> {
        let mut metrics = BTreeMap::from([
            ("records_analyzed", self.records_analyzed as f64),
            ("class_count", self.class_count as f64),
            ("min_class_size", self.min_class_size as f64),
            ("violating_classes", self.violating_classes as f64),
            ("records_at_risk", self.records_at_risk as f64),
            ("unique_records", self.unique_records as f64),
            ("mean_risk", self.mean_risk),
            ("max_risk", self.max_risk),
            ("prosecutor_risk", self.prosecutor_risk),
            ("journalist_risk", self.journalist_risk),
            ("marketer_risk", self.marketer_risk),
            ("sample_uniqueness", self.sample_uniqueness),
        ]);
        if let Some(estimate) = self.estimated_population_uniqueness {
            metrics.insert("estimated_population_uniqueness", estimate);
        }
        if let Some(sensitive) = &self.sensitive {
            metrics.insert("disclosure_risk", sensitive.disclosure_risk);
            metrics.insert("homogeneity_risk", sensitive.homogeneity_risk);
        }
        metrics
    }

    /// Remediation hints derived from the report
    pub fn recommendations(&self) -> Vec<String> {
        let mut hints = Vec::new();
        hints.push(
            match self.risk_level {
                RiskLevel::High => "High risk: apply strong privacy enhancement before release",
                RiskLevel::Medium => "Medium risk: consider applying privacy enhancement",
                RiskLevel::Low => "Low risk: current privacy level may be acceptable for some uses",
            }
            .to_string(),
        );
        if self.violating_classes > 0 {
            hints.push(format!(
                "Apply k-anonymity with k >= {} to address {} violating equivalence classes",
                self.k_threshold, self.violating_classes
            ));
        }
        if self.unique_records > 0 {
            hints.push(format!(
                "Remove or generalize the {} unique records",
                self.unique_records
            ));
        }
        if let Some(sensitive) = &self.sensitive {
            if sensitive.disclosure_risk > 0.7 {
                hints.push(format!(
                    "Apply l-diversity or t-closeness to sensitive attribute '{}'",
                    sensitive.attribute
                ));
            }
        }
        if self.quasi_identifiers.len() > 5 {
            hints.push("Reduce the number of quasi-identifiers".to_string());
        }
        hints
    }
}

/// Assess re-identification risk
pub fn assess(dataset: &Dataset, config: &RiskConfig) -> Result<RiskReport> {
    let (qis, sensitive) = config.resolve(dataset)?;

    let retained: Vec<usize> = dataset.retained_rows().collect();
    let rows = match config.sample_size {
        Some(size) if size < retained.len() => sample_rows(&retained, size, config.seed),
        _ => retained,
    };
    let n = rows.len();

    let mut classes = partition_rows(dataset, &rows, &qis);
    classes.sort_by_key(EquivalenceClass::size);
    debug!(records = n, classes = classes.len(), "partitioned records");

    let fraction = config.sampling_fraction.unwrap_or(1.0);
    let record_risk = |size: usize| -> f64 {
        match config.attacker_model {
            AttackerModel::Journalist => (fraction / size as f64).min(1.0),
            AttackerModel::Prosecutor | AttackerModel::Marketer => 1.0 / size as f64,
        }
    };

    let min_class_size = classes.first().map_or(0, EquivalenceClass::size);
    let violating: Vec<&EquivalenceClass> = classes
        .iter()
        .filter(|c| c.size() < config.k_threshold)
        .collect();
    let records_at_risk = violating.iter().map(|c| c.size()).sum();
    let unique_records = classes.iter().filter(|c| c.size() == 1).count();

    let (mean_risk, max_risk) = if n == 0 {
        (0.0, 0.0)
    } else {
        let total: f64 = classes.iter().map(|c| record_risk(c.size()) * c.size() as f64).sum();
        (total / n as f64, record_risk(min_class_size))
    };

    let (prosecutor_risk, journalist_risk, marketer_risk) = if n == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let worst = 1.0 / min_class_size as f64;
        (
            worst,
            (fraction * worst).min(1.0),
            classes.len() as f64 / n as f64,
        )
    };

    let sample_uniqueness = if n == 0 { 0.0 } else { unique_records as f64 / n as f64 };
    let sensitive = sensitive.map(|idx| sensitive_risk(dataset, idx, &classes, n));

    let report = RiskReport {
        attacker_model: config.attacker_model,
        quasi_identifiers: config.quasi_identifiers.clone(),
        k_threshold: config.k_threshold,
        records_analyzed: n,
        class_count: classes.len(),
        min_class_size,
        violating_classes: violating.len(),
        records_at_risk,
        unique_records,
        mean_risk,
        max_risk,
        prosecutor_risk,
        journalist_risk,
        marketer_risk,
        risk_level: RiskLevel::from_score(mean_risk),
        sample_uniqueness,
        estimated_population_uniqueness: estimate_population_uniqueness(sample_uniqueness, n),
        sensitive,
        classes: classes
            .iter()
            .map(|c| ClassRisk {
                values: c.key.clone(),
                size: c.size(),
                risk: record_risk(c.size()),
            })
            .collect(),
    };

    info!(
        model = %config.attacker_model,
        records = n,
        classes = report.class_count,
        violating = report.violating_classes,
        mean_risk = report.mean_risk,
        "risk assessed"
    );
    Ok(report)
}

fn sample_rows(rows: &[usize], size: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, rows.len(), size)
        .into_iter()
        .map(|i| rows[i])
        .collect();
    picked.sort_unstable();
    picked
}

fn estimate_population_uniqueness(sample_uniqueness: f64, records: usize) -> Option<f64> {
    (records > POPULATION_ESTIMATE_MIN_RECORDS)
        .then(|| (sample_uniqueness * POPULATION_UNIQUENESS_FACTOR).min(1.0))
}

fn sensitive_risk(dataset: &Dataset, column: usize, classes: &[EquivalenceClass], n: usize) -> SensitiveRisk {
    let mut disclosure = 0.0;
    let mut homogeneous = 0usize;
    for class in classes {
        let distinct: HashSet<ValueKey> = class
            .rows
            .iter()
            .map(|&r| dataset.value(r, column))
            .filter(|v| !v.is_null())
            .map(Value::key)
            .collect();
        if distinct.is_empty() {
            continue;
        }
        disclosure += class.size() as f64 / distinct.len() as f64;
        if distinct.len() == 1 {
            homogeneous += class.size();
        }
    }
    let n = n.max(1) as f64;
    SensitiveRisk {
        attribute: dataset.attribute(column).name.clone(),
        disclosure_risk: disclosure / n,
        homogeneity_risk: homogeneous as f64 / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attribute, AttributeRole, AttributeType};

    /// Classes of sizes 1, 2 and 3 over (age, zip)
    fn dataset() -> Dataset {
        let schema = vec![
            Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = [
            (30, "02139", "flu"),
            (40, "02139", "flu"),
            (40, "02139", "flu"),
            (50, "02141", "flu"),
            (50, "02141", "cold"),
            (50, "02141", "asthma"),
        ]
        .iter()
        .map(|(a, z, d)| vec![Value::from(*a), Value::from(*z), Value::from(*d)])
        .collect();
        Dataset::new(schema, rows).unwrap()
    }

    fn qis() -> Vec<String> {
        vec!["age".to_string(), "zip".to_string()]
    }

    #[test]
    fn test_prosecutor_metrics() {
        let report = assess(&dataset(), &RiskConfig::new(qis())).unwrap();
        assert_eq!(report.records_analyzed, 6);
        assert_eq!(report.class_count, 3);
        assert_eq!(report.min_class_size, 1);
        assert_eq!(report.violating_classes, 2);
        assert_eq!(report.records_at_risk, 3);
        assert_eq!(report.unique_records, 1);
        assert!((report.mean_risk - 0.5).abs() < 1e-12);
        assert_eq!(report.max_risk, 1.0);
        assert_eq!(report.prosecutor_risk, 1.0);
        assert!((report.marketer_risk - 0.5).abs() < 1e-12);
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert!((report.sample_uniqueness - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_population_uniqueness_estimate() {
        let small = assess(&dataset(), &RiskConfig::new(qis())).unwrap();
        assert_eq!(small.estimated_population_uniqueness, None);
        assert!(!small.metrics().contains_key("estimated_population_uniqueness"));

        // 200 records: 20 unique, 90 pairs
        let schema = vec![Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical)];
        let rows = (0..200)
            .map(|i| {
                let zip = if i < 20 { format!("u{}", i) } else { format!("p{}", i / 2) };
                vec![Value::from(zip)]
            })
            .collect();
        let large = Dataset::new(schema, rows).unwrap();
        let report = assess(&large, &RiskConfig::new(vec!["zip".to_string()])).unwrap();
        assert_eq!(report.unique_records, 20);
        assert!((report.sample_uniqueness - 0.1).abs() < 1e-12);
        assert!((report.estimated_population_uniqueness.unwrap() - 0.15).abs() < 1e-12);
        assert!((report.metrics()["estimated_population_uniqueness"] - 0.15).abs() < 1e-12);

        assert_eq!(estimate_population_uniqueness(0.9, 500), Some(1.0));
        assert_eq!(estimate_population_uniqueness(0.9, 100), None);
    }

    #[test]
    fn test_sensitive_lookalikes_count_as_distinct() {
        let schema = vec![
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("code", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = vec![
            vec![Value::from("02139"), Value::from(1)],
            vec![Value::from("02139"), Value::from("1")],
        ];
        let ds = Dataset::new(schema, rows).unwrap();
        let config = RiskConfig::new(vec!["zip".to_string()]).with_sensitive_attribute("code");
        let sensitive = assess(&ds, &config).unwrap().sensitive.unwrap();
        assert_eq!(sensitive.homogeneity_risk, 0.0);
        assert!((sensitive.disclosure_risk - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_classes_sorted_by_size() {
        let report = assess(&dataset(), &RiskConfig::new(qis())).unwrap();
        let sizes: Vec<usize> = report.classes.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
        assert_eq!(report.classes[0].values, vec!["30".to_string(), "02139".to_string()]);
    }

    #[test]
    fn test_journalist_scales_by_fraction() {
        let config = RiskConfig::new(qis())
            .with_attacker_model(AttackerModel::Journalist)
            .with_sampling_fraction(0.1);
        let report = assess(&dataset(), &config).unwrap();
        assert!((report.max_risk - 0.1).abs() < 1e-12);
        assert!((report.journalist_risk - 0.1).abs() < 1e-12);
        assert!((report.mean_risk - 0.05).abs() < 1e-12);
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_journalist_without_fraction_equals_prosecutor() {
        let prosecutor = assess(&dataset(), &RiskConfig::new(qis())).unwrap();
        let journalist = assess(
            &dataset(),
            &RiskConfig::new(qis()).with_attacker_model(AttackerModel::Journalist),
        )
        .unwrap();
        assert_eq!(prosecutor.mean_risk, journalist.mean_risk);
        assert_eq!(prosecutor.max_risk, journalist.max_risk);
    }

    #[test]
    fn test_empty_quasi_identifiers_rejected() {
        let err = assess(&dataset(), &RiskConfig::new(Vec::new())).unwrap_err();
        assert_eq!(err, AnonError::Config(ConfigError::EmptyQuasiIdentifiers));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let err = assess(&dataset(), &RiskConfig::new(vec!["height".to_string()])).unwrap_err();
        assert_eq!(err, AnonError::Config(ConfigError::UnknownAttribute("height".to_string())));
    }

    #[test]
    fn test_sample_size_is_clamped() {
        let config = RiskConfig::new(qis()).with_sample_size(1_000);
        let report = assess(&dataset(), &config).unwrap();
        assert_eq!(report.records_analyzed, 6);
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let config = RiskConfig::new(qis()).with_sample_size(4);
        let a = assess(&dataset(), &config).unwrap();
        let b = assess(&dataset(), &config).unwrap();
        assert_eq!(a.records_analyzed, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sensitive_risks() {
        let config = RiskConfig::new(qis()).with_sensitive_attribute("diagnosis");
        let report = assess(&dataset(), &config).unwrap();
        let sensitive = report.sensitive.as_ref().unwrap();
        // classes {30}: 1 value, {40}: 1 value, {50}: 3 values
        assert!((sensitive.disclosure_risk - (1.0 + 2.0 + 1.0) / 6.0).abs() < 1e-12);
        assert!((sensitive.homogeneity_risk - 0.5).abs() < 1e-12);
        assert!(report.metrics().contains_key("homogeneity_risk"));
    }

    #[test]
    fn test_recommendations() {
        let config = RiskConfig::new(qis()).with_sensitive_attribute("diagnosis");
        let report = assess(&dataset(), &config).unwrap();
        let hints = report.recommendations();
        assert!(hints[0].starts_with("Medium risk"));
        assert!(hints.iter().any(|h| h.contains("k >= 3")));
        assert!(hints.iter().any(|h| h.contains("1 unique records")));
    }

    #[test]
    fn test_for_dataset_uses_roles() {
        let config = RiskConfig::for_dataset(&dataset());
        assert_eq!(config.quasi_identifiers, qis());
        assert_eq!(config.sensitive_attribute.as_deref(), Some("diagnosis"));
    }

    #[test]
    fn test_attacker_model_from_str() {
        assert_eq!("Journalist".parse::<AttackerModel>().unwrap(), AttackerModel::Journalist);
        assert!(matches!(
            "insider".parse::<AttackerModel>(),
            Err(ConfigError::UnknownName { kind: "attacker model", .. })
        ));
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.33), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.9), RiskLevel::High);
    }
}
