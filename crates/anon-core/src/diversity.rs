//! l-Diversity and t-Closeness
//!
//! Both criteria strengthen k-anonymity with a condition on the sensitive
//! attribute inside each equivalence class:
//!
//! - **l-diversity**: at least `l` distinct sensitive values (`distinct`),
//!   Shannon entropy of at least `ln(l)` (`entropy`), or recursive
//!   (c, l)-diversity: with sensitive counts sorted `r1 ≥ r2 ≥ … ≥ rm`,
//!   `r1 < c · (rl + … + rm)` (`recursive`)
//! - **t-closeness**: the class distribution is within distance `t` of the
//!   distribution over all retained records
//!
//! Enforcement continues the k-anonymity search from the levels recorded in
//! its [`GeneralizationReport`], with the stronger criterion, and then
//! suppresses within the same suppression limit. A clustering (microaggregation)
//! report has no levels to resume from; the search then starts from the raw
//! values with global recoding.

use crate::cancel::{CancellationToken, Outcome};
use crate::dataset::{Dataset, Value, ValueKey};
use crate::equivalence::ClassVerdict;
use crate::error::{AnonError, ConfigError, PrivacyCriterion, Result};
use crate::generalize::{
    anonymize, suppression_allowance, validate_suppression_limit, Anonymization, ClassCriterion,
    GeneralizationReport, Lattice, Recoding, SearchOptions,
};
use crate::hierarchy::HierarchySet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use tracing::info;

/// How l-diversity is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityMethod {
    #[default]
    Distinct,
    Entropy,
    /// Recursive (c, l)-diversity; `c` comes from [`LDiversityConfig::c`]
    Recursive,
}

impl FromStr for DiversityMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distinct" => Ok(DiversityMethod::Distinct),
            "entropy" => Ok(DiversityMethod::Entropy),
            "recursive" => Ok(DiversityMethod::Recursive),
            _ => Err(ConfigError::UnknownName {
                kind: "diversity method",
                value: s.to_string(),
            }),
        }
    }
}

/// Distance between a class distribution and the global one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMeasure {
    /// Half the L1 distance
    #[default]
    Variational,
    /// Kullback-Leibler divergence of the class from the global distribution
    KullbackLeibler,
    /// Earth-mover distance; ordered for numeric and date attributes
    EarthMover,
}

impl FromStr for DistanceMeasure {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "variational" | "tvd" => Ok(DistanceMeasure::Variational),
            "kl" | "kullback_leibler" => Ok(DistanceMeasure::KullbackLeibler),
            "emd" | "earth_mover" => Ok(DistanceMeasure::EarthMover),
            _ => Err(ConfigError::UnknownName {
                kind: "distance measure",
                value: s.to_string(),
            }),
        }
    }
}

/// Default `c` of recursive (c, l)-diversity
pub const DEFAULT_RECURSIVE_C: f64 = 2.0;

fn default_c() -> f64 {
    DEFAULT_RECURSIVE_C
}

/// Parameters of l-diversity enforcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LDiversityConfig {
    pub sensitive_attribute: String,
    pub l: usize,
    #[serde(default)]
    pub method: DiversityMethod,
    /// Bound of recursive (c, l)-diversity; ignored by the other methods
    #[serde(default = "default_c")]
    pub c: f64,
}

impl LDiversityConfig {
    pub fn new(sensitive_attribute: impl Into<String>, l: usize) -> Self {
        Self {
            sensitive_attribute: sensitive_attribute.into(),
            l,
            method: DiversityMethod::default(),
            c: DEFAULT_RECURSIVE_C,
        }
    }

    pub fn with_method(mut self, method: DiversityMethod) -> Self {
        self.method = method;
        self
    }

    /// Recursive (c, l)-diversity with the given `c`
    pub fn with_recursive(mut self, c: f64) -> Self {
        self.method = DiversityMethod::Recursive;
        self.c = c;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.l == 0 {
            return Err(AnonError::invalid("l", 0, "must be at least 1"));
        }
        if self.method == DiversityMethod::Recursive && (!self.c.is_finite() || self.c <= 0.0) {
            return Err(AnonError::invalid("c", self.c, "must be positive and finite"));
        }
        Ok(())
    }
}

/// Parameters of t-closeness enforcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TClosenessConfig {
    pub sensitive_attribute: String,
    pub t: f64,
    #[serde(default)]
    pub distance: DistanceMeasure,
}

impl TClosenessConfig {
    pub fn new(sensitive_attribute: impl Into<String>, t: f64) -> Self {
        Self {
            sensitive_attribute: sensitive_attribute.into(),
            t,
            distance: DistanceMeasure::default(),
        }
    }

    pub fn with_distance(mut self, distance: DistanceMeasure) -> Self {
        self.distance = distance;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.t.is_finite() || self.t <= 0.0 || self.t > 2.0 {
            return Err(AnonError::invalid("t", self.t, "must be in (0, 2]"));
        }
        Ok(())
    }
}

/// Outcome of l-diversity enforcement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiversityReport {
    pub sensitive_attribute: String,
    pub l: usize,
    pub method: DiversityMethod,
    /// `c` of recursive (c, l)-diversity
    pub c: Option<f64>,
    pub levels: BTreeMap<String, usize>,
    pub suppressed_records: usize,
    /// Steps taken beyond the k-anonymity levels
    pub steps: usize,
    /// Per class: distinct count, entropy or `r1 / (rl + … + rm)`, and pass/fail
    pub classes: Vec<ClassVerdict>,
    pub information_loss: f64,
}

/// Outcome of t-closeness enforcement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosenessReport {
    pub sensitive_attribute: String,
    pub t: f64,
    pub distance: DistanceMeasure,
    /// Sensitive value → share among the records the search started from
    pub global_distribution: BTreeMap<String, f64>,
    pub levels: BTreeMap<String, usize>,
    pub suppressed_records: usize,
    pub steps: usize,
    /// Per class: distance to the global distribution, and pass/fail
    pub classes: Vec<ClassVerdict>,
    /// Largest distance among retained classes
    pub max_distance: f64,
    pub information_loss: f64,
}

/// Sensitive values of every row as category codes
struct SensitiveCodes {
    /// codes[row]
    codes: Vec<usize>,
    /// category labels, in natural order when the attribute is ordered
    labels: Vec<String>,
}

impl SensitiveCodes {
    fn new(dataset: &Dataset, column: usize) -> Self {
        let ordered = dataset.attribute(column).kind.is_ordered();
        let mut distinct: Vec<&Value> = Vec::new();
        let mut seen = HashSet::new();
        for value in dataset.column(column) {
            if seen.insert(value.key()) {
                distinct.push(value);
            }
        }
        if ordered {
            distinct.sort_by(|a, b| natural_order(a, b));
        }

        let index: HashMap<ValueKey, usize> = distinct.iter().enumerate().map(|(i, v)| (v.key(), i)).collect();
        let codes = dataset
            .column(column)
            .map(|v| index.get(&v.key()).copied().unwrap_or(0))
            .collect();
        let labels = distinct.iter().map(|v| v.label()).collect();
        SensitiveCodes { codes, labels }
    }

    fn counts(&self, rows: &[usize]) -> HashMap<usize, usize> {
        let mut counts = HashMap::new();
        for &r in rows {
            *counts.entry(self.codes[r]).or_insert(0) += 1;
        }
        counts
    }

    fn distribution(&self, rows: &[usize]) -> Vec<f64> {
        let mut dist = vec![0.0; self.labels.len()];
        for &r in rows {
            dist[self.codes[r]] += 1.0;
        }
        let n = rows.len().max(1) as f64;
        dist.iter_mut().for_each(|p| *p /= n);
        dist
    }
}

/// Nulls first, then numbers, dates and text in their natural order
fn natural_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Date(_) => 2,
            Value::Text(_) => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Shannon entropy (natural log) of a frequency table
pub(crate) fn entropy(counts: impl Iterator<Item = usize>) -> f64 {
    let counts: Vec<usize> = counts.collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// Half the L1 distance between two distributions
pub(crate) fn variational_distance(p: &[f64], q: &[f64]) -> f64 {
    0.5 * p.iter().zip(q).map(|(a, b)| (a - b).abs()).sum::<f64>()
}

/// KL divergence of `p` from `q`
///
/// Terms with `p = 0` contribute nothing; `q = 0` where `p > 0` is infinite.
pub(crate) fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .filter(|(a, _)| **a > 0.0)
        .map(|(a, b)| if *b > 0.0 { a * (a / b).ln() } else { f64::INFINITY })
        .sum()
}

/// Earth-mover distance over ordered categories, normalized by `m - 1`
pub(crate) fn ordered_emd(p: &[f64], q: &[f64]) -> f64 {
    let m = p.len();
    if m < 2 {
        return 0.0;
    }
    let mut cumulative = 0.0;
    let mut total = 0.0;
    for (a, b) in p.iter().zip(q) {
        cumulative += a - b;
        total += f64::abs(cumulative);
    }
    total / (m - 1) as f64
}

/// Recursive (c, l)-diversity of one class's sensitive counts
///
/// Returns `r1 / (rl + … + rm)` (infinite when fewer than `l` values) and
/// whether `r1 < c · (rl + … + rm)`.
pub(crate) fn recursive_diversity(counts: impl Iterator<Item = usize>, l: usize, c: f64) -> (f64, bool) {
    let mut counts: Vec<usize> = counts.filter(|&n| n > 0).collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));
    let Some(&most) = counts.first() else {
        return (f64::INFINITY, false);
    };
    let tail: usize = counts.iter().skip(l.saturating_sub(1)).sum();
    if counts.len() < l || tail == 0 {
        return (f64::INFINITY, false);
    }
    (most as f64 / tail as f64, (most as f64) < c * tail as f64)
}

/// k-anonymity plus l-diversity per class
struct DiversityCriterion {
    k: usize,
    l: usize,
    c: f64,
    method: DiversityMethod,
    sensitive: SensitiveCodes,
}

impl ClassCriterion for DiversityCriterion {
    fn criterion(&self) -> PrivacyCriterion {
        PrivacyCriterion::LDiversity { l: self.l }
    }

    fn evaluate(&self, rows: &[usize]) -> (f64, bool) {
        let counts = self.sensitive.counts(rows);
        let (measure, diverse) = match self.method {
            DiversityMethod::Distinct => {
                let distinct = counts.len();
                (distinct as f64, distinct >= self.l)
            }
            DiversityMethod::Entropy => {
                let h = entropy(counts.into_values());
                (h, h + 1e-12 >= (self.l as f64).ln())
            }
            DiversityMethod::Recursive => recursive_diversity(counts.into_values(), self.l, self.c),
        };
        (measure, diverse && rows.len() >= self.k)
    }
}

/// k-anonymity plus t-closeness per class
struct ClosenessCriterion {
    k: usize,
    t: f64,
    distance: DistanceMeasure,
    ordered: bool,
    sensitive: SensitiveCodes,
    global: Vec<f64>,
}

impl ClosenessCriterion {
    fn distance(&self, rows: &[usize]) -> f64 {
        let p = self.sensitive.distribution(rows);
        match self.distance {
            DistanceMeasure::Variational => variational_distance(&p, &self.global),
            DistanceMeasure::KullbackLeibler => kl_divergence(&p, &self.global),
            DistanceMeasure::EarthMover if self.ordered => ordered_emd(&p, &self.global),
            DistanceMeasure::EarthMover => variational_distance(&p, &self.global),
        }
    }
}

impl ClassCriterion for ClosenessCriterion {
    fn criterion(&self) -> PrivacyCriterion {
        PrivacyCriterion::TCloseness { t: self.t }
    }

    fn evaluate(&self, rows: &[usize]) -> (f64, bool) {
        let d = self.distance(rows);
        (d, d <= self.t + 1e-12 && rows.len() >= self.k)
    }
}

/// Lattice, sensitive column, starting levels and search options rebuilt
/// from a k-anonymity report
fn resume<'a>(
    dataset: &'a Dataset,
    hierarchies: &'a HierarchySet,
    prior: &GeneralizationReport,
    sensitive_attribute: &str,
) -> Result<(Lattice<'a>, usize, Vec<usize>, SearchOptions)> {
    if prior.k == 0 {
        return Err(AnonError::invalid("k", 0, "must be at least 1"));
    }
    validate_suppression_limit(prior.suppression_limit)?;
    if prior.quasi_identifiers.iter().any(|q| q == sensitive_attribute) {
        return Err(AnonError::invalid(
            "sensitive_attribute",
            sensitive_attribute,
            "must not be a quasi-identifier",
        ));
    }
    let sensitive = dataset.require(sensitive_attribute)?;
    let lattice = Lattice::new(dataset, &prior.quasi_identifiers, hierarchies, &prior.max_levels)?;
    let start = prior
        .quasi_identifiers
        .iter()
        .map(|q| prior.levels.get(q).copied().unwrap_or(0))
        .collect();
    let options = SearchOptions {
        allowance: suppression_allowance(prior.suppression_limit, lattice.record_count()),
        early_suppression: prior.early_suppression,
        recoding: match prior.recoding {
            Recoding::Clustering => Recoding::Global,
            other => other,
        },
        suppression: prior.suppression,
    };
    Ok((lattice, sensitive, start, options))
}

/// Enforce l-diversity on top of a k-anonymity result
///
/// `dataset` is the source dataset the k-anonymity stage ran on and `prior`
/// its report; the search resumes from the levels it reached.
pub fn enforce_l_diversity(
    dataset: &Dataset,
    hierarchies: &HierarchySet,
    prior: &GeneralizationReport,
    config: &LDiversityConfig,
    cancel: &CancellationToken,
) -> Result<Outcome<(Dataset, DiversityReport)>> {
    config.validate()?;
    let (mut lattice, sensitive, start, options) =
        resume(dataset, hierarchies, prior, &config.sensitive_attribute)?;
    let criterion = DiversityCriterion {
        k: prior.k,
        l: config.l,
        c: config.c,
        method: config.method,
        sensitive: SensitiveCodes::new(dataset, sensitive),
    };

    let result = match anonymize(&mut lattice, start, &criterion, &options, cancel)? {
        Outcome::Completed(result) => result,
        Outcome::Cancelled => return Ok(Outcome::Cancelled),
    };
    let Anonymization {
        dataset: anonymized,
        levels,
        suppressed,
        steps,
        classes,
        information_loss,
    } = result;

    info!(
        l = config.l,
        method = ?config.method,
        levels = ?levels,
        suppressed,
        "l-diversity satisfied"
    );
    let report = DiversityReport {
        sensitive_attribute: config.sensitive_attribute.clone(),
        l: config.l,
        method: config.method,
        c: (config.method == DiversityMethod::Recursive).then_some(config.c),
        levels,
        suppressed_records: suppressed,
        steps,
        classes,
        information_loss,
    };
    Ok(Outcome::Completed((anonymized, report)))
}

/// Enforce t-closeness on top of a k-anonymity result
///
/// The global distribution is taken over the records the search starts from
/// (every record not already suppressed).
pub fn enforce_t_closeness(
    dataset: &Dataset,
    hierarchies: &HierarchySet,
    prior: &GeneralizationReport,
    config: &TClosenessConfig,
    cancel: &CancellationToken,
) -> Result<Outcome<(Dataset, ClosenessReport)>> {
    config.validate()?;
    let (mut lattice, sensitive, start, options) =
        resume(dataset, hierarchies, prior, &config.sensitive_attribute)?;
    let codes = SensitiveCodes::new(dataset, sensitive);
    let global = codes.distribution(lattice.rows());
    let global_distribution = codes
        .labels
        .iter()
        .cloned()
        .zip(global.iter().copied())
        .filter(|(_, p)| *p > 0.0)
        .collect();
    let criterion = ClosenessCriterion {
        k: prior.k,
        t: config.t,
        distance: config.distance,
        ordered: dataset.attribute(sensitive).kind.is_ordered(),
        sensitive: codes,
        global,
    };

    let result = match anonymize(&mut lattice, start, &criterion, &options, cancel)? {
        Outcome::Completed(result) => result,
        Outcome::Cancelled => return Ok(Outcome::Cancelled),
    };

    let max_distance = result
        .classes
        .iter()
        .filter(|c| c.satisfied)
        .map(|c| c.measure)
        .fold(0.0, f64::max);
    info!(
        t = config.t,
        distance = ?config.distance,
        max_distance,
        suppressed = result.suppressed,
        "t-closeness satisfied"
    );
    let report = ClosenessReport {
        sensitive_attribute: config.sensitive_attribute.clone(),
        t: config.t,
        distance: config.distance,
        global_distribution,
        levels: result.levels,
        suppressed_records: result.suppressed,
        steps: result.steps,
        classes: result.classes,
        max_distance,
        information_loss: result.information_loss,
    };
    Ok(Outcome::Completed((result.dataset, report)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attribute, AttributeRole, AttributeType};
    use crate::equivalence::partition;
    use crate::generalize::{generalize, KAnonymityConfig};
    use crate::hierarchy::Hierarchy;

    fn dataset(rows: &[(i64, &str, &str)]) -> Dataset {
        let schema = vec![
            Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = rows
            .iter()
            .map(|(a, z, d)| vec![Value::from(*a), Value::from(*z), Value::from(*d)])
            .collect();
        Dataset::new(schema, rows).unwrap()
    }

    fn hierarchies() -> HierarchySet {
        HierarchySet::new()
            .with(Hierarchy::numeric_bands("age", vec![10.0, 20.0]).unwrap())
            .with(Hierarchy::prefix_mask("zip", 5))
    }

    fn k_anonymize(ds: &Dataset, k: usize) -> GeneralizationReport {
        let config = KAnonymityConfig::new(vec!["age".into(), "zip".into()], k);
        generalize(ds, &config, &hierarchies(), &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap()
            .1
    }

    fn clinic() -> Dataset {
        dataset(&[
            (31, "02139", "flu"),
            (33, "02139", "flu"),
            (35, "02138", "asthma"),
            (37, "02138", "asthma"),
            (42, "02141", "flu"),
            (44, "02141", "cancer"),
            (46, "02142", "asthma"),
            (48, "02142", "cancer"),
        ])
    }

    #[test]
    fn test_entropy_and_distances() {
        assert!((entropy([1, 1].into_iter()) - 2f64.ln()).abs() < 1e-12);
        assert_eq!(entropy([4].into_iter()), 0.0);
        let p = [0.5, 0.5, 0.0];
        let q = [0.25, 0.25, 0.5];
        assert!((variational_distance(&p, &q) - 0.5).abs() < 1e-12);
        assert!((kl_divergence(&p, &q) - 2f64.ln()).abs() < 1e-12);
        // cumulative differences 0.25, 0.5, 0 over m - 1 = 2
        assert!((ordered_emd(&p, &q) - 0.375).abs() < 1e-12);
        assert_eq!(ordered_emd(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_l_diversity_merges_classes() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let config = LDiversityConfig::new("diagnosis", 2);
        let (out, report) = enforce_l_diversity(&ds, &hierarchies(), &prior, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert!(report.classes.iter().filter(|c| c.satisfied).all(|c| c.measure >= 2.0));
        for class in partition(&out, &[0, 1]) {
            let distinct: HashSet<String> = class.rows.iter().map(|&r| out.value(r, 2).label()).collect();
            assert!(distinct.len() >= 2);
            assert!(class.size() >= 2);
        }
        assert!(report.steps >= 1);
    }

    #[test]
    fn test_clustering_prior_resumes_from_raw_levels() {
        let ds = clinic();
        let config = KAnonymityConfig::new(vec!["age".into(), "zip".into()], 2).with_recoding(Recoding::Clustering);
        let (_, prior) = generalize(&ds, &config, &HierarchySet::new(), &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(prior.clusters, Some(4));

        let diversity = LDiversityConfig::new("diagnosis", 2);
        let (out, report) = enforce_l_diversity(&ds, &hierarchies(), &prior, &diversity, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        for class in partition(&out, &[0, 1]) {
            let distinct: HashSet<String> = class.rows.iter().map(|&r| out.value(r, 2).label()).collect();
            assert!(distinct.len() >= 2);
        }
        assert!(report.steps >= 1);
    }

    #[test]
    fn test_entropy_l_diversity() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let config = LDiversityConfig::new("diagnosis", 2).with_method(DiversityMethod::Entropy);
        let (out, report) = enforce_l_diversity(&ds, &hierarchies(), &prior, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert!(report
            .classes
            .iter()
            .filter(|c| c.satisfied)
            .all(|c| c.measure + 1e-12 >= 2f64.ln()));
        assert_eq!(out.len() + report.suppressed_records, ds.len());
    }

    #[test]
    fn test_l_diversity_unattainable() {
        let ds = dataset(&[
            (31, "02139", "flu"),
            (33, "02139", "flu"),
            (42, "02141", "cold"),
            (44, "02141", "cold"),
        ]);
        let prior = k_anonymize(&ds, 2);
        let config = LDiversityConfig::new("diagnosis", 3);
        let err = enforce_l_diversity(&ds, &hierarchies(), &prior, &config, &CancellationToken::new()).unwrap_err();
        let best = err.best_effort().unwrap();
        assert_eq!(best.criterion, PrivacyCriterion::LDiversity { l: 3 });
        assert_eq!(best.violating_records, 4);
    }

    #[test]
    fn test_l_one_is_k_anonymity() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let (_, report) = enforce_l_diversity(
            &ds,
            &hierarchies(),
            &prior,
            &LDiversityConfig::new("diagnosis", 1),
            &CancellationToken::new(),
        )
        .unwrap()
        .completed()
        .unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.levels, prior.levels);
    }

    #[test]
    fn test_t_closeness_bounds_every_class() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let config = TClosenessConfig::new("diagnosis", 0.2);
        let (_, report) = enforce_t_closeness(&ds, &hierarchies(), &prior, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert!(report.max_distance <= 0.2 + 1e-12);
        assert!(report.classes.iter().filter(|c| c.satisfied).all(|c| c.measure <= 0.2 + 1e-12));
        let total: f64 = report.global_distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_t_closeness_ordered_emd_on_numeric() {
        let schema = vec![
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("salary", AttributeRole::Sensitive, AttributeType::Numeric),
        ];
        let rows = [("02139", 30), ("02139", 40), ("02141", 50), ("02141", 60)]
            .iter()
            .map(|(z, s)| vec![Value::from(*z), Value::from(*s)])
            .collect();
        let ds = Dataset::new(schema, rows).unwrap();
        let hierarchies = HierarchySet::new().with(Hierarchy::prefix_mask("zip", 5));
        let prior = generalize(
            &ds,
            &KAnonymityConfig::new(vec!["zip".into()], 2),
            &hierarchies,
            &CancellationToken::new(),
        )
        .unwrap()
        .completed()
        .unwrap()
        .1;
        assert_eq!(prior.levels["zip"], 0);

        // class {30, 40} vs global uniform over 4 ordered values: (0.25 + 0.5 + 0.25) / 3
        let config = TClosenessConfig::new("salary", 0.3).with_distance(DistanceMeasure::EarthMover);
        let (_, report) = enforce_t_closeness(&ds, &hierarchies, &prior, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(report.levels["zip"], 2);
        assert!(report.max_distance < 1e-12);

        let loose = TClosenessConfig::new("salary", 0.5).with_distance(DistanceMeasure::EarthMover);
        let (_, report) = enforce_t_closeness(&ds, &hierarchies, &prior, &loose, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(report.levels["zip"], 0);
        assert!((report.max_distance - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_t_rejected() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let token = CancellationToken::new();
        for t in [0.0, -1.0, 2.5, f64::NAN] {
            let config = TClosenessConfig::new("diagnosis", t);
            assert!(enforce_t_closeness(&ds, &hierarchies(), &prior, &config, &token)
                .unwrap_err()
                .is_config());
        }
    }

    #[test]
    fn test_sensitive_quasi_identifier_rejected() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        let err = enforce_l_diversity(
            &ds,
            &hierarchies(),
            &prior,
            &LDiversityConfig::new("zip", 2),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_recursive_diversity_counts() {
        // sorted 5, 3, 2: with l = 2 the tail is 3 + 2
        let (measure, pass) = recursive_diversity([3, 5, 2].into_iter(), 2, 2.0);
        assert!((measure - 1.0).abs() < 1e-12);
        assert!(pass);
        assert!(!recursive_diversity([3, 5, 2].into_iter(), 2, 1.0).1);
        // l = 3 leaves a tail of 2: 5 < 2c needs c > 2.5
        assert!(!recursive_diversity([3, 5, 2].into_iter(), 3, 2.5).1);
        assert!(recursive_diversity([3, 5, 2].into_iter(), 3, 3.0).1);
        // fewer than l values never passes
        assert_eq!(recursive_diversity([4, 4].into_iter(), 3, 10.0), (f64::INFINITY, false));
        assert!(!recursive_diversity(std::iter::empty(), 1, 2.0).1);
    }

    #[test]
    fn test_recursive_l_diversity_enforced() {
        let ds = dataset(&[
            (31, "02139", "flu"),
            (33, "02139", "flu"),
            (35, "02139", "flu"),
            (37, "02139", "asthma"),
            (42, "02141", "flu"),
            (44, "02141", "cancer"),
            (46, "02141", "asthma"),
            (48, "02141", "cold"),
        ]);
        let prior = k_anonymize(&ds, 2);
        let config = LDiversityConfig::new("diagnosis", 2).with_recursive(2.0);
        let (out, report) = enforce_l_diversity(&ds, &hierarchies(), &prior, &config, &CancellationToken::new())
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(report.method, DiversityMethod::Recursive);
        assert_eq!(report.c, Some(2.0));
        for class in partition(&out, &[0, 1]) {
            let counts = SensitiveCodes::new(&out, 2).counts(&class.rows);
            assert!(recursive_diversity(counts.into_values(), 2, 2.0).1);
        }
        assert_eq!(out.len() + report.suppressed_records, ds.len());
    }

    #[test]
    fn test_recursive_c_validated() {
        let ds = clinic();
        let prior = k_anonymize(&ds, 2);
        for c in [0.0, -1.0, f64::INFINITY] {
            let config = LDiversityConfig::new("diagnosis", 2).with_recursive(c);
            assert!(enforce_l_diversity(&ds, &hierarchies(), &prior, &config, &CancellationToken::new())
                .unwrap_err()
                .is_config());
        }
        // c is only checked for the recursive method
        let mut distinct = LDiversityConfig::new("diagnosis", 2);
        distinct.c = -1.0;
        assert!(distinct.validate().is_ok());
    }

    #[test]
    fn test_null_and_null_text_are_separate_categories() {
        let schema = vec![
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = vec![
            vec![Value::from("02139"), Value::Null],
            vec![Value::from("02139"), Value::from("NULL")],
            vec![Value::from("02139"), Value::from("NULL")],
        ];
        let ds = Dataset::new(schema, rows).unwrap();
        let codes = SensitiveCodes::new(&ds, 1);
        assert_eq!(codes.counts(&[0, 1, 2]).len(), 2);
        assert_eq!(codes.labels.len(), 2);
    }

    #[test]
    fn test_null_counts_as_category() {
        let schema = vec![
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        ];
        let rows = vec![
            vec![Value::from("02139"), Value::from("flu")],
            vec![Value::from("02139"), Value::Null],
        ];
        let ds = Dataset::new(schema, rows).unwrap();
        let codes = SensitiveCodes::new(&ds, 1);
        assert_eq!(codes.counts(&[0, 1]).len(), 2);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("EMD".parse::<DistanceMeasure>().unwrap(), DistanceMeasure::EarthMover);
        assert_eq!("kullback-leibler".parse::<DistanceMeasure>().unwrap(), DistanceMeasure::KullbackLeibler);
        assert_eq!("entropy".parse::<DiversityMethod>().unwrap(), DiversityMethod::Entropy);
        assert_eq!("Recursive".parse::<DiversityMethod>().unwrap(), DiversityMethod::Recursive);
        assert!("hamming".parse::<DistanceMeasure>().is_err());
    }
}
