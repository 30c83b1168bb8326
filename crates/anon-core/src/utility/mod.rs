//! Utility Evaluation
//!
//! Compares a transformed dataset with its original and scores how much
//! analytical value survived. Every score lies in [0, 1] with 1.0 meaning
//! perfect preservation:
//!
//! | Metric | Numeric attributes | Categorical / date attributes |
//! |--------|--------------------|-------------------------------|
//! | statistical similarity | mean and variance relative difference | 1 − variational distance |
//! | correlation preservation | Pearson matrix | Cramér's V matrix |
//! | distribution similarity | 1 − KS, 1 − Wasserstein / range | 1 − variational distance |
//! | information preservation | binned entropy ratio | entropy ratio |
//! | query accuracy | count, sum and mean preservation | count preservation |
//! | classification utility | Naive Bayes accuracy ratio for a target attribute | |
//!
//! Generalized `[lo, hi)` labels are read as their midpoints and `*` as
//! missing. Identifier attributes are never compared.
//!
//! # Row alignment
//!
//! When the transformed dataset carries lineage, each of its rows is matched
//! to the original row with the same source record, so any earlier stage of
//! a pipeline can serve as the original. Without lineage, datasets with equal
//! row counts are paired row by row. Dropped records leave the comparison on
//! both sides, and so do redacted (suppressed) records.

mod classifier;
mod stats;

use crate::dataset::{AttributeRole, AttributeType, Dataset, Value};
use crate::diversity::entropy;
use crate::error::{AnonError, ConfigError, Result};
use classifier::{holdout_accuracy, SPLIT_SEED};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Bins used to discretize numeric classifier features
const FEATURE_BINS: usize = 10;

/// Upper bound on bins when measuring numeric entropy
const ENTROPY_BINS: usize = 20;

/// Fewest aligned rows for a classification comparison
const MIN_CLASSIFICATION_ROWS: usize = 10;

/// A utility metric to compute
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityMetric {
    Statistical,
    Correlation,
    Distribution,
    /// Naive Bayes accuracy for predicting `target`
    Classification { target: String },
    InformationLoss,
    QueryAccuracy,
}

impl UtilityMetric {
    /// Every metric that needs no extra parameters
    pub fn standard() -> Vec<UtilityMetric> {
        vec![
            UtilityMetric::Statistical,
            UtilityMetric::Correlation,
            UtilityMetric::Distribution,
            UtilityMetric::InformationLoss,
            UtilityMetric::QueryAccuracy,
        ]
    }

    /// Key of the metric's score in [`UtilityReport::scores`]
    pub fn name(&self) -> &'static str {
        match self {
            UtilityMetric::Statistical => "statistical_similarity",
            UtilityMetric::Correlation => "correlation_preservation",
            UtilityMetric::Distribution => "distribution_similarity",
            UtilityMetric::Classification { .. } => "classification_utility",
            UtilityMetric::InformationLoss => "information_preservation",
            UtilityMetric::QueryAccuracy => "query_accuracy",
        }
    }
}

impl fmt::Display for UtilityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UtilityMetric::Classification { target } => write!(f, "classification:{}", target),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for UtilityMetric {
    type Err = ConfigError;

    /// Accepts short or full metric names; classification is `classification:<target>`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(target) = s.strip_prefix("classification:") {
            if target.is_empty() {
                return Err(ConfigError::UnknownName {
                    kind: "utility metric",
                    value: s.to_string(),
                });
            }
            return Ok(UtilityMetric::Classification {
                target: target.to_string(),
            });
        }
        match s.to_ascii_lowercase().as_str() {
            "statistical" | "statistical_similarity" => Ok(UtilityMetric::Statistical),
            "correlation" | "correlation_preservation" => Ok(UtilityMetric::Correlation),
            "distribution" | "distribution_similarity" => Ok(UtilityMetric::Distribution),
            "information" | "information_loss" | "information_preservation" => Ok(UtilityMetric::InformationLoss),
            "query" | "query_accuracy" => Ok(UtilityMetric::QueryAccuracy),
            _ => Err(ConfigError::UnknownName {
                kind: "utility metric",
                value: s.to_string(),
            }),
        }
    }
}

/// Coarse classification of an overall utility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtilityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl UtilityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            UtilityLevel::Excellent
        } else if score >= 0.7 {
            UtilityLevel::Good
        } else if score >= 0.5 {
            UtilityLevel::Fair
        } else if score >= 0.3 {
            UtilityLevel::Poor
        } else {
            UtilityLevel::VeryPoor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub target: String,
    pub original_accuracy: f64,
    pub transformed_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilityReport {
    pub original_records: usize,
    pub transformed_records: usize,
    /// Row pairs the comparison ran over
    pub aligned_records: usize,
    /// Metric name → score in [0, 1]
    pub scores: BTreeMap<String, f64>,
    /// Metric name → attribute (or `a~b` pair) → score
    pub breakdowns: BTreeMap<String, BTreeMap<String, f64>>,
    pub classification: Option<ClassificationSummary>,
    /// Mean of the computed metric scores
    pub overall_utility: f64,
    pub utility_level: UtilityLevel,
    /// Metrics that could not be computed, and why
    pub notes: Vec<String>,
}

impl UtilityReport {
    pub fn score(&self, metric: &UtilityMetric) -> Option<f64> {
        self.scores.get(metric.name()).copied()
    }

    pub fn recommendations(&self) -> Vec<String> {
        let mut hints = Vec::new();
        match self.utility_level {
            UtilityLevel::VeryPoor => hints.push("Utility is very poor: consider less aggressive privacy parameters".to_string()),
            UtilityLevel::Poor => hints.push("Utility is poor: review privacy parameters".to_string()),
            UtilityLevel::Fair => hints.push("Utility is fair: monitor the privacy/utility trade-off".to_string()),
            UtilityLevel::Good | UtilityLevel::Excellent => {}
        }
        let below = |metric: UtilityMetric, threshold: f64| self.score(&metric).is_some_and(|s| s < threshold);
        if below(UtilityMetric::Statistical, 0.5) {
            hints.push("Statistical properties are poorly preserved: lower generalization levels".to_string());
        }
        if below(UtilityMetric::Correlation, 0.5) {
            hints.push("Correlations are poorly preserved: generalize fewer attributes together".to_string());
        }
        if below(UtilityMetric::InformationLoss, 0.5) {
            hints.push("High information loss: reduce suppression or hierarchy depth".to_string());
        }
        if self.scores.get("classification_utility").is_some_and(|s| *s < 0.7) {
            hints.push("Classification accuracy dropped: review generalization of predictive attributes".to_string());
        }
        hints
    }
}

/// Original/transformed row pairs over the comparable columns
struct Alignment<'a> {
    original: &'a Dataset,
    transformed: &'a Dataset,
    pairs: Vec<(usize, usize)>,
    columns: Vec<usize>,
}

impl<'a> Alignment<'a> {
    fn new(original: &'a Dataset, transformed: &'a Dataset) -> Result<Self> {
        let mismatch = |reason: String| AnonError::ShapeMismatch {
            original_rows: original.len(),
            transformed_rows: transformed.len(),
            reason,
        };

        let same_schema = original.schema().len() == transformed.schema().len()
            && original
                .schema()
                .iter()
                .zip(transformed.schema())
                .all(|(a, b)| a.name == b.name);
        if !same_schema {
            return Err(mismatch("datasets do not share a schema".to_string()));
        }

        let pairs: Vec<(usize, usize)> = if transformed.lineage().is_some() {
            // lineage indexes the root dataset; the original may itself be derived
            let by_source: HashMap<usize, usize> =
                (0..original.len()).map(|row| (original.source_row(row), row)).collect();
            let mut pairs = Vec::with_capacity(transformed.len());
            for row in 0..transformed.len() {
                let source = transformed.source_row(row);
                let matched = by_source.get(&source).ok_or_else(|| {
                    mismatch(format!(
                        "transformed row {} comes from source record {}, which the original does not hold",
                        row, source
                    ))
                })?;
                pairs.push((*matched, row));
            }
            pairs
        } else if original.len() == transformed.len() {
            (0..original.len()).map(|i| (i, i)).collect()
        } else {
            return Err(mismatch("row counts differ and the transformed dataset has no lineage".to_string()));
        };
        let pairs = pairs
            .into_iter()
            .filter(|&(o, t)| !original.is_suppressed(o) && !transformed.is_suppressed(t))
            .collect();

        let columns = (0..original.schema().len())
            .filter(|&c| original.attribute(c).role != AttributeRole::Identifier)
            .collect();

        Ok(Alignment {
            original,
            transformed,
            pairs,
            columns,
        })
    }

    fn is_numeric(&self, col: usize) -> bool {
        self.original.attribute(col).kind == AttributeType::Numeric
    }

    fn name(&self, col: usize) -> &str {
        &self.original.attribute(col).name
    }

    fn original_cells(&self, col: usize) -> impl Iterator<Item = &'a Value> + '_ {
        let data = self.original;
        self.pairs.iter().map(move |&(o, _)| data.value(o, col))
    }

    fn transformed_cells(&self, col: usize) -> impl Iterator<Item = &'a Value> + '_ {
        let data = self.transformed;
        self.pairs.iter().map(move |&(_, t)| data.value(t, col))
    }

    fn numeric_columns(&self) -> Vec<usize> {
        self.columns.iter().copied().filter(|&c| self.is_numeric(c)).collect()
    }

    fn categorical_columns(&self) -> Vec<usize> {
        self.columns.iter().copied().filter(|&c| !self.is_numeric(c)).collect()
    }
}

fn numbers<'v>(cells: impl Iterator<Item = &'v Value>) -> Vec<f64> {
    cells.filter_map(Value::numeric_estimate).collect()
}

fn labels<'v>(cells: impl Iterator<Item = &'v Value>) -> Vec<String> {
    cells.filter(|v| !v.is_null()).map(Value::label).collect()
}

fn mean_of(scores: &BTreeMap<String, f64>) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.values().sum::<f64>() / scores.len() as f64)
    }
}

/// Per-metric result: overall score (if computable) and breakdown
struct MetricResult {
    score: Option<f64>,
    breakdown: BTreeMap<String, f64>,
    note: Option<String>,
}

impl MetricResult {
    fn from_breakdown(breakdown: BTreeMap<String, f64>, empty_note: &str) -> Self {
        let score = mean_of(&breakdown);
        MetricResult {
            note: score.is_none().then(|| empty_note.to_string()),
            score,
            breakdown,
        }
    }
}

fn categorical_similarity(original: Vec<String>, transformed: Vec<String>) -> f64 {
    1.0 - stats::frequency_distance(&stats::frequencies(original), &stats::frequencies(transformed))
}

fn statistical(al: &Alignment<'_>) -> MetricResult {
    let mut breakdown = BTreeMap::new();
    for &col in &al.columns {
        let score = if al.is_numeric(col) {
            let o = numbers(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            let t = numbers(al.transformed_cells(col));
            match (stats::mean(&o), stats::mean(&t)) {
                (Some(mo), Some(mt)) => {
                    let mean_similarity = stats::relative_similarity(mo, mt);
                    let variance_similarity = stats::relative_similarity(stats::variance(&o), stats::variance(&t));
                    (mean_similarity + variance_similarity) / 2.0
                }
                _ => 0.0,
            }
        } else {
            let o = labels(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            categorical_similarity(o, labels(al.transformed_cells(col)))
        };
        breakdown.insert(al.name(col).to_string(), score);
    }
    MetricResult::from_breakdown(breakdown, "no attribute had comparable values for statistical similarity")
}

fn correlation(al: &Alignment<'_>) -> MetricResult {
    let mut breakdown = BTreeMap::new();

    let numeric = al.numeric_columns();
    for (i, &a) in numeric.iter().enumerate() {
        for &b in &numeric[i + 1..] {
            let paired = |cells_a: Vec<Option<f64>>, cells_b: Vec<Option<f64>>| -> Vec<(f64, f64)> {
                cells_a
                    .into_iter()
                    .zip(cells_b)
                    .filter_map(|(x, y)| Some((x?, y?)))
                    .collect()
            };
            let o = paired(
                al.original_cells(a).map(Value::numeric_estimate).collect(),
                al.original_cells(b).map(Value::numeric_estimate).collect(),
            );
            let t = paired(
                al.transformed_cells(a).map(Value::numeric_estimate).collect(),
                al.transformed_cells(b).map(Value::numeric_estimate).collect(),
            );
            let Some(ro) = stats::pearson(&o) else {
                continue;
            };
            let rt = stats::pearson(&t).unwrap_or(0.0);
            breakdown.insert(format!("{}~{}", al.name(a), al.name(b)), 1.0 - (ro - rt).abs());
        }
    }

    let categorical = al.categorical_columns();
    for (i, &a) in categorical.iter().enumerate() {
        for &b in &categorical[i + 1..] {
            let paired = |cells_a: Vec<&Value>, cells_b: Vec<&Value>| -> Vec<(String, String)> {
                cells_a
                    .into_iter()
                    .zip(cells_b)
                    .filter(|(x, y)| !x.is_null() && !y.is_null())
                    .map(|(x, y)| (x.label(), y.label()))
                    .collect()
            };
            let o = paired(al.original_cells(a).collect(), al.original_cells(b).collect());
            let t = paired(al.transformed_cells(a).collect(), al.transformed_cells(b).collect());
            let Some(vo) = stats::cramers_v(&o) else {
                continue;
            };
            let vt = stats::cramers_v(&t).unwrap_or(0.0);
            breakdown.insert(format!("{}~{}", al.name(a), al.name(b)), 1.0 - (vo - vt).abs());
        }
    }

    let mut result = MetricResult::from_breakdown(
        breakdown,
        "fewer than two comparable attributes of the same kind for correlation analysis",
    );
    result.score = result.score.map(|s| s.clamp(0.0, 1.0));
    result
}

fn distribution(al: &Alignment<'_>) -> MetricResult {
    let mut breakdown = BTreeMap::new();
    for &col in &al.columns {
        let score = if al.is_numeric(col) {
            let o = numbers(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            let t = numbers(al.transformed_cells(col));
            if t.is_empty() {
                0.0
            } else {
                let ks_similarity = 1.0 - stats::ks_statistic(&o, &t);
                let range = o.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                    - o.iter().copied().fold(f64::INFINITY, f64::min);
                let distance = stats::wasserstein(&o, &t);
                let wasserstein_similarity = if range > 0.0 {
                    (1.0 - distance / range).max(0.0)
                } else if distance <= f64::EPSILON {
                    1.0
                } else {
                    0.0
                };
                (ks_similarity + wasserstein_similarity) / 2.0
            }
        } else {
            let o = labels(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            categorical_similarity(o, labels(al.transformed_cells(col)))
        };
        breakdown.insert(al.name(col).to_string(), score);
    }
    MetricResult::from_breakdown(breakdown, "no attribute had comparable values for distribution analysis")
}

fn numeric_entropy(values: &[f64]) -> f64 {
    let mut distinct = values.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    let bins = stats::equal_width_bins(values, distinct.len().min(ENTROPY_BINS));
    entropy(stats::frequencies(bins).into_values())
}

fn information(al: &Alignment<'_>) -> MetricResult {
    let mut breakdown = BTreeMap::new();
    for &col in &al.columns {
        let (original, transformed) = if al.is_numeric(col) {
            let o = numbers(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            (numeric_entropy(&o), numeric_entropy(&numbers(al.transformed_cells(col))))
        } else {
            let o = labels(al.original_cells(col));
            if o.is_empty() {
                continue;
            }
            let t = labels(al.transformed_cells(col));
            (
                entropy(stats::frequencies(o).into_values()),
                entropy(stats::frequencies(t).into_values()),
            )
        };
        let preservation = if original > 0.0 {
            1.0 - ((original - transformed) / original).max(0.0)
        } else {
            1.0
        };
        breakdown.insert(al.name(col).to_string(), preservation);
    }
    MetricResult::from_breakdown(breakdown, "no attribute had values for information loss")
}

fn preservation(original: f64, transformed: f64) -> f64 {
    if original.abs() > 1e-8 {
        (1.0 - (original - transformed).abs() / original.abs()).max(0.0)
    } else if transformed.abs() < 1e-8 {
        1.0
    } else {
        0.0
    }
}

fn query_accuracy(al: &Alignment<'_>) -> MetricResult {
    let mut breakdown = BTreeMap::new();
    let count = (al.transformed.len() as f64 / al.original.len() as f64).min(1.0);
    breakdown.insert("count".to_string(), count);

    let mut sums = Vec::new();
    let mut means = Vec::new();
    for col in al.numeric_columns() {
        let o = numbers(al.original.column(col));
        let t = numbers(al.transformed.column(col));
        let Some(mo) = stats::mean(&o) else {
            continue;
        };
        let sum = preservation(o.iter().sum(), t.iter().sum());
        let mean = stats::mean(&t).map_or(0.0, |mt| preservation(mo, mt));
        breakdown.insert(format!("{}.sum", al.name(col)), sum);
        breakdown.insert(format!("{}.mean", al.name(col)), mean);
        sums.push(sum);
        means.push(mean);
    }

    let mut components = vec![count];
    components.extend(stats::mean(&sums));
    components.extend(stats::mean(&means));
    MetricResult {
        score: stats::mean(&components),
        breakdown,
        note: None,
    }
}

/// Encode the aligned rows of one side as classifier features and targets
fn encode_side<'v>(
    cells: impl Fn(usize) -> Vec<&'v Value>,
    features: &[(usize, bool)],
    target: usize,
) -> (Vec<Vec<String>>, Vec<String>) {
    let targets: Vec<&Value> = cells(target);
    let keep: Vec<usize> = (0..targets.len()).filter(|&i| !targets[i].is_null()).collect();

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(features.len());
    for &(col, numeric) in features {
        let values = cells(col);
        let encoded = if numeric {
            let estimates: Vec<Option<f64>> = keep.iter().map(|&i| values[i].numeric_estimate()).collect();
            let present: Vec<f64> = estimates.iter().flatten().copied().collect();
            let mut bins = stats::equal_width_bins(&present, FEATURE_BINS).into_iter();
            estimates
                .iter()
                .map(|e| match e {
                    Some(_) => bins.next().map_or_else(|| "missing".to_string(), |b| b.to_string()),
                    None => "missing".to_string(),
                })
                .collect()
        } else {
            keep.iter().map(|&i| values[i].label()).collect()
        };
        columns.push(encoded);
    }

    let rows = (0..keep.len())
        .map(|r| columns.iter().map(|c| c[r].clone()).collect())
        .collect();
    let labels = keep.iter().map(|&i| targets[i].label()).collect();
    (rows, labels)
}

fn classification(al: &Alignment<'_>, target: &str) -> Result<(MetricResult, Option<ClassificationSummary>)> {
    let target_col = al.original.require(target)?;
    if al.original.attribute(target_col).role == AttributeRole::Identifier {
        return Err(AnonError::invalid(
            "classification target",
            target,
            "identifier attributes are excluded from utility comparison",
        ));
    }
    let not_scored = |note: String| -> Result<(MetricResult, Option<ClassificationSummary>)> {
        Ok((
            MetricResult {
                score: None,
                breakdown: BTreeMap::new(),
                note: Some(note),
            },
            None,
        ))
    };

    let features: Vec<(usize, bool)> = al
        .columns
        .iter()
        .copied()
        .filter(|&c| c != target_col)
        .map(|c| (c, al.is_numeric(c)))
        .collect();
    if features.is_empty() {
        return not_scored(format!("no feature attributes to predict '{}'", target));
    }

    let (ox, oy) = encode_side(|c| al.original_cells(c).collect(), &features, target_col);
    let (tx, ty) = encode_side(|c| al.transformed_cells(c).collect(), &features, target_col);
    if oy.len() < MIN_CLASSIFICATION_ROWS || ty.len() < MIN_CLASSIFICATION_ROWS {
        return not_scored(format!("too few records to train a classifier for '{}'", target));
    }

    let (Some(original_accuracy), Some(transformed_accuracy)) =
        (holdout_accuracy(&ox, &oy, SPLIT_SEED), holdout_accuracy(&tx, &ty, SPLIT_SEED))
    else {
        return not_scored(format!("could not split records to classify '{}'", target));
    };
    if original_accuracy <= 0.0 {
        return not_scored(format!("original data does not predict '{}'", target));
    }

    let score = (transformed_accuracy / original_accuracy).min(1.0);
    let breakdown = BTreeMap::from([
        ("original_accuracy".to_string(), original_accuracy),
        ("transformed_accuracy".to_string(), transformed_accuracy),
    ]);
    Ok((
        MetricResult {
            score: Some(score),
            breakdown,
            note: None,
        },
        Some(ClassificationSummary {
            target: target.to_string(),
            original_accuracy,
            transformed_accuracy,
        }),
    ))
}

/// Score how well `transformed` preserves the utility of `original`
///
/// # Errors
///
/// - [`AnonError::ShapeMismatch`] when rows cannot be aligned
/// - [`ConfigError`] for an empty metric list or an unusable classification target
pub fn evaluate(original: &Dataset, transformed: &Dataset, metrics: &[UtilityMetric]) -> Result<UtilityReport> {
    if metrics.is_empty() {
        return Err(AnonError::invalid("metrics", "[]", "at least one metric is required"));
    }
    let al = Alignment::new(original, transformed)?;

    let mut scores = BTreeMap::new();
    let mut breakdowns = BTreeMap::new();
    let mut notes = Vec::new();
    let mut summary = None;

    for metric in metrics {
        let result = match metric {
            UtilityMetric::Statistical => statistical(&al),
            UtilityMetric::Correlation => correlation(&al),
            UtilityMetric::Distribution => distribution(&al),
            UtilityMetric::InformationLoss => information(&al),
            UtilityMetric::QueryAccuracy => query_accuracy(&al),
            UtilityMetric::Classification { target } => {
                let (result, classified) = classification(&al, target)?;
                summary = classified.or(summary);
                result
            }
        };
        debug!(metric = metric.name(), score = ?result.score, "utility metric computed");
        if let Some(score) = result.score {
            scores.insert(metric.name().to_string(), score);
        }
        if let Some(note) = result.note {
            notes.push(format!("{}: {}", metric.name(), note));
        }
        if !result.breakdown.is_empty() {
            breakdowns.insert(metric.name().to_string(), result.breakdown);
        }
    }

    let overall_utility = mean_of(&scores).unwrap_or(0.0);
    let utility_level = UtilityLevel::from_score(overall_utility);
    info!(
        aligned = al.pairs.len(),
        metrics = scores.len(),
        overall_utility,
        level = ?utility_level,
        "utility evaluated"
    );

    Ok(UtilityReport {
        original_records: original.len(),
        transformed_records: transformed.len(),
        aligned_records: al.pairs.len(),
        scores,
        breakdowns,
        classification: summary,
        overall_utility,
        utility_level,
        notes,
    })
}
