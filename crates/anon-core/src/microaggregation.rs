//! Microaggregation (MDAV clustering) for k-anonymity
//!
//! Instead of walking generalization hierarchies, records are partitioned
//! into clusters of at least `k` by Maximum Distance to Average Vector:
//! take the record farthest from the centroid and group it with its `k - 1`
//! nearest neighbours, then do the same for the record farthest from that
//! one, until fewer than `3k` records remain.
//!
//! Within a cluster every quasi-identifier is replaced by one shared value:
//! the mean for numeric attributes, the common value (or `*`) otherwise.
//! Distances use z-scored numbers plus a 0/1 mismatch per categorical
//! attribute. Ties resolve to the lowest row, so the result is deterministic.

use crate::cancel::{bail_if_cancelled, CancellationToken, Outcome};
use crate::dataset::{AttributeType, Dataset, Value, ValueKey, SUPPRESSED};
use crate::equivalence::ClassVerdict;
use crate::error::{AnonError, BestEffort, ConfigError, PrivacyCriterion, Result};
use crate::generalize::{suppression_allowance, GeneralizationReport, KAnonymityConfig, SuppressionMode};
use crate::risk::resolve_quasi_identifiers;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// One quasi-identifier prepared for distance computations
enum Feature {
    /// z-scores per dataset row; nulls sit at the mean
    Numeric(Vec<f64>),
    Categorical(Vec<ValueKey>),
}

impl Feature {
    fn new(dataset: &Dataset, column: usize, rows: &[usize]) -> Self {
        let numeric = dataset.attribute(column).kind == AttributeType::Numeric
            && rows
                .iter()
                .map(|&r| dataset.value(r, column))
                .all(|v| v.is_null() || v.as_f64().is_some());
        if !numeric {
            return Feature::Categorical(dataset.column(column).map(Value::key).collect());
        }

        let present: Vec<f64> = rows.iter().filter_map(|&r| dataset.value(r, column).as_f64()).collect();
        let n = present.len().max(1) as f64;
        let mean = present.iter().sum::<f64>() / n;
        let sd = (present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
        let z = dataset
            .column(column)
            .map(|v| match v.as_f64() {
                Some(x) if sd > 0.0 => (x - mean) / sd,
                _ => 0.0,
            })
            .collect();
        Feature::Numeric(z)
    }
}

/// Centre of a set of records: mean z per numeric feature, mode per categorical one
struct Centroid<'a> {
    parts: Vec<CentroidPart<'a>>,
}

enum CentroidPart<'a> {
    Mean(f64),
    Mode(&'a ValueKey),
}

struct Space<'a> {
    features: &'a [Feature],
}

impl<'a> Space<'a> {
    fn distance(&self, a: usize, b: usize) -> f64 {
        self.features
            .iter()
            .map(|f| match f {
                Feature::Numeric(z) => (z[a] - z[b]).powi(2),
                Feature::Categorical(keys) => f64::from(u8::from(keys[a] != keys[b])),
            })
            .sum()
    }

    fn centroid(&self, members: &[usize]) -> Centroid<'a> {
        let parts = self
            .features
            .iter()
            .map(|f| match f {
                Feature::Numeric(z) => {
                    CentroidPart::Mean(members.iter().map(|&r| z[r]).sum::<f64>() / members.len().max(1) as f64)
                }
                Feature::Categorical(keys) => CentroidPart::Mode(mode(members.iter().map(|&r| &keys[r]))),
            })
            .collect();
        Centroid { parts }
    }

    fn distance_to(&self, row: usize, centroid: &Centroid<'_>) -> f64 {
        self.features
            .iter()
            .zip(&centroid.parts)
            .map(|(f, part)| match (f, part) {
                (Feature::Numeric(z), CentroidPart::Mean(m)) => (z[row] - m).powi(2),
                (Feature::Categorical(keys), CentroidPart::Mode(key)) => f64::from(u8::from(&keys[row] != *key)),
                _ => 0.0,
            })
            .sum()
    }

    /// Member farthest from `reference`; the lowest row wins ties
    fn farthest(&self, members: &[usize], reference: impl Fn(usize) -> f64) -> usize {
        let mut best = (members[0], reference(members[0]));
        for &r in &members[1..] {
            let d = reference(r);
            if d > best.1 || (d == best.1 && r < best.0) {
                best = (r, d);
            }
        }
        best.0
    }

    /// Take `anchor` and its `k - 1` nearest neighbours out of `remaining`
    fn take_cluster(&self, remaining: &mut Vec<usize>, anchor: usize, k: usize) -> Vec<usize> {
        let mut others: Vec<(f64, usize)> = remaining
            .iter()
            .filter(|&&r| r != anchor)
            .map(|&r| (self.distance(anchor, r), r))
            .collect();
        others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut cluster = vec![anchor];
        cluster.extend(others.iter().take(k - 1).map(|&(_, r)| r));
        remaining.retain(|r| !cluster.contains(r));
        cluster.sort_unstable();
        cluster
    }
}

static NULL_KEY: ValueKey = ValueKey::Null;

/// Most frequent key; ties go to the one seen first
fn mode<'a>(keys: impl Iterator<Item = &'a ValueKey>) -> &'a ValueKey {
    let mut counts: HashMap<&ValueKey, (usize, usize)> = HashMap::new();
    for (order, key) in keys.enumerate() {
        counts.entry(key).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| (a.1 .0).cmp(&b.1 .0).then((b.1 .1).cmp(&a.1 .1)))
        .map_or(&NULL_KEY, |(key, _)| key)
}

/// MDAV partition of `rows` into clusters of at least `k` (for `rows.len() >= k`)
fn mdav(
    features: &[Feature],
    rows: &[usize],
    k: usize,
    cancel: &CancellationToken,
) -> Result<Outcome<Vec<Vec<usize>>>> {
    let space = Space { features };
    let mut remaining = rows.to_vec();
    let mut clusters = Vec::new();

    while remaining.len() >= 3 * k {
        bail_if_cancelled!(cancel);
        let centroid = space.centroid(&remaining);
        let r = space.farthest(&remaining, |row| space.distance_to(row, &centroid));
        clusters.push(space.take_cluster(&mut remaining, r, k));
        let s = space.farthest(&remaining, |row| space.distance(r, row));
        clusters.push(space.take_cluster(&mut remaining, s, k));
    }
    if remaining.len() >= 2 * k {
        let centroid = space.centroid(&remaining);
        let r = space.farthest(&remaining, |row| space.distance_to(row, &centroid));
        clusters.push(space.take_cluster(&mut remaining, r, k));
    }
    if !remaining.is_empty() {
        remaining.sort_unstable();
        clusters.push(remaining);
    }
    debug!(clusters = clusters.len(), k, "microaggregation partition");
    Ok(Outcome::Completed(clusters))
}

/// Shared value of one quasi-identifier over a cluster
fn aggregate(dataset: &Dataset, column: usize, cluster: &[usize], numeric: bool) -> Value {
    if numeric {
        let present: Vec<f64> = cluster.iter().filter_map(|&r| dataset.value(r, column).as_f64()).collect();
        if present.is_empty() {
            return Value::Null;
        }
        return Value::Number(present.iter().sum::<f64>() / present.len() as f64);
    }
    let first = dataset.value(cluster[0], column);
    let key = first.key();
    if cluster.iter().all(|&r| dataset.value(r, column).key() == key) {
        first.clone()
    } else {
        Value::Text(SUPPRESSED.to_string())
    }
}

/// Within-cluster share of the variance, averaged with the share of changed categorical cells
fn information_loss(
    dataset: &Dataset,
    qis: &[usize],
    numeric: &[bool],
    rows: &[usize],
    recoded: &HashMap<usize, Vec<Value>>,
) -> f64 {
    if qis.is_empty() || rows.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for (q, &column) in qis.iter().enumerate() {
        if numeric[q] {
            let pairs: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|&r| Some((dataset.value(r, column).as_f64()?, recoded[&r][q].as_f64()?)))
                .collect();
            let n = pairs.len().max(1) as f64;
            let mean = pairs.iter().map(|p| p.0).sum::<f64>() / n;
            let sst: f64 = pairs.iter().map(|p| (p.0 - mean).powi(2)).sum();
            let sse: f64 = pairs.iter().map(|p| (p.0 - p.1).powi(2)).sum();
            total += if sst > 0.0 { (sse / sst).min(1.0) } else { 0.0 };
        } else {
            let changed = rows
                .iter()
                .filter(|&&r| recoded[&r][q].key() != dataset.value(r, column).key())
                .count();
            total += changed as f64 / rows.len() as f64;
        }
    }
    total / qis.len() as f64
}

/// k-anonymity by microaggregation; hierarchies are not consulted
pub(crate) fn microaggregate(
    dataset: &Dataset,
    config: &KAnonymityConfig,
    cancel: &CancellationToken,
) -> Result<Outcome<(Dataset, GeneralizationReport)>> {
    let qis = resolve_quasi_identifiers(dataset, &config.quasi_identifiers)?;
    for name in config.max_levels.keys() {
        if !config.quasi_identifiers.contains(name) {
            return Err(ConfigError::UnknownAttribute(name.clone()).into());
        }
    }
    bail_if_cancelled!(cancel);

    let rows: Vec<usize> = dataset.retained_rows().collect();
    let allowance = suppression_allowance(config.suppression_limit, rows.len());
    let levels: BTreeMap<String, usize> = config.quasi_identifiers.iter().map(|n| (n.clone(), 0)).collect();

    let features: Vec<Feature> = qis.iter().map(|&c| Feature::new(dataset, c, &rows)).collect();
    let numeric: Vec<bool> = features.iter().map(|f| matches!(f, Feature::Numeric(_))).collect();

    let (clusters, violating) = if rows.len() >= config.k {
        match mdav(&features, &rows, config.k, cancel)? {
            Outcome::Completed(clusters) => (clusters, Vec::new()),
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        }
    } else {
        (Vec::new(), rows.clone())
    };

    let raw_verdict = |members: &[usize]| ClassVerdict {
        values: qis.iter().map(|&c| dataset.value(members[0], c).label()).collect(),
        size: members.len(),
        measure: members.len() as f64,
        satisfied: false,
    };
    if violating.len() > allowance {
        let best = BestEffort {
            criterion: PrivacyCriterion::KAnonymity { k: config.k },
            levels,
            violating_classes: vec![raw_verdict(&violating)],
            violating_records: violating.len(),
            suppression_allowed: allowance,
        };
        warn!(%best, "privacy criterion unattainable");
        return Err(AnonError::Unattainable(Box::new(best)));
    }

    let mut recoded: HashMap<usize, Vec<Value>> = HashMap::with_capacity(rows.len());
    let mut classes = Vec::with_capacity(clusters.len() + 1);
    for cluster in &clusters {
        let values: Vec<Value> = qis
            .iter()
            .enumerate()
            .map(|(q, &c)| aggregate(dataset, c, cluster, numeric[q]))
            .collect();
        classes.push(ClassVerdict {
            values: values.iter().map(Value::label).collect(),
            size: cluster.len(),
            measure: cluster.len() as f64,
            satisfied: true,
        });
        for &r in cluster {
            recoded.insert(r, values.clone());
        }
    }
    if !violating.is_empty() {
        warn!(records = violating.len(), "suppressing records below k");
        classes.push(raw_verdict(&violating));
    }

    let mut out_rows = Vec::with_capacity(dataset.len());
    let mut lineage = Vec::with_capacity(dataset.len());
    let mut flags = Vec::with_capacity(dataset.len());
    let mut dropped = false;
    for (r, original) in dataset.rows().iter().enumerate() {
        let mut row = original.clone();
        let flagged = if dataset.is_suppressed(r) {
            true
        } else if let Some(values) = recoded.get(&r) {
            for (q, &c) in qis.iter().enumerate() {
                row[c] = values[q].clone();
            }
            false
        } else {
            match config.suppression {
                SuppressionMode::Drop => {
                    dropped = true;
                    continue;
                }
                SuppressionMode::Redact => {
                    for &c in &qis {
                        row[c] = Value::Text(SUPPRESSED.to_string());
                    }
                    true
                }
            }
        };
        out_rows.push(row);
        lineage.push(dataset.source_row(r));
        flags.push(flagged);
    }
    let lineage = if dropped {
        Some(lineage)
    } else {
        dataset.lineage().map(<[usize]>::to_vec)
    };
    let anonymized = Dataset::derived(dataset.schema().to_vec(), out_rows, lineage, flags);

    let clustered: Vec<usize> = clusters.iter().flatten().copied().collect();
    let report = GeneralizationReport {
        quasi_identifiers: config.quasi_identifiers.clone(),
        k: config.k,
        suppression_limit: config.suppression_limit,
        suppression: config.suppression,
        recoding: config.recoding,
        early_suppression: config.early_suppression,
        max_levels: config.max_levels.clone(),
        levels,
        suppressed_records: violating.len(),
        steps: 0,
        clusters: Some(clusters.len()),
        classes,
        information_loss: information_loss(dataset, &qis, &numeric, &clustered, &recoded),
    };
    info!(
        k = config.k,
        clusters = clusters.len(),
        suppressed = report.suppressed_records,
        "k-anonymity satisfied by microaggregation"
    );
    Ok(Outcome::Completed((anonymized, report)))
}
