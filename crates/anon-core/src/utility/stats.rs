//! Descriptive statistics and distribution distances over plain slices

use std::collections::HashMap;
use std::hash::Hash;

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance; zero below two observations
pub(crate) fn variance(values: &[f64]) -> f64 {
    let Some(mu) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// `max(0, 1 − |a − b| / (|a| + ε))`
pub(crate) fn relative_similarity(original: f64, transformed: f64) -> f64 {
    (1.0 - (original - transformed).abs() / (original.abs() + 1e-8)).max(0.0)
}

/// Pearson correlation; `None` for fewer than two pairs or a constant side
pub(crate) fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Cramér's V association between two categorical columns
///
/// `None` when either side has fewer than two categories.
pub(crate) fn cramers_v<A, B>(pairs: &[(A, B)]) -> Option<f64>
where
    A: Hash + Eq,
    B: Hash + Eq,
{
    let n = pairs.len();
    if n == 0 {
        return None;
    }
    let mut rows: HashMap<&A, usize> = HashMap::new();
    let mut cols: HashMap<&B, usize> = HashMap::new();
    let mut cells: HashMap<(&A, &B), usize> = HashMap::new();
    for (a, b) in pairs {
        *rows.entry(a).or_default() += 1;
        *cols.entry(b).or_default() += 1;
        *cells.entry((a, b)).or_default() += 1;
    }
    let dof = rows.len().min(cols.len());
    if dof < 2 {
        return None;
    }

    let n_f = n as f64;
    let mut chi2 = 0.0;
    for (a, &row_total) in &rows {
        for (b, &col_total) in &cols {
            let expected = row_total as f64 * col_total as f64 / n_f;
            let observed = cells.get(&(*a, *b)).copied().unwrap_or(0) as f64;
            chi2 += (observed - expected).powi(2) / expected;
        }
    }
    Some((chi2 / (n_f * (dof - 1) as f64)).sqrt().min(1.0))
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Two-sample Kolmogorov-Smirnov statistic, `sup |F_a − F_b|`
pub(crate) fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    let (a, b) = (sorted(a), sorted(b));
    let (n, m) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n - j as f64 / m).abs());
    }
    d
}

/// First Wasserstein distance between two empirical distributions
pub(crate) fn wasserstein(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }
    let (a, b) = (sorted(a), sorted(b));
    let (n, m) = (a.len() as f64, b.len() as f64);
    let mut all: Vec<f64> = a.iter().chain(&b).copied().collect();
    all.sort_by(f64::total_cmp);

    let (mut i, mut j) = (0, 0);
    let mut distance = 0.0;
    for window in all.windows(2) {
        let x = window[0];
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        distance += (i as f64 / n - j as f64 / m).abs() * (window[1] - x);
    }
    distance
}

/// Frequency table of hashable observations
pub(crate) fn frequencies<K: Hash + Eq>(values: impl IntoIterator<Item = K>) -> HashMap<K, usize> {
    let mut counts = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

/// Total variation distance between two frequency tables
pub(crate) fn frequency_distance<K: Hash + Eq>(p: &HashMap<K, usize>, q: &HashMap<K, usize>) -> f64 {
    let p_total = p.values().sum::<usize>() as f64;
    let q_total = q.values().sum::<usize>() as f64;
    if p_total == 0.0 || q_total == 0.0 {
        return 1.0;
    }
    let mut distance = 0.0;
    for (key, &count) in p {
        let other = q.get(key).copied().unwrap_or(0) as f64 / q_total;
        distance += (count as f64 / p_total - other).abs();
    }
    for (key, &count) in q {
        if !p.contains_key(key) {
            distance += count as f64 / q_total;
        }
    }
    0.5 * distance
}

/// Equal-width bin index of each value over `[min, max]`
pub(crate) fn equal_width_bins(values: &[f64], bins: usize) -> Vec<usize> {
    let bins = bins.max(1);
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    let width = (hi - lo) / bins as f64;
    values
        .iter()
        .map(|&x| {
            if width <= 0.0 || !width.is_finite() {
                0
            } else {
                (((x - lo) / width) as usize).min(bins - 1)
            }
        })
        .collect()
}
