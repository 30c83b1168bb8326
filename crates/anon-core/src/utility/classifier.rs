//! Categorical Naive Bayes used to measure classification utility

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Fraction of rows used for training
pub(crate) const TRAIN_FRACTION: f64 = 0.7;

/// Seed of the train/test shuffle
pub(crate) const SPLIT_SEED: u64 = 42;

/// Laplace-smoothed categorical Naive Bayes
pub(crate) struct NaiveBayes {
    /// Class label → training count, in label order
    classes: BTreeMap<String, usize>,
    /// Per feature: (class, value) → count
    counts: Vec<HashMap<(String, String), usize>>,
    /// Per feature: number of distinct values seen in training
    cardinality: Vec<usize>,
    total: usize,
}

impl NaiveBayes {
    pub(crate) fn fit(features: &[Vec<String>], targets: &[String]) -> Option<Self> {
        let width = features.first()?.len();
        let mut classes = BTreeMap::new();
        let mut counts = vec![HashMap::new(); width];
        let mut seen: Vec<HashSet<&str>> = vec![HashSet::new(); width];

        for (row, target) in features.iter().zip(targets) {
            *classes.entry(target.clone()).or_insert(0) += 1;
            for (f, value) in row.iter().enumerate() {
                *counts[f].entry((target.clone(), value.clone())).or_insert(0) += 1;
                seen[f].insert(value.as_str());
            }
        }

        Some(NaiveBayes {
            classes,
            counts,
            cardinality: seen.iter().map(HashSet::len).collect(),
            total: targets.len(),
        })
    }

    pub(crate) fn predict(&self, row: &[String]) -> Option<&str> {
        let mut best: Option<(&str, f64)> = None;
        for (class, &class_count) in &self.classes {
            let mut score = (class_count as f64 / self.total as f64).ln();
            for (f, value) in row.iter().enumerate() {
                let count = self.counts[f]
                    .get(&(class.clone(), value.clone()))
                    .copied()
                    .unwrap_or(0);
                score += ((count + 1) as f64 / (class_count + self.cardinality[f] + 1) as f64).ln();
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((class.as_str(), score));
            }
        }
        best.map(|(class, _)| class)
    }
}

/// Accuracy on a seeded 70/30 holdout split
pub(crate) fn holdout_accuracy(features: &[Vec<String>], targets: &[String], seed: u64) -> Option<f64> {
    let n = targets.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));

    let train_len = ((n as f64) * TRAIN_FRACTION).round() as usize;
    if train_len == 0 || train_len >= n {
        return None;
    }
    let (train, test) = order.split_at(train_len);

    let train_x: Vec<Vec<String>> = train.iter().map(|&i| features[i].clone()).collect();
    let train_y: Vec<String> = train.iter().map(|&i| targets[i].clone()).collect();
    let model = NaiveBayes::fit(&train_x, &train_y)?;

    let correct = test
        .iter()
        .filter(|&&i| model.predict(&features[i]) == Some(targets[i].as_str()))
        .count();
    Some(correct as f64 / test.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_learns_deterministic_mapping() {
        let features: Vec<Vec<String>> = (0..40)
            .map(|i| strings(&[if i % 2 == 0 { "red" } else { "blue" }]))
            .collect();
        let targets: Vec<String> = (0..40)
            .map(|i| if i % 2 == 0 { "yes" } else { "no" }.to_string())
            .collect();
        let accuracy = holdout_accuracy(&features, &targets, SPLIT_SEED).unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[test]
    fn test_predict_prefers_majority_without_evidence() {
        let features = vec![strings(&["a"]), strings(&["a"]), strings(&["a"])];
        let targets = strings(&["x", "x", "y"]);
        let model = NaiveBayes::fit(&features, &targets).unwrap();
        assert_eq!(model.predict(&strings(&["unseen"])), Some("x"));
    }

    #[test]
    fn test_split_is_deterministic() {
        let features: Vec<Vec<String>> = (0..30).map(|i| vec![(i % 3).to_string()]).collect();
        let targets: Vec<String> = (0..30).map(|i| (i % 2).to_string()).collect();
        assert_eq!(
            holdout_accuracy(&features, &targets, 7),
            holdout_accuracy(&features, &targets, 7)
        );
    }
}
