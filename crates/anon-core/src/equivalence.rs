//! Equivalence classes
//!
//! Records sharing identical (generalized) quasi-identifier values form one
//! class. Values are compared by [`ValueKey`], so a null never shares a class
//! with the text `"NULL"`. Classes partition the non-suppressed rows exactly
//! and are listed in order of first appearance, so partitioning is
//! deterministic.

use crate::dataset::{Dataset, ValueKey};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

/// Row indices sharing one quasi-identifier key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceClass {
    /// Quasi-identifier labels, in quasi-identifier order
    pub key: Vec<String>,
    /// Row indices in ascending order
    pub rows: Vec<usize>,
}

impl EquivalenceClass {
    pub fn size(&self) -> usize {
        self.rows.len()
    }
}

/// Per-class outcome of a privacy criterion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassVerdict {
    /// Quasi-identifier labels of the class
    pub values: Vec<String>,
    pub size: usize,
    /// Criterion measure: class size, distinct count, entropy or distance
    pub measure: f64,
    pub satisfied: bool,
}

/// Group `(row, key)` pairs by key, in order of first appearance
pub(crate) fn group_rows<K, I>(keyed: I) -> Vec<(K, Vec<usize>)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = (usize, K)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<usize>)> = Vec::new();
    for (row, key) in keyed {
        match index.get(&key) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

fn classes<I>(dataset: &Dataset, rows: I, columns: &[usize]) -> Vec<EquivalenceClass>
where
    I: IntoIterator<Item = usize>,
{
    let keyed = rows.into_iter().map(|row| {
        let key: Vec<ValueKey> = columns.iter().map(|&c| dataset.value(row, c).key()).collect();
        (row, key)
    });
    group_rows(keyed)
        .into_iter()
        .map(|(_, rows)| EquivalenceClass {
            key: columns.iter().map(|&c| dataset.value(rows[0], c).label()).collect(),
            rows,
        })
        .collect()
}

/// Partition the non-suppressed rows of a dataset by the given columns
pub fn partition(dataset: &Dataset, columns: &[usize]) -> Vec<EquivalenceClass> {
    classes(dataset, dataset.retained_rows(), columns)
}

/// Partition a subset of rows of a dataset by the given columns
pub(crate) fn partition_rows(dataset: &Dataset, rows: &[usize], columns: &[usize]) -> Vec<EquivalenceClass> {
    classes(dataset, rows.iter().copied(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attribute, AttributeRole, AttributeType, Value};

    fn dataset() -> Dataset {
        let schema = vec![
            Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
            Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
        ];
        let rows = [("30-39", "021*"), ("30-39", "021*"), ("40-49", "021*"), ("30-39", "021*")]
            .iter()
            .map(|(a, z)| vec![Value::from(*a), Value::from(*z)])
            .collect();
        Dataset::new(schema, rows).unwrap()
    }

    #[test]
    fn test_partition_groups_identical_keys() {
        let classes = partition(&dataset(), &[0, 1]);
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].rows, vec![0, 1, 3]);
        assert_eq!(classes[1].rows, vec![2]);
        assert_eq!(classes[1].key, vec!["40-49".to_string(), "021*".to_string()]);
    }

    #[test]
    fn test_partition_covers_every_row_once() {
        let ds = dataset();
        let classes = partition(&ds, &[1]);
        let total: usize = classes.iter().map(EquivalenceClass::size).sum();
        assert_eq!(total, ds.len());
        assert_eq!(classes.len(), 1);
    }

    #[test]
    fn test_partition_skips_suppressed_rows() {
        let ds = dataset();
        let redacted = Dataset::derived(
            ds.schema().to_vec(),
            ds.rows().to_vec(),
            None,
            vec![false, false, true, false],
        );
        let classes = partition(&redacted, &[0, 1]);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].size(), 3);
    }

    #[test]
    fn test_lookalike_values_form_separate_classes() {
        let schema = vec![Attribute::new("code", AttributeRole::QuasiIdentifier, AttributeType::Categorical)];
        let rows = vec![
            vec![Value::Null],
            vec![Value::from("NULL")],
            vec![Value::from(1)],
            vec![Value::from("1")],
            vec![Value::Null],
        ];
        let ds = Dataset::new(schema, rows).unwrap();
        let classes = partition(&ds, &[0]);
        assert_eq!(classes.len(), 4);
        assert_eq!(classes[0].rows, vec![0, 4]);
        // labels still read the same
        assert_eq!(classes[0].key, classes[1].key);
        assert_eq!(classes[2].key, classes[3].key);
    }

    #[test]
    fn test_partition_rows_subset() {
        let classes = partition_rows(&dataset(), &[2, 3], &[0]);
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].rows, vec![2]);
    }
}
