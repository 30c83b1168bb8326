//! Generalization Hierarchies
//!
//! Per-attribute trees mapping raw values to progressively coarser labels.
//! Level 0 is the raw value and level `height` is full suppression (`*`).
//! Every hierarchy is validated when built, so generalization at a valid
//! level is monotonic: two values that share a label at level `i` share a
//! label at every level above `i`.
//!
//! # Example
//!
//! ```
//! use anon_core::{Hierarchy, Value};
//!
//! let age = Hierarchy::numeric_bands("age", vec![5.0, 10.0, 20.0]).unwrap();
//! assert_eq!(age.height(), 4);
//! assert_eq!(age.generalize(&Value::from(37), 1).unwrap(), Value::from("[35, 40)"));
//! assert_eq!(age.generalize(&Value::from(37), 2).unwrap(), Value::from("[30, 40)"));
//! assert_eq!(age.generalize(&Value::from(37), 4).unwrap(), Value::from("*"));
//! ```

use crate::dataset::{AttributeType, Dataset, Value, SUPPRESSED};
use crate::error::ConfigError;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;

/// How a hierarchy derives its generalized labels
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HierarchyKind {
    /// Explicit path per raw label: labels for levels 1..=height, ending in `*`
    Explicit { paths: BTreeMap<String, Vec<String>> },
    /// Nested numeric bands `[lo, hi)`, one width per level below `*`
    NumericBands { widths: Vec<f64> },
    /// Month, year, decade, then `*`
    Date,
    /// Mask one more trailing character per level, then `*`
    PrefixMask { masked: usize },
    /// Raw value or `*`
    SuppressionOnly,
}

/// Validated generalization hierarchy for one attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hierarchy {
    attribute: String,
    kind: HierarchyKind,
}

impl Hierarchy {
    /// Hierarchy from explicit paths
    ///
    /// Each entry maps a raw value label to its generalized labels for levels
    /// 1..=height. All paths must have the same length and end in `*`, and no
    /// node may have two different parents.
    pub fn explicit<K, I>(attribute: impl Into<String>, paths: I) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Vec<String>)>,
    {
        let attribute = attribute.into();
        let paths: BTreeMap<String, Vec<String>> =
            paths.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let invalid = |reason: String| ConfigError::InvalidHierarchy {
            attribute: attribute.clone(),
            reason,
        };

        let height = match paths.values().next() {
            Some(path) => path.len(),
            None => return Err(invalid("hierarchy has no values".to_string())),
        };
        if height == 0 {
            return Err(invalid("height must be at least 1".to_string()));
        }

        // parent of each node, per level
        let mut parents: Vec<BTreeMap<&str, &str>> = vec![BTreeMap::new(); height];
        for (raw, path) in &paths {
            if path.len() != height {
                return Err(invalid(format!(
                    "path for '{}' has {} levels, expected {}",
                    raw,
                    path.len(),
                    height
                )));
            }
            if path[height - 1] != SUPPRESSED {
                return Err(invalid(format!(
                    "path for '{}' ends in '{}' instead of '{}'",
                    raw,
                    path[height - 1],
                    SUPPRESSED
                )));
            }
            for level in 0..height - 1 {
                let node = path[level].as_str();
                let parent = path[level + 1].as_str();
                match parents[level].insert(node, parent) {
                    Some(previous) if previous != parent => {
                        return Err(invalid(format!(
                            "'{}' at level {} has parents '{}' and '{}'",
                            node,
                            level + 1,
                            previous,
                            parent
                        )));
                    }
                    _ => {}
                }
            }
        }

        Ok(Hierarchy {
            attribute,
            kind: HierarchyKind::Explicit { paths },
        })
    }

    /// Nested numeric bands anchored at zero
    ///
    /// Each width must be an integer multiple of the previous one so that
    /// every band sits inside exactly one band of the next level.
    pub fn numeric_bands(attribute: impl Into<String>, widths: Vec<f64>) -> Result<Self, ConfigError> {
        let attribute = attribute.into();
        for (i, width) in widths.iter().enumerate() {
            if !width.is_finite() || *width <= 0.0 {
                return Err(ConfigError::InvalidHierarchy {
                    attribute,
                    reason: format!("band width {} must be positive and finite", width),
                });
            }
            if i > 0 {
                let ratio = width / widths[i - 1];
                if ratio < 1.0 || (ratio - ratio.round()).abs() > 1e-9 {
                    return Err(ConfigError::InvalidHierarchy {
                        attribute,
                        reason: format!(
                            "band width {} is not an integer multiple of {}",
                            width,
                            widths[i - 1]
                        ),
                    });
                }
            }
        }
        Ok(Hierarchy {
            attribute,
            kind: HierarchyKind::NumericBands { widths },
        })
    }

    /// Month → year → decade → `*`
    pub fn date(attribute: impl Into<String>) -> Self {
        Hierarchy {
            attribute: attribute.into(),
            kind: HierarchyKind::Date,
        }
    }

    /// Mask trailing characters one level at a time (`02139 → 0213* → 021**`)
    pub fn prefix_mask(attribute: impl Into<String>, masked: usize) -> Self {
        Hierarchy {
            attribute: attribute.into(),
            kind: HierarchyKind::PrefixMask { masked },
        }
    }

    /// Height-1 hierarchy: raw value or `*`
    pub fn suppression_only(attribute: impl Into<String>) -> Self {
        Hierarchy {
            attribute: attribute.into(),
            kind: HierarchyKind::SuppressionOnly,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn kind(&self) -> &HierarchyKind {
        &self.kind
    }

    /// Number of levels above the raw value; level `height` is `*`
    pub fn height(&self) -> usize {
        match &self.kind {
            HierarchyKind::Explicit { paths } => paths.values().next().map_or(1, Vec::len),
            HierarchyKind::NumericBands { widths } => widths.len() + 1,
            HierarchyKind::Date => 4,
            HierarchyKind::PrefixMask { masked } => masked + 1,
            HierarchyKind::SuppressionOnly => 1,
        }
    }

    /// Generalize a raw value to the given level
    ///
    /// Levels at or above the height yield `*`, as does a null at any level
    /// above 0.
    pub fn generalize(&self, value: &Value, level: usize) -> Result<Value, ConfigError> {
        if level == 0 {
            return Ok(value.clone());
        }
        if level >= self.height() || value.is_null() {
            return Ok(Value::Text(SUPPRESSED.to_string()));
        }

        let label = match (&self.kind, value) {
            (HierarchyKind::Explicit { paths }, _) => {
                let path = paths
                    .get(&value.label())
                    .ok_or_else(|| self.unknown(value, level))?;
                path[level - 1].clone()
            }
            (HierarchyKind::NumericBands { widths }, Value::Number(x)) => {
                let width = widths[level - 1];
                let lo = (x / width).floor() * width + 0.0;
                format!("[{}, {})", lo, lo + width)
            }
            (HierarchyKind::Date, Value::Date(d)) => match level {
                1 => format!("{:04}-{:02}", d.year(), d.month()),
                2 => format!("{:04}", d.year()),
                _ => format!("{}s", d.year().div_euclid(10) * 10),
            },
            (HierarchyKind::PrefixMask { .. }, _) => mask_suffix(&value.label(), level),
            _ => return Err(self.unknown(value, level)),
        };
        Ok(Value::Text(label))
    }

    fn unknown(&self, value: &Value, level: usize) -> ConfigError {
        ConfigError::UnknownHierarchyValue {
            attribute: self.attribute.clone(),
            value: value.label(),
            level,
        }
    }
}

fn mask_suffix(label: &str, count: usize) -> String {
    let chars: Vec<char> = label.chars().collect();
    let keep = chars.len().saturating_sub(count);
    let mut masked: String = chars[..keep].iter().collect();
    masked.extend(std::iter::repeat('*').take(chars.len() - keep));
    masked
}

/// Hierarchies keyed by attribute name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchySet {
    hierarchies: BTreeMap<String, Hierarchy>,
}

impl HierarchySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hierarchy under its attribute name, replacing any previous one
    pub fn insert(&mut self, hierarchy: Hierarchy) {
        self.hierarchies
            .insert(hierarchy.attribute.clone(), hierarchy);
    }

    /// Builder form of [`HierarchySet::insert`]
    pub fn with(mut self, hierarchy: Hierarchy) -> Self {
        self.insert(hierarchy);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&Hierarchy> {
        self.hierarchies.get(attribute)
    }

    pub fn require(&self, attribute: &str) -> Result<&Hierarchy, ConfigError> {
        self.get(attribute)
            .ok_or_else(|| ConfigError::MissingHierarchy(attribute.to_string()))
    }

    pub fn len(&self) -> usize {
        self.hierarchies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hierarchies.is_empty()
    }

    /// Derive default hierarchies for the quasi-identifiers of a dataset
    ///
    /// Numeric columns get doubling bands starting at width 5, dates the
    /// calendar hierarchy, fixed-width codes (ZIP-like) a prefix mask, and
    /// any other categorical column a suppression-only hierarchy.
    pub fn inferred(dataset: &Dataset) -> Self {
        let mut set = HierarchySet::new();
        for name in dataset.quasi_identifiers() {
            let Some(idx) = dataset.index_of(name) else {
                continue;
            };
            let hierarchy = match dataset.attribute(idx).kind {
                AttributeType::Numeric => numeric_default(dataset, idx, name),
                AttributeType::Date => Hierarchy::date(name),
                AttributeType::Categorical => categorical_default(dataset, idx, name),
            };
            set.insert(hierarchy);
        }
        set
    }
}

fn numeric_default(dataset: &Dataset, idx: usize, name: &str) -> Hierarchy {
    let (lo, hi) = dataset
        .column(idx)
        .filter_map(Value::as_f64)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    let range = if hi > lo { hi - lo } else { 1.0 };

    let mut widths = vec![5.0];
    while widths.len() < 8 && widths[widths.len() - 1] < range {
        widths.push(widths[widths.len() - 1] * 2.0);
    }
    Hierarchy {
        attribute: name.to_string(),
        kind: HierarchyKind::NumericBands { widths },
    }
}

fn categorical_default(dataset: &Dataset, idx: usize, name: &str) -> Hierarchy {
    let mut lengths = dataset
        .column(idx)
        .filter(|v| !v.is_null())
        .map(|v| v.label().chars().count());
    let first = lengths.next();
    let fixed_width = first.filter(|n| *n > 1 && lengths.all(|m| m == *n));
    match fixed_width {
        Some(width) => Hierarchy::prefix_mask(name, width),
        None => Hierarchy::suppression_only(name),
    }
}
