//! Dataset Model
//!
//! Immutable tabular container shared by every stage of the engine.
//!
//! A dataset is an ordered list of records over one schema. Each attribute
//! carries a role (identifier, quasi-identifier, sensitive, insensitive) and a
//! type (categorical, numeric, date). Construction validates the shape and the
//! value types; transforms never mutate a dataset in place, they return a new
//! one that keeps the schema and records where its rows came from.
//!
//! # Example
//!
//! ```
//! use anon_core::{Attribute, AttributeRole, AttributeType, Dataset, Value};
//!
//! let schema = vec![
//!     Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
//!     Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
//! ];
//! let dataset = Dataset::new(schema, vec![
//!     vec![Value::from(34), Value::from("flu")],
//!     vec![Value::from(36), Value::from("asthma")],
//! ]).unwrap();
//!
//! assert_eq!(dataset.len(), 2);
//! assert_eq!(dataset.quasi_identifiers(), vec!["age"]);
//! ```

use crate::error::ConfigError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Label used for the fully suppressed value at the top of every hierarchy
pub const SUPPRESSED: &str = "*";

/// Label for null values at level 0
pub const NULL_LABEL: &str = "NULL";

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as a number, only for `Value::Number`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric reading of the value, including generalized bands
    ///
    /// Numbers are returned as-is; interval labels of the form `[lo, hi)` are
    /// read as their midpoint. Suppressed markers and other text yield `None`.
    pub fn numeric_estimate(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(label) => interval_midpoint(label),
            _ => None,
        }
    }

    /// Identity used for grouping; unlike [`Value::label`] it keeps the kind,
    /// so text `"NULL"` and a null, or text `"1"` and the number 1, stay apart
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            // -0.0 and 0.0 are one number
            Value::Number(n) => ValueKey::Number((n + 0.0).to_bits()),
            Value::Date(d) => ValueKey::Date(*d),
            Value::Text(s) => ValueKey::Text(s.clone()),
        }
    }

    /// Canonical text label used for display and frequency reporting
    pub fn label(&self) -> String {
        match self {
            Value::Null => NULL_LABEL.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// True when the value is the full-suppression marker
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Value::Text(s) if s == SUPPRESSED)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Date(_) => "date",
            Value::Text(_) => "text",
        }
    }
}

/// Hashable, kind-tagged form of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    /// Bit pattern of the number
    Number(u64),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Parse a `[lo, hi)` band label into its midpoint
pub(crate) fn interval_midpoint(label: &str) -> Option<f64> {
    let inner = label.strip_prefix('[')?.strip_suffix(')')?;
    let (lo, hi) = inner.split_once(',')?;
    let lo: f64 = lo.trim().parse().ok()?;
    let hi: f64 = hi.trim().parse().ok()?;
    Some((lo + hi) / 2.0)
}

/// Role of an attribute in privacy analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    /// Directly identifying (name, SSN)
    Identifier,
    /// Identifying in combination with other attributes (age, ZIP)
    QuasiIdentifier,
    /// The attribute an attacker wants to learn (diagnosis)
    Sensitive,
    /// Neither identifying nor sensitive
    Insensitive,
}

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Categorical,
    Numeric,
    Date,
}

impl AttributeType {
    /// Natural ordering exists (used by earth-mover distance)
    pub fn is_ordered(&self) -> bool {
        matches!(self, AttributeType::Numeric | AttributeType::Date)
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeType::Numeric, Value::Number(n)) => n.is_finite(),
            (AttributeType::Date, Value::Date(_)) => true,
            (AttributeType::Categorical, Value::Text(_)) => true,
            (AttributeType::Categorical, Value::Number(n)) => n.is_finite(),
            _ => false,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Categorical => f.write_str("categorical"),
            AttributeType::Numeric => f.write_str("numeric"),
            AttributeType::Date => f.write_str("date"),
        }
    }
}

/// One column of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub role: AttributeRole,
    pub kind: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, role: AttributeRole, kind: AttributeType) -> Self {
        Attribute {
            name: name.into(),
            role,
            kind,
        }
    }
}

/// Tabular dataset with a validated schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    schema: Vec<Attribute>,
    rows: Vec<Vec<Value>>,
    /// Source row of each row, present once rows have been dropped
    lineage: Option<Vec<usize>>,
    /// Rows whose quasi-identifiers were redacted by suppression
    suppressed: Vec<bool>,
}

impl Dataset {
    /// Build a dataset from rows given in schema order
    pub fn new(schema: Vec<Attribute>, rows: Vec<Vec<Value>>) -> Result<Self, ConfigError> {
        validate_schema(&schema)?;
        if rows.is_empty() {
            return Err(ConfigError::InvalidDataset(
                "dataset must contain at least one record".to_string(),
            ));
        }
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(ConfigError::InvalidDataset(format!(
                    "record {} has {} values, schema has {} attributes",
                    row_idx,
                    row.len(),
                    schema.len()
                )));
            }
            for (attr, value) in schema.iter().zip(row) {
                if !attr.kind.accepts(value) {
                    return Err(ConfigError::TypeMismatch {
                        attribute: attr.name.clone(),
                        expected: attr.kind.to_string(),
                        found: format!("{} ({})", value, value.type_name()),
                        row: row_idx,
                    });
                }
            }
        }

        let suppressed = vec![false; rows.len()];
        Ok(Dataset {
            schema,
            rows,
            lineage: None,
            suppressed,
        })
    }

    /// Build a dataset from name → value records
    ///
    /// Every record must name exactly the schema's attributes.
    pub fn from_records(
        schema: Vec<Attribute>,
        records: Vec<BTreeMap<String, Value>>,
    ) -> Result<Self, ConfigError> {
        validate_schema(&schema)?;
        let mut rows = Vec::with_capacity(records.len());
        for (row_idx, mut record) in records.into_iter().enumerate() {
            let mut row = Vec::with_capacity(schema.len());
            for attr in &schema {
                let value = record.remove(&attr.name).ok_or_else(|| {
                    ConfigError::InvalidDataset(format!(
                        "record {} has no value for '{}'",
                        row_idx, attr.name
                    ))
                })?;
                row.push(value);
            }
            if let Some(extra) = record.keys().next() {
                return Err(ConfigError::UnknownAttribute(extra.clone()));
            }
            rows.push(row);
        }
        Dataset::new(schema, rows)
    }

    /// Assemble a transformed dataset; callers uphold the shape invariants
    pub(crate) fn derived(
        schema: Vec<Attribute>,
        rows: Vec<Vec<Value>>,
        lineage: Option<Vec<usize>>,
        suppressed: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(rows.len(), suppressed.len());
        Dataset {
            schema,
            rows,
            lineage,
            suppressed,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn schema(&self) -> &[Attribute] {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Value at (row, column index)
    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.rows[row][column]
    }

    /// Position of an attribute in the schema
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|a| a.name == name)
    }

    /// Position of an attribute, or a configuration error naming it
    pub fn require(&self, name: &str) -> Result<usize, ConfigError> {
        self.index_of(name)
            .ok_or_else(|| ConfigError::UnknownAttribute(name.to_string()))
    }

    pub fn attribute(&self, index: usize) -> &Attribute {
        &self.schema[index]
    }

    /// All values of one column, in row order
    pub fn column(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| &r[index])
    }

    /// Names of the attributes carrying a role
    pub fn attributes_with_role(&self, role: AttributeRole) -> Vec<&str> {
        self.schema
            .iter()
            .filter(|a| a.role == role)
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn quasi_identifiers(&self) -> Vec<&str> {
        self.attributes_with_role(AttributeRole::QuasiIdentifier)
    }

    pub fn sensitive_attributes(&self) -> Vec<&str> {
        self.attributes_with_role(AttributeRole::Sensitive)
    }

    /// Names of numeric attributes that are not direct identifiers
    pub fn numeric_attributes(&self) -> Vec<&str> {
        self.schema
            .iter()
            .filter(|a| a.kind == AttributeType::Numeric && a.role != AttributeRole::Identifier)
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Source row index of each row (identity for untransformed data)
    pub fn lineage(&self) -> Option<&[usize]> {
        self.lineage.as_deref()
    }

    pub fn source_row(&self, row: usize) -> usize {
        match &self.lineage {
            Some(lineage) => lineage[row],
            None => row,
        }
    }

    pub fn is_suppressed(&self, row: usize) -> bool {
        self.suppressed[row]
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed.iter().filter(|s| **s).count()
    }

    /// Indices of rows that were not suppressed
    pub fn retained_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.suppressed
            .iter()
            .enumerate()
            .filter(|(_, s)| !**s)
            .map(|(i, _)| i)
    }

    /// New dataset holding the given rows (in the given order)
    pub(crate) fn select_rows(&self, indices: &[usize]) -> Dataset {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        let lineage = Some(indices.iter().map(|&i| self.source_row(i)).collect());
        let suppressed = indices.iter().map(|&i| self.suppressed[i]).collect();
        Dataset::derived(self.schema.clone(), rows, lineage, suppressed)
    }
}

fn validate_schema(schema: &[Attribute]) -> Result<(), ConfigError> {
    if schema.is_empty() {
        return Err(ConfigError::InvalidDataset(
            "schema must contain at least one attribute".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for attr in schema {
        if attr.name.is_empty() {
            return Err(ConfigError::InvalidDataset(
                "attribute names must not be empty".to_string(),
            ));
        }
        if !seen.insert(attr.name.as_str()) {
            return Err(ConfigError::DuplicateAttribute(attr.name.clone()));
        }
    }
    Ok(())
}
