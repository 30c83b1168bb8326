//! Error types for the anonymization engine
//!
//! Every failure is detected locally and returned with enough context
//! (attribute, offending value, generalization level) for the caller to
//! adjust parameters. Cancellation is not an error; see [`crate::Outcome`].

use crate::equivalence::ClassVerdict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AnonError>;

/// Top-level error for all engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnonError {
    /// Invalid configuration or input, caught before any computation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The privacy criterion cannot be met within hierarchy height and suppression limit
    #[error("{0}")]
    Unattainable(Box<BestEffort>),

    /// Utility evaluation could not align original and transformed rows
    #[error("shape mismatch: original has {original_rows} rows, transformed has {transformed_rows}: {reason}")]
    ShapeMismatch {
        original_rows: usize,
        transformed_rows: usize,
        reason: String,
    },

    /// Noise generation produced a non-finite scale or value
    #[error("numeric domain error on '{attribute}': {reason} (value {value})")]
    NumericDomain {
        attribute: String,
        value: f64,
        reason: String,
    },
}

impl AnonError {
    /// Shorthand for an invalid scalar parameter
    pub(crate) fn invalid(name: &'static str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        AnonError::Config(ConfigError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        })
    }

    /// True for configuration errors
    pub fn is_config(&self) -> bool {
        matches!(self, AnonError::Config(_))
    }

    /// The best-effort report when the error is an unattainable criterion
    pub fn best_effort(&self) -> Option<&BestEffort> {
        match self {
            AnonError::Unattainable(best) => Some(best),
            _ => None,
        }
    }
}

/// Configuration and input validation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("at least one quasi-identifier is required")]
    EmptyQuasiIdentifiers,

    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("attribute '{0}' is not in the schema")]
    UnknownAttribute(String),

    #[error("attribute '{0}' is listed more than once")]
    DuplicateAttribute(String),

    #[error("unknown {kind} '{value}'")]
    UnknownName { kind: &'static str, value: String },

    #[error("no generalization hierarchy registered for '{0}'")]
    MissingHierarchy(String),

    #[error("invalid hierarchy for '{attribute}': {reason}")]
    InvalidHierarchy { attribute: String, reason: String },

    #[error("value '{value}' of '{attribute}' has no path in its hierarchy (level {level})")]
    UnknownHierarchyValue {
        attribute: String,
        value: String,
        level: usize,
    },

    #[error("attribute '{attribute}' expects {expected} values, found '{found}' in row {row}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        found: String,
        row: usize,
    },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// The privacy criterion that could not be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrivacyCriterion {
    KAnonymity { k: usize },
    LDiversity { l: usize },
    TCloseness { t: f64 },
}

impl fmt::Display for PrivacyCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyCriterion::KAnonymity { k } => write!(f, "{}-anonymity", k),
            PrivacyCriterion::LDiversity { l } => write!(f, "{}-diversity", l),
            PrivacyCriterion::TCloseness { t } => write!(f, "{}-closeness", t),
        }
    }
}

/// Best-effort state attached to an unattainable-privacy error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestEffort {
    /// Criterion that failed
    pub criterion: PrivacyCriterion,
    /// Generalization level reached per quasi-identifier
    pub levels: BTreeMap<String, usize>,
    /// Classes still violating the criterion at those levels
    pub violating_classes: Vec<ClassVerdict>,
    /// Records in violating classes
    pub violating_records: usize,
    /// Records the suppression limit would have allowed
    pub suppression_allowed: usize,
}

impl fmt::Display for BestEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unattainable: {} records in {} violating classes at levels {:?}, suppression limit allows {}",
            self.criterion,
            self.violating_records,
            self.violating_classes.len(),
            self.levels,
            self.suppression_allowed
        )
    }
}
