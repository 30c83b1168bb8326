//! Anon Core - Tabular Anonymization Engine
//!
//! Measures re-identification risk in tabular data and transforms it so the
//! risk is bounded while as much analytical value as possible survives.
//!
//! # Features
//!
//! - Risk assessment under prosecutor, journalist and marketer attacker models
//! - k-anonymity by hierarchy-based generalization and record suppression,
//!   or by MDAV microaggregation
//! - l-diversity (distinct, entropy or recursive) and t-closeness
//!   (variational, KL, EMD)
//! - Laplace and Gaussian differential privacy with budget accounting
//! - Utility measurement between original and transformed data
//! - Cooperative cancellation of long-running transforms
//!
//! Every operation is a pure function of its inputs: datasets are never
//! modified in place and there is no global state, so independent calls may
//! run concurrently on different threads.
//!
//! # Example
//!
//! ```rust
//! use anon_core::{apply, assess, evaluate, Attribute, AttributeRole, AttributeType};
//! use anon_core::{CancellationToken, Dataset, HierarchySet, PrivacyConfig, RiskConfig};
//! use anon_core::{UtilityMetric, Value};
//!
//! let schema = vec![
//!     Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
//!     Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
//!     Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
//! ];
//! let rows = (0..40)
//!     .map(|i| {
//!         vec![
//!             Value::from(25 + (i * 7) % 30),
//!             Value::from(format!("9410{}", i % 5)),
//!             Value::from(["flu", "asthma", "migraine"][i as usize % 3]),
//!         ]
//!     })
//!     .collect();
//! let dataset = Dataset::new(schema, rows).unwrap();
//!
//! let risk = assess(&dataset, &RiskConfig::for_dataset(&dataset)).unwrap();
//! assert!(risk.unique_records > 0);
//!
//! let hierarchies = HierarchySet::inferred(&dataset);
//! let config = PrivacyConfig::from_json(
//!     r#"{"technique": "k_anonymity", "quasi_identifiers": ["age", "zip"], "k": 5}"#,
//! )
//! .unwrap();
//! let result = apply(&config, &dataset, &hierarchies, &CancellationToken::new())
//!     .unwrap()
//!     .completed()
//!     .unwrap();
//!
//! let after = assess(&result.dataset, &RiskConfig::for_dataset(&result.dataset)).unwrap();
//! assert!(after.min_class_size >= 5);
//!
//! let utility = evaluate(&dataset, &result.dataset, &UtilityMetric::standard()).unwrap();
//! println!("overall utility {:.2} ({:?})", utility.overall_utility, utility.utility_level);
//! ```

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod diversity;
pub mod dp;
pub mod equivalence;
pub mod error;
pub mod generalize;
pub mod hierarchy;
pub mod microaggregation;
pub mod pipeline;
pub mod risk;
pub mod utility;

// Re-export commonly used types for convenience
pub use cancel::{CancellationToken, Outcome};
pub use config::PrivacyConfig;
pub use dataset::{Attribute, AttributeRole, AttributeType, Dataset, Value, ValueKey, SUPPRESSED};
pub use diversity::{
    enforce_l_diversity, enforce_t_closeness, ClosenessReport, DistanceMeasure, DiversityMethod,
    DiversityReport, LDiversityConfig, TClosenessConfig,
};
pub use dp::{apply_differential_privacy, DifferentialPrivacyConfig, NoiseMechanism, NoiseReport};
pub use equivalence::{partition, ClassVerdict, EquivalenceClass};
pub use error::{AnonError, BestEffort, ConfigError, PrivacyCriterion, Result};
pub use generalize::{generalize, GeneralizationReport, KAnonymityConfig, Recoding, SuppressionMode};
pub use hierarchy::{Hierarchy, HierarchyKind, HierarchySet};
pub use pipeline::{apply, TransformReport, Transformation};
pub use risk::{assess, AttackerModel, RiskConfig, RiskLevel, RiskReport};
pub use utility::{evaluate, UtilityLevel, UtilityMetric, UtilityReport};
