//! Single entry point dispatching a [`PrivacyConfig`] to its technique

use crate::cancel::{CancellationToken, Outcome};
use crate::config::PrivacyConfig;
use crate::dataset::Dataset;
use crate::diversity::{enforce_l_diversity, enforce_t_closeness, ClosenessReport, DiversityReport};
use crate::dp::{apply_differential_privacy, NoiseReport};
use crate::error::Result;
use crate::generalize::{generalize, GeneralizationReport};
use crate::hierarchy::HierarchySet;
use crate::utility::{evaluate, UtilityMetric, UtilityReport};
use serde::Serialize;
use tracing::info;

/// Technique-specific report of a transformation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum TransformReport {
    KAnonymity(GeneralizationReport),
    LDiversity {
        k_anonymity: GeneralizationReport,
        diversity: DiversityReport,
    },
    TCloseness {
        k_anonymity: GeneralizationReport,
        closeness: ClosenessReport,
    },
    DifferentialPrivacy(NoiseReport),
}

/// Transformed dataset and the report of how it was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transformation {
    pub dataset: Dataset,
    pub report: TransformReport,
}

impl Transformation {
    /// Score the transformed dataset against the `original` it came from
    pub fn evaluate(&self, original: &Dataset, metrics: &[UtilityMetric]) -> Result<UtilityReport> {
        evaluate(original, &self.dataset, metrics)
    }
}

/// Apply the configured technique to `dataset`
///
/// The configuration is validated before any work starts. l-diversity and
/// t-closeness first reach k-anonymity, then continue from the levels it
/// found. Hierarchies are only consulted by the generalization techniques.
///
/// # Example
///
/// ```
/// use anon_core::{apply, Attribute, AttributeRole, AttributeType, CancellationToken, Dataset};
/// use anon_core::{Hierarchy, HierarchySet, PrivacyConfig, TransformReport, Value};
///
/// let schema = vec![
///     Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
///     Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
/// ];
/// let rows = (0..20)
///     .map(|i| vec![Value::from(30 + i % 10), Value::from(["flu", "cold"][i as usize % 2])])
///     .collect();
/// let dataset = Dataset::new(schema, rows).unwrap();
/// let hierarchies = HierarchySet::new().with(Hierarchy::numeric_bands("age", vec![5.0, 10.0]).unwrap());
///
/// let config = PrivacyConfig::from_json(r#"{"technique": "k_anonymity", "quasi_identifiers": ["age"], "k": 4}"#).unwrap();
/// let result = apply(&config, &dataset, &hierarchies, &CancellationToken::new())
///     .unwrap()
///     .completed()
///     .unwrap();
/// let TransformReport::KAnonymity(report) = &result.report else { unreachable!() };
/// assert!(report.classes.iter().all(|c| c.size >= 4));
/// ```
pub fn apply(
    config: &PrivacyConfig,
    dataset: &Dataset,
    hierarchies: &HierarchySet,
    cancel: &CancellationToken,
) -> Result<Outcome<Transformation>> {
    config.validate()?;
    info!(technique = config.technique(), records = dataset.len(), "applying privacy technique");

    let outcome = match config {
        PrivacyConfig::KAnonymity(k) => generalize(dataset, k, hierarchies, cancel)?.map(|(dataset, report)| {
            Transformation {
                dataset,
                report: TransformReport::KAnonymity(report),
            }
        }),
        PrivacyConfig::LDiversity { k_anonymity, diversity } => {
            let Outcome::Completed((_, prior)) = generalize(dataset, k_anonymity, hierarchies, cancel)? else {
                return Ok(Outcome::Cancelled);
            };
            enforce_l_diversity(dataset, hierarchies, &prior, diversity, cancel)?.map(|(dataset, report)| {
                Transformation {
                    dataset,
                    report: TransformReport::LDiversity {
                        k_anonymity: prior,
                        diversity: report,
                    },
                }
            })
        }
        PrivacyConfig::TCloseness { k_anonymity, closeness } => {
            let Outcome::Completed((_, prior)) = generalize(dataset, k_anonymity, hierarchies, cancel)? else {
                return Ok(Outcome::Cancelled);
            };
            enforce_t_closeness(dataset, hierarchies, &prior, closeness, cancel)?.map(|(dataset, report)| {
                Transformation {
                    dataset,
                    report: TransformReport::TCloseness {
                        k_anonymity: prior,
                        closeness: report,
                    },
                }
            })
        }
        PrivacyConfig::DifferentialPrivacy(dp) => {
            apply_differential_privacy(dataset, dp, cancel)?.map(|(dataset, report)| Transformation {
                dataset,
                report: TransformReport::DifferentialPrivacy(report),
            })
        }
    };
    Ok(outcome)
}
