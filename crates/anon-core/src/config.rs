//! Privacy technique configuration
//!
//! One variant per technique, tagged by `technique` in JSON:
//!
//! ```json
//! { "technique": "k_anonymity", "quasi_identifiers": ["age", "zip"], "k": 5 }
//! { "technique": "l_diversity",
//!   "k_anonymity": { "quasi_identifiers": ["age"], "k": 3 },
//!   "diversity": { "sensitive_attribute": "diagnosis", "l": 2 } }
//! { "technique": "differential_privacy", "epsilon": 1.0, "sensitivity": 10.0,
//!   "mechanism": { "gaussian": { "delta": 1e-6 } } }
//! ```

use crate::diversity::{LDiversityConfig, TClosenessConfig};
use crate::dp::DifferentialPrivacyConfig;
use crate::error::{ConfigError, Result};
use crate::generalize::KAnonymityConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum PrivacyConfig {
    KAnonymity(KAnonymityConfig),
    LDiversity {
        k_anonymity: KAnonymityConfig,
        diversity: LDiversityConfig,
    },
    TCloseness {
        k_anonymity: KAnonymityConfig,
        closeness: TClosenessConfig,
    },
    DifferentialPrivacy(DifferentialPrivacyConfig),
}

impl PrivacyConfig {
    /// Parse a JSON configuration
    ///
    /// Unknown techniques, mechanisms, distances or methods and missing
    /// fields are reported as [`ConfigError::Malformed`].
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> std::result::Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn technique(&self) -> &'static str {
        match self {
            PrivacyConfig::KAnonymity(_) => "k_anonymity",
            PrivacyConfig::LDiversity { .. } => "l_diversity",
            PrivacyConfig::TCloseness { .. } => "t_closeness",
            PrivacyConfig::DifferentialPrivacy(_) => "differential_privacy",
        }
    }

    /// Check every parameter that does not depend on the dataset
    pub fn validate(&self) -> Result<()> {
        match self {
            PrivacyConfig::KAnonymity(k) => k.validate(),
            PrivacyConfig::LDiversity { k_anonymity, diversity } => {
                k_anonymity.validate()?;
                diversity.validate()
            }
            PrivacyConfig::TCloseness { k_anonymity, closeness } => {
                k_anonymity.validate()?;
                closeness.validate()
            }
            PrivacyConfig::DifferentialPrivacy(dp) => Ok(dp.validate()?),
        }
    }
}

impl From<KAnonymityConfig> for PrivacyConfig {
    fn from(config: KAnonymityConfig) -> Self {
        PrivacyConfig::KAnonymity(config)
    }
}

impl From<DifferentialPrivacyConfig> for PrivacyConfig {
    fn from(config: DifferentialPrivacyConfig) -> Self {
        PrivacyConfig::DifferentialPrivacy(config)
    }
}
