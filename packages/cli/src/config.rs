//! TOML analysis configuration.

use std::path::Path;

use crime_stats_analytics::{MoranOptions, PermutationOptions};
use crime_stats_analytics_models::{Alternative, MomentAssumption};
use crime_stats_area_models::DatasetSchema;
use crime_stats_spatial::{Contiguity, ContiguityOptions, IslandPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading the analysis configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`AnalysisConfig`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}

/// Full analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Which feature properties hold the id, outcome and covariates.
    pub dataset: DatasetSchema,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub moran: MoranConfig,
}

/// `[weights]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default)]
    pub contiguity: Contiguity,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub islands: IslandPolicy,
}

/// `[moran]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoranConfig {
    #[serde(default)]
    pub alternative: Alternative,
    /// Null used for the analytic moments.
    #[serde(default)]
    pub null: MomentAssumption,
    /// Permutation draws; `0` skips the permutation test.
    #[serde(default = "default_permutations")]
    pub permutations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_significance")]
    pub significance: f64,
}

const fn default_permutations() -> usize {
    999
}

const fn default_seed() -> u64 {
    42
}

const fn default_significance() -> f64 {
    0.05
}

impl Default for MoranConfig {
    fn default() -> Self {
        Self {
            alternative: Alternative::default(),
            null: MomentAssumption::default(),
            permutations: default_permutations(),
            seed: default_seed(),
            significance: default_significance(),
        }
    }
}

impl AnalysisConfig {
    /// Loads `path`, or the embedded default when `path` is `None`.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if the file cannot be read
    /// * [`ConfigError::Toml`] if it does not parse
    /// * [`ConfigError::Invalid`] if a value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let contents = match path {
            Some(path) => {
                log::info!("Loading analysis config from {}", path.display());
                std::fs::read_to_string(path)?
            }
            None => DEFAULT_CONFIG.to_string(),
        };
        Self::parse(&contents)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`], minus IO.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let significance = self.moran.significance;
        if !(significance > 0.0 && significance < 1.0) {
            return Err(ConfigError::Invalid {
                message: format!("moran.significance must be in (0, 1), got {significance}"),
            });
        }
        if let Some(precision) = self.weights.precision {
            if !(precision.is_finite() && precision > 0.0) {
                return Err(ConfigError::Invalid {
                    message: format!("weights.precision must be positive, got {precision}"),
                });
            }
        }
        if self.dataset.outcome.is_empty() {
            return Err(ConfigError::Invalid {
                message: "dataset.outcome must name a property".to_string(),
            });
        }
        Ok(())
    }

    /// Options for the contiguity builder.
    #[must_use]
    pub const fn contiguity_options(&self) -> ContiguityOptions {
        ContiguityOptions {
            rule: self.weights.contiguity,
            precision: self.weights.precision,
        }
    }

    /// Options for the analytic Moran tests.
    #[must_use]
    pub const fn moran_options(&self) -> MoranOptions {
        MoranOptions {
            alternative: self.moran.alternative,
            assumption: self.moran.null,
            significance: self.moran.significance,
        }
    }

    /// Options for the permutation test, `None` when disabled.
    #[must_use]
    pub const fn permutation_options(&self) -> Option<PermutationOptions> {
        if self.moran.permutations == 0 {
            return None;
        }
        Some(PermutationOptions {
            permutations: self.moran.permutations,
            seed: self.moran.seed,
            alternative: self.moran.alternative,
            significance: self.moran.significance,
        })
    }
}
