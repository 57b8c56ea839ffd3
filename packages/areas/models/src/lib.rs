#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Areal unit dataset schema types.
//!
//! Describes which `GeoJSON` feature properties hold the unit identifier,
//! the burglary outcome, and the socio-demographic covariates. The schema
//! is a contract with the upstream data-preparation step; this crate only
//! names the fields, it never defines them.

use serde::{Deserialize, Serialize};

/// Field mapping for an areal crime dataset, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Property holding the unique unit identifier (e.g. `"lsoa_code"`).
    ///
    /// When absent from a feature, the feature-level `id` member is used.
    pub id_field: String,
    /// Property holding the outcome rate (e.g. `"burglary_rate"`).
    pub outcome: String,
    /// Property holding the raw outcome count, if the dataset carries one.
    #[serde(default)]
    pub count_field: Option<String>,
    /// Explanatory covariates, in model column order.
    pub covariates: Vec<String>,
}

impl DatasetSchema {
    /// Every numeric field a unit must carry: outcome, count, covariates.
    #[must_use]
    pub fn numeric_fields(&self) -> Vec<&str> {
        std::iter::once(self.outcome.as_str())
            .chain(self.count_field.as_deref())
            .chain(self.covariates.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_without_count_field() {
        let schema: DatasetSchema = toml::de::from_str(
            r#"
            id_field = "lsoa_code"
            outcome = "burglary_rate"
            covariates = ["imd_score", "pct_students"]
            "#,
        )
        .unwrap();

        assert_eq!(schema.count_field, None);
        assert_eq!(schema.covariates.len(), 2);
    }

    #[test]
    fn numeric_fields_lists_outcome_first() {
        let schema = DatasetSchema {
            id_field: "id".to_string(),
            outcome: "rate".to_string(),
            count_field: Some("count".to_string()),
            covariates: vec!["a".to_string(), "b".to_string()],
        };

        assert_eq!(schema.numeric_fields(), vec!["rate", "count", "a", "b"]);
    }
}
