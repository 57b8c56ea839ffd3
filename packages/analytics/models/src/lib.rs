#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for the spatial statistics.
//!
//! Every statistic returns a typed, serializable result that carries both
//! the raw numbers and their interpretation, so the CLI can print them or
//! emit them as JSON without recomputing anything.

pub mod progress;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Alternative hypothesis for a z-based test.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Alternative {
    /// Positive autocorrelation (clustering).
    Greater,
    /// Negative autocorrelation (dispersion).
    Less,
    /// Either direction.
    #[default]
    TwoSided,
}

/// Assumption used for the analytic moments of Moran's I.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MomentAssumption {
    /// Values are a random permutation of the observed values
    /// (kurtosis-corrected variance).
    #[default]
    Randomisation,
    /// Values are independent draws from a normal distribution.
    Normality,
}

/// What a Moran statistic says about the spatial pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Autocorrelation {
    /// Similar values sit next to each other (I towards +1).
    Clustered,
    /// Neighbouring values differ systematically (I towards −1).
    Dispersed,
    /// No pattern distinguishable from spatial randomness (I near E[I]).
    NoPattern,
}

impl Autocorrelation {
    /// Classifies a statistic against its null expectation.
    ///
    /// Anything that is not significant at `significance` is
    /// [`Self::NoPattern`], whatever its sign.
    #[must_use]
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn classify(statistic: f64, expectation: f64, p_value: f64, significance: f64) -> Self {
        if !(p_value < significance) {
            Self::NoPattern
        } else if statistic > expectation {
            Self::Clustered
        } else {
            Self::Dispersed
        }
    }

    /// One-line reading for reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Clustered => {
                "significant positive spatial autocorrelation: similar values cluster"
            }
            Self::Dispersed => "significant negative spatial autocorrelation: neighbours differ",
            Self::NoPattern => "no significant spatial autocorrelation",
        }
    }
}

/// Global Moran's I under an analytic null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoranTest {
    /// Name of the tested variable.
    pub variable: String,
    /// Moran's I.
    pub statistic: f64,
    /// `E[I]` under the null.
    pub expectation: f64,
    /// `Var[I]` under the null.
    pub variance: f64,
    /// Standardized deviate `(I − E[I]) / sqrt(Var[I])`.
    pub z_score: f64,
    /// p-value for `alternative`.
    pub p_value: f64,
    /// Alternative hypothesis.
    pub alternative: Alternative,
    /// Moment assumption.
    pub assumption: MomentAssumption,
    /// Number of units used (islands excluded).
    pub n: usize,
    /// Reading of the result.
    pub interpretation: Autocorrelation,
}

/// Global Moran's I against a permutation null.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoranPermutationTest {
    /// Name of the tested variable.
    pub variable: String,
    /// Observed Moran's I.
    pub statistic: f64,
    /// Number of permutations drawn.
    pub permutations: usize,
    /// RNG seed used for the draws.
    pub seed: u64,
    /// Mean of the simulated statistics.
    pub simulated_mean: f64,
    /// Variance of the simulated statistics.
    pub simulated_variance: f64,
    /// Observed statistic standardized by the simulated moments.
    pub z_score: f64,
    /// Pseudo p-value `(count + 1) / (permutations + 1)`.
    pub p_value: f64,
    /// Alternative hypothesis.
    pub alternative: Alternative,
    /// Reading of the result.
    pub interpretation: Autocorrelation,
}

/// Moran's I of regression residuals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualMoranTest {
    /// Moran's I of the residuals.
    pub statistic: f64,
    /// `E[I]` accounting for the design matrix.
    pub expectation: f64,
    /// `Var[I]` accounting for the design matrix.
    pub variance: f64,
    /// Standardized deviate.
    pub z_score: f64,
    /// p-value for `alternative`.
    pub p_value: f64,
    /// Alternative hypothesis.
    pub alternative: Alternative,
    /// Reading of the result.
    pub interpretation: Autocorrelation,
}

/// Which Lagrange Multiplier statistic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum LmTestKind {
    /// Spatial error dependence.
    #[strum(serialize = "LMerr")]
    #[serde(rename = "LMerr")]
    LmErr,
    /// Spatial lag dependence.
    #[strum(serialize = "LMlag")]
    #[serde(rename = "LMlag")]
    LmLag,
    /// Error dependence robust to a lag.
    #[strum(serialize = "RLMerr")]
    #[serde(rename = "RLMerr")]
    RlmErr,
    /// Lag dependence robust to an error process.
    #[strum(serialize = "RLMlag")]
    #[serde(rename = "RLMlag")]
    RlmLag,
    /// Joint lag and error (SARMA).
    #[strum(serialize = "SARMA")]
    #[serde(rename = "SARMA")]
    Sarma,
}

/// One Lagrange Multiplier statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LmTest {
    /// Which statistic.
    pub kind: LmTestKind,
    /// Test statistic.
    pub statistic: f64,
    /// Chi-squared degrees of freedom.
    pub df: u8,
    /// Upper-tail chi-squared p-value.
    pub p_value: f64,
}

/// Advisory model choice derived from the LM tests. Never enforced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpecificationAdvice {
    /// LMlag and RLMlag significant, RLMerr not.
    SpatialLag,
    /// LMerr and RLMerr significant, RLMlag not.
    SpatialError,
    /// Both robust tests significant.
    SpatialLagAndError,
    /// Neither simple test significant.
    NoSpatialDependence,
    /// Simple tests significant but the robust tests do not discriminate.
    Inconclusive,
}

impl SpecificationAdvice {
    /// Applies the robust-test decision rule at `significance`.
    ///
    /// Missing tests count as not significant.
    #[must_use]
    pub fn from_tests(tests: &[LmTest], significance: f64) -> Self {
        let significant = |kind: LmTestKind| {
            tests
                .iter()
                .find(|t| t.kind == kind)
                .is_some_and(|t| t.p_value < significance)
        };
        let lag = significant(LmTestKind::LmLag);
        let err = significant(LmTestKind::LmErr);
        let robust_lag = significant(LmTestKind::RlmLag);
        let robust_err = significant(LmTestKind::RlmErr);

        if !lag && !err {
            Self::NoSpatialDependence
        } else if lag && robust_lag && !robust_err {
            Self::SpatialLag
        } else if err && robust_err && !robust_lag {
            Self::SpatialError
        } else if robust_lag && robust_err {
            Self::SpatialLagAndError
        } else {
            Self::Inconclusive
        }
    }

    /// One-line reading for reports.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::SpatialLag => "prefer a spatial lag specification",
            Self::SpatialError => "prefer a spatial error specification",
            Self::SpatialLagAndError => "both lag and error dependence remain; consider SARMA",
            Self::NoSpatialDependence => "OLS residuals show no spatial dependence",
            Self::Inconclusive => "robust tests do not discriminate between lag and error",
        }
    }
}

/// The full Lagrange Multiplier diagnostic set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LmDiagnostics {
    /// LMerr, LMlag, RLMerr, RLMlag, SARMA in that order, minus any in
    /// `undefined`.
    pub tests: Vec<LmTest>,
    /// Statistics left out because their denominator vanishes (the lag of
    /// the fitted values lies in the span of the design).
    pub undefined: Vec<LmTestKind>,
    /// Significance level the advice was derived at.
    pub significance: f64,
    /// Advisory specification choice.
    pub advice: SpecificationAdvice,
}

impl LmDiagnostics {
    /// Looks up one statistic.
    #[must_use]
    pub fn test(&self, kind: LmTestKind) -> Option<&LmTest> {
        self.tests.iter().find(|t| t.kind == kind)
    }
}

/// LISA cluster type of a unit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClusterQuadrant {
    /// High value among high neighbours.
    HighHigh,
    /// Low value among low neighbours.
    LowLow,
    /// High value among low neighbours.
    HighLow,
    /// Low value among high neighbours.
    LowHigh,
    /// Not significant, or an island.
    NotSignificant,
}

/// Local Moran's I for one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMoran {
    /// Unit identifier.
    pub id: String,
    /// Local statistic `Iᵢ`.
    pub statistic: f64,
    /// `E[Iᵢ]` under randomisation.
    pub expectation: f64,
    /// `Var[Iᵢ]` under randomisation.
    pub variance: f64,
    /// Standardized deviate; `None` for islands.
    pub z_score: Option<f64>,
    /// Two-sided p-value; `None` for islands.
    pub p_value: Option<f64>,
    /// Cluster classification.
    pub quadrant: ClusterQuadrant,
}

/// Number of units in one cluster quadrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantCount {
    /// Quadrant.
    pub quadrant: ClusterQuadrant,
    /// Units classified into it.
    pub count: usize,
}

/// Local Moran's I for every unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMoranResult {
    /// Name of the tested variable.
    pub variable: String,
    /// Significance level used for the quadrants.
    pub significance: f64,
    /// Per-unit results in input order.
    pub units: Vec<LocalMoran>,
    /// Units per quadrant.
    pub quadrant_counts: Vec<QuadrantCount>,
}

/// Descriptive statistics of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSummary {
    /// Variable name.
    pub name: String,
    /// Number of values.
    pub n: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Minimum.
    pub min: f64,
    /// First quartile.
    pub q1: f64,
    /// Median.
    pub median: f64,
    /// Third quartile.
    pub q3: f64,
    /// Maximum.
    pub max: f64,
}

/// Pearson correlation with a t test of `r = 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationTest {
    /// First variable.
    pub x: String,
    /// Second variable.
    pub y: String,
    /// Number of pairs.
    pub n: usize,
    /// Pearson's r.
    pub r: f64,
    /// t statistic on `n − 2` degrees of freedom.
    pub t_statistic: f64,
    /// Degrees of freedom.
    pub df: usize,
    /// Two-sided p-value.
    pub p_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(kind: LmTestKind, p_value: f64) -> LmTest {
        LmTest {
            kind,
            statistic: 0.0,
            df: 1,
            p_value,
        }
    }

    fn tests(lag: f64, err: f64, rlag: f64, rerr: f64) -> Vec<LmTest> {
        vec![
            lm(LmTestKind::LmErr, err),
            lm(LmTestKind::LmLag, lag),
            lm(LmTestKind::RlmErr, rerr),
            lm(LmTestKind::RlmLag, rlag),
        ]
    }

    #[test]
    fn advice_follows_robust_tests() {
        assert_eq!(
            SpecificationAdvice::from_tests(&tests(0.001, 0.01, 0.002, 0.4), 0.05),
            SpecificationAdvice::SpatialLag
        );
        assert_eq!(
            SpecificationAdvice::from_tests(&tests(0.01, 0.001, 0.6, 0.003), 0.05),
            SpecificationAdvice::SpatialError
        );
        assert_eq!(
            SpecificationAdvice::from_tests(&tests(0.3, 0.2, 0.01, 0.01), 0.05),
            SpecificationAdvice::NoSpatialDependence
        );
        assert_eq!(
            SpecificationAdvice::from_tests(&tests(0.01, 0.01, 0.01, 0.01), 0.05),
            SpecificationAdvice::SpatialLagAndError
        );
        assert_eq!(
            SpecificationAdvice::from_tests(&tests(0.01, 0.01, 0.5, 0.5), 0.05),
            SpecificationAdvice::Inconclusive
        );
    }

    #[test]
    fn classify_requires_significance() {
        assert_eq!(Autocorrelation::classify(0.6, -0.1, 0.001, 0.05), Autocorrelation::Clustered);
        assert_eq!(Autocorrelation::classify(-0.6, -0.1, 0.001, 0.05), Autocorrelation::Dispersed);
        assert_eq!(Autocorrelation::classify(0.6, -0.1, 0.2, 0.05), Autocorrelation::NoPattern);
        assert_eq!(
            Autocorrelation::classify(0.6, -0.1, f64::NAN, 0.05),
            Autocorrelation::NoPattern
        );
    }

    #[test]
    fn lm_kinds_use_conventional_labels() {
        assert_eq!(LmTestKind::RlmLag.to_string(), "RLMlag");
        assert_eq!("SARMA".parse::<LmTestKind>().unwrap(), LmTestKind::Sarma);
    }

    #[test]
    fn alternative_defaults_to_two_sided() {
        assert_eq!(Alternative::default(), Alternative::TwoSided);
        assert_eq!("greater".parse::<Alternative>().unwrap(), Alternative::Greater);
    }
}
