//! Wires loading, contiguity, weights and the statistics together.

use std::path::Path;

use crime_stats_analytics::{
    AnalyticsError, correlation_table, describe, lm_diagnostics, local_moran,
    moran_permutation_test, moran_test, residual_moran_test,
};
use crime_stats_analytics_models::{
    CorrelationTest, LmDiagnostics, LocalMoranResult, MoranPermutationTest, MoranTest,
    ResidualMoranTest, VariableSummary, progress::ProgressCallback,
};
use crime_stats_areas::{AreaCollection, AreaError, load};
use crime_stats_regression::{
    DesignMatrix, RegressionError, RegressionSummary, SlxSummary, fit_ols, fit_slx,
};
use crime_stats_spatial::{
    NeighbourSummary, Neighbours, SpatialError, SpatialWeights, build_contiguity,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::AnalysisConfig;

/// Errors from any stage of an analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Loading or validating the areal units failed.
    #[error("Area error: {0}")]
    Area(#[from] AreaError),

    /// Building neighbours or weights failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Fitting a model failed.
    #[error("Regression error: {0}")]
    Regression(#[from] RegressionError),

    /// Computing a statistic failed.
    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}

/// Neighbours of one unit, by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighbourList {
    pub id: String,
    pub neighbours: Vec<String>,
}

/// A value next to its spatial lag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaggedValue {
    pub id: String,
    pub value: f64,
    pub lag: f64,
}

/// OLS fit plus its spatial diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionDiagnostics {
    pub model: RegressionSummary,
    pub residual_moran: ResidualMoranTest,
    pub lm_tests: LmDiagnostics,
}

/// A loaded dataset with its neighbour relation and weights.
pub struct Analysis {
    config: AnalysisConfig,
    areas: AreaCollection,
    neighbours: Neighbours,
    weights: SpatialWeights,
}

impl Analysis {
    /// Loads `input` and builds neighbours and weights per `config`.
    ///
    /// # Errors
    ///
    /// * [`AnalysisError::Area`] if the file cannot be loaded
    /// * [`AnalysisError::Spatial`] if the weights cannot be built
    pub fn load(input: &Path, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let areas = load::load_file(input, &config.dataset)?;
        Self::new(areas, config)
    }

    /// Builds neighbours and weights for already-loaded units.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Spatial`] if the weights cannot be built
    /// (e.g. islands under the `fail` policy).
    pub fn new(areas: AreaCollection, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let neighbours = build_contiguity(
            &areas.ids(),
            &areas.geometries(),
            &config.contiguity_options(),
        )?;
        let weights = SpatialWeights::row_standardized(&neighbours, config.weights.islands)?;

        Ok(Self {
            config,
            areas,
            neighbours,
            weights,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    #[must_use]
    pub fn units(&self) -> usize {
        self.areas.len()
    }

    /// Counts of the neighbour relation, and optionally every unit's list.
    #[must_use]
    pub fn neighbours(&self, list: bool) -> (NeighbourSummary, Option<Vec<NeighbourList>>) {
        let lists = list.then(|| {
            self.neighbours
                .ids()
                .iter()
                .enumerate()
                .map(|(i, id)| NeighbourList {
                    id: id.clone(),
                    neighbours: self
                        .neighbours
                        .neighbours(i)
                        .iter()
                        .map(|&j| self.neighbours.ids()[j].clone())
                        .collect(),
                })
                .collect()
        });
        (self.neighbours.summary(), lists)
    }

    /// Summaries of the outcome and covariates, and their correlations
    /// with the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or constant.
    pub fn describe(&self) -> Result<(Vec<VariableSummary>, Vec<CorrelationTest>), AnalysisError> {
        let outcome = &self.config.dataset.outcome;
        let y = self.areas.column(outcome)?;
        let covariates = self.covariates()?;

        let mut summaries = vec![describe(outcome, &y)?];
        for (name, values) in &covariates {
            summaries.push(describe(name, values)?);
        }
        let correlations = correlation_table(outcome, &y, &covariates)?;

        Ok((summaries, correlations))
    }

    /// Global Moran's I of `variable`, plus the permutation test when
    /// enabled in the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the statistic is
    /// undefined for it.
    pub fn moran(
        &self,
        variable: &str,
        progress: &dyn ProgressCallback,
    ) -> Result<(MoranTest, Option<MoranPermutationTest>), AnalysisError> {
        let x = self.areas.column(variable)?;
        let analytic = moran_test(variable, &x, &self.weights, &self.config.moran_options())?;
        let permutation = self
            .config
            .permutation_options()
            .map(|options| moran_permutation_test(variable, &x, &self.weights, &options, progress))
            .transpose()?;
        Ok((analytic, permutation))
    }

    /// Local Moran's I of `variable`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or constant.
    pub fn local_moran(&self, variable: &str) -> Result<LocalMoranResult, AnalysisError> {
        let x = self.areas.column(variable)?;
        Ok(local_moran(
            variable,
            &x,
            &self.weights,
            self.config.moran.significance,
        )?)
    }

    /// `Wx` for `variable`, unit by unit.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Area`] if the column is missing.
    pub fn lag(&self, variable: &str) -> Result<Vec<LaggedValue>, AnalysisError> {
        let x = self.areas.column(variable)?;
        let lag = self.weights.lag(&x)?;
        Ok(self
            .weights
            .ids()
            .iter()
            .zip(x.iter().zip(lag))
            .map(|(id, (&value, lag))| LaggedValue {
                id: id.clone(),
                value,
                lag,
            })
            .collect())
    }

    /// OLS of the outcome on the covariates, with residual Moran's I and
    /// the LM tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the design is singular or the diagnostics are
    /// undefined.
    pub fn regress(&self) -> Result<RegressionDiagnostics, AnalysisError> {
        let (y, design) = self.design()?;
        let model = fit_ols(&y, &design)?;
        let residual_moran =
            residual_moran_test(&model, &self.weights, &self.config.moran_options())?;
        let lm_tests = lm_diagnostics(&model, &self.weights, self.config.moran.significance)?;

        Ok(RegressionDiagnostics {
            model: model.summary(),
            residual_moran,
            lm_tests,
        })
    }

    /// SLX fit of the outcome on the covariates and their lags.
    ///
    /// # Errors
    ///
    /// Returns an error if the augmented design is singular.
    pub fn slx(&self) -> Result<SlxSummary, AnalysisError> {
        let (y, design) = self.design()?;
        Ok(fit_slx(&y, &design, &self.weights)?.summary())
    }

    fn covariates(&self) -> Result<Vec<(String, Vec<f64>)>, AnalysisError> {
        self.config
            .dataset
            .covariates
            .iter()
            .map(|name| Ok((name.clone(), self.areas.column(name)?)))
            .collect()
    }

    fn design(&self) -> Result<(Vec<f64>, DesignMatrix), AnalysisError> {
        let y = self.areas.column(&self.config.dataset.outcome)?;
        let design = DesignMatrix::new(y.len(), self.covariates()?, true)?;
        Ok((y, design))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{MoranConfig, WeightsConfig};
    use crime_stats_analytics_models::progress::NullProgress;
    use crime_stats_area_models::DatasetSchema;
    use crime_stats_areas::load::parse_feature_collection;
    use crime_stats_spatial::{Contiguity, IslandPolicy};

    pub fn test_config(contiguity: Contiguity) -> AnalysisConfig {
        AnalysisConfig {
            dataset: DatasetSchema {
                id_field: "code".to_string(),
                outcome: "rate".to_string(),
                count_field: None,
                covariates: vec!["x".to_string()],
            },
            weights: WeightsConfig {
                contiguity,
                precision: None,
                islands: IslandPolicy::ZeroFill,
            },
            moran: MoranConfig {
                permutations: 99,
                ..MoranConfig::default()
            },
        }
    }

    /// A `side x side` lattice of unit squares. The rate is high on the
    /// left half and follows `x` with a small deterministic wobble.
    pub fn grid_geojson(side: usize) -> String {
        let features: Vec<String> = (0..side * side)
            .map(|i| {
                let (r, c) = (i / side, i % side);
                let x = ((i * 7) % 5) as f64;
                let left = if c < side / 2 { 3.0 } else { 0.0 };
                let rate = 1.0 + 2.0 * x + left + ((i * 3) % 4) as f64 * 0.1;
                format!(
                    r#"{{"type":"Feature",
                        "properties":{{"code":"c{i}","rate":{rate},"x":{x}}},
                        "geometry":{{"type":"Polygon","coordinates":[[
                            [{c},{r}],[{c1},{r}],[{c1},{r1}],[{c},{r1}],[{c},{r}]
                        ]]}}}}"#,
                    c1 = c + 1,
                    r1 = r + 1,
                )
            })
            .collect();
        format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        )
    }

    pub fn grid_analysis(side: usize, contiguity: Contiguity) -> Analysis {
        let config = test_config(contiguity);
        let areas = parse_feature_collection(&grid_geojson(side), &config.dataset).unwrap();
        Analysis::new(areas, config).unwrap()
    }

    #[test]
    fn queen_has_more_links_than_rook() {
        let queen = grid_analysis(5, Contiguity::Queen);
        let rook = grid_analysis(5, Contiguity::Rook);
        let (queen_summary, _) = queen.neighbours(false);
        let (rook_summary, lists) = rook.neighbours(true);

        assert_eq!(queen.units(), 25);
        assert_eq!(rook_summary.links, 80, "5x5 rook lattice has 40 shared edges");
        assert_eq!(queen_summary.links, 144);
        assert!(rook_summary.islands.is_empty());

        let lists = lists.unwrap();
        assert_eq!(lists[0].id, "c0");
        assert_eq!(lists[0].neighbours, vec!["c1".to_string(), "c5".to_string()]);
    }

    #[test]
    fn describe_covers_outcome_and_covariates() {
        let analysis = grid_analysis(5, Contiguity::Queen);
        let (summaries, correlations) = analysis.describe().unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "rate");
        assert_eq!(correlations.len(), 1);
        assert!(correlations[0].r > 0.5, "rate is driven by x");
    }

    #[test]
    fn moran_runs_both_nulls() {
        let analysis = grid_analysis(5, Contiguity::Rook);
        let (analytic, permutation) = analysis.moran("rate", &NullProgress).unwrap();
        let permutation = permutation.unwrap();

        assert_eq!(analytic.n, 25);
        assert_eq!(permutation.permutations, 99);
        assert!((analytic.statistic - permutation.statistic).abs() < 1e-12);
        assert!(permutation.p_value > 0.0 && permutation.p_value <= 1.0);
    }

    #[test]
    fn lag_pairs_values_with_neighbour_means() {
        let analysis = grid_analysis(3, Contiguity::Rook);
        let lagged = analysis.lag("x").unwrap();

        assert_eq!(lagged.len(), 9);
        // c0 neighbours c1 and c3.
        let expected = (lagged[1].value + lagged[3].value) / 2.0;
        assert!((lagged[0].lag - expected).abs() < 1e-12);
    }

    #[test]
    fn regression_reports_spatial_diagnostics() {
        let analysis = grid_analysis(6, Contiguity::Rook);
        let result = analysis.regress().unwrap();

        assert_eq!(result.model.coefficients.len(), 2);
        assert_eq!(result.lm_tests.tests.len(), 5);
        assert!(result.residual_moran.statistic > 0.0, "left-half effect is unmodelled");
    }

    #[test]
    fn intercept_only_regression_runs() {
        let mut config = test_config(Contiguity::Rook);
        config.dataset.covariates.clear();
        let areas = parse_feature_collection(&grid_geojson(6), &config.dataset).unwrap();
        let analysis = Analysis::new(areas, config).unwrap();

        let result = analysis.regress().unwrap();
        assert_eq!(result.model.coefficients.len(), 1);
        assert!(result.model.f_test.is_none());
        assert_eq!(result.lm_tests.tests.len(), 2);
        assert_eq!(result.lm_tests.undefined.len(), 3);
        assert!(result.residual_moran.variance > 0.0);

        let slx = analysis.slx().unwrap();
        assert!(slx.lagged_terms.is_empty());
        assert_eq!(slx.model.coefficients.len(), 1);
    }

    #[test]
    fn slx_adds_lag_terms() {
        let analysis = grid_analysis(6, Contiguity::Queen);
        let slx = analysis.slx().unwrap();

        assert_eq!(slx.lagged_terms.len(), 1);
        assert_eq!(slx.lagged_terms[0].lag_name, "lag.x");
        assert_eq!(slx.model.coefficients.len(), 3);
    }

    #[test]
    fn unknown_variable_is_reported() {
        let analysis = grid_analysis(3, Contiguity::Queen);
        let err = analysis.local_moran("nope").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Area(AreaError::UnknownColumn { .. })
        ));
    }
}
