//! Report assembly and text rendering.

use std::fmt::Write as _;

use crime_stats_analytics_models::{
    CorrelationTest, LocalMoranResult, MoranPermutationTest, MoranTest, VariableSummary,
};
use crime_stats_regression::{RegressionSummary, SlxSummary};
use crime_stats_spatial::NeighbourSummary;
use serde::Serialize;

use crate::analysis::{LaggedValue, NeighbourList, RegressionDiagnostics};

/// Everything a command produced. Sections a command did not run are
/// left out of the JSON output.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub input: String,
    pub units: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbours: Option<NeighbourSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbour_lists: Option<Vec<NeighbourList>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summaries: Option<Vec<VariableSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Vec<CorrelationTest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moran: Option<MoranTest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moran_permutation: Option<MoranPermutationTest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_moran: Option<LocalMoranResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag: Option<Vec<LaggedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regression: Option<RegressionDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slx: Option<SlxSummary>,
}

impl Report {
    #[must_use]
    pub fn new(input: String, units: usize) -> Self {
        Self {
            input,
            units,
            ..Self::default()
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text rendering, one block per section.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Input: {} ({} units)", self.input, self.units);

        if let Some(summary) = &self.neighbours {
            render_neighbours(&mut out, summary, self.neighbour_lists.as_deref());
        }
        if let Some(summaries) = &self.summaries {
            render_summaries(&mut out, summaries);
        }
        if let Some(correlations) = &self.correlations {
            render_correlations(&mut out, correlations);
        }
        if let Some(moran) = &self.moran {
            render_moran(&mut out, moran);
        }
        if let Some(permutation) = &self.moran_permutation {
            render_permutation(&mut out, permutation);
        }
        if let Some(local) = &self.local_moran {
            render_local(&mut out, local);
        }
        if let Some(lag) = &self.lag {
            heading(&mut out, "Spatial lag");
            let _ = writeln!(out, "{:<16} {:>12} {:>12}", "id", "value", "lag");
            for row in lag {
                let _ = writeln!(out, "{:<16} {:>12.4} {:>12.4}", row.id, row.value, row.lag);
            }
        }
        if let Some(regression) = &self.regression {
            render_regression(&mut out, "OLS regression", &regression.model);
            render_residual_diagnostics(&mut out, regression);
        }
        if let Some(slx) = &self.slx {
            render_regression(&mut out, "SLX regression", &slx.model);
            let excluded: Vec<&str> = slx
                .lagged_terms
                .iter()
                .filter(|t| t.degenerate)
                .map(|t| t.lag_name.as_str())
                .collect();
            if !excluded.is_empty() {
                let _ = writeln!(
                    out,
                    "Excluded constant lag columns: {}",
                    excluded.join(", ")
                );
            }
        }

        out
    }
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{}", "-".repeat(title.chars().count()));
}

fn render_neighbours(
    out: &mut String,
    summary: &NeighbourSummary,
    lists: Option<&[NeighbourList]>,
) {
    heading(out, "Neighbours");
    let _ = writeln!(out, "Units:       {}", summary.units);
    let _ = writeln!(out, "Links:       {}", summary.links);
    let _ = writeln!(
        out,
        "Links/unit:  {:.2} (min {}, max {})",
        summary.mean_links, summary.min_links, summary.max_links
    );
    if summary.islands.is_empty() {
        let _ = writeln!(out, "Islands:     none");
    } else {
        let _ = writeln!(
            out,
            "Islands:     {} ({})",
            summary.islands.len(),
            summary.islands.join(", ")
        );
    }
    for list in lists.unwrap_or_default() {
        let _ = writeln!(out, "  {}: {}", list.id, list.neighbours.join(" "));
    }
}

fn render_summaries(out: &mut String, summaries: &[VariableSummary]) {
    heading(out, "Descriptive statistics");
    let _ = writeln!(
        out,
        "{:<20} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "variable", "n", "mean", "sd", "min", "q1", "median", "q3", "max"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            s.name, s.n, s.mean, s.std_dev, s.min, s.q1, s.median, s.q3, s.max
        );
    }
}

fn render_correlations(out: &mut String, correlations: &[CorrelationTest]) {
    heading(out, "Correlations");
    for c in correlations {
        let _ = writeln!(
            out,
            "{} ~ {}: r = {:.4}, t = {:.3} on {} df, p = {:.4}",
            c.x, c.y, c.r, c.t_statistic, c.df, c.p_value
        );
    }
}

fn render_moran(out: &mut String, moran: &MoranTest) {
    heading(out, &format!("Global Moran's I: {}", moran.variable));
    let _ = writeln!(out, "I:           {:.6}", moran.statistic);
    let _ = writeln!(out, "E[I]:        {:.6}", moran.expectation);
    let _ = writeln!(out, "Var[I]:      {:.6}", moran.variance);
    let _ = writeln!(out, "z:           {:.4}", moran.z_score);
    let _ = writeln!(
        out,
        "p ({}, {}): {:.4}",
        moran.alternative, moran.assumption, moran.p_value
    );
    let _ = writeln!(out, "n:           {}", moran.n);
    let _ = writeln!(out, "=> {}", moran.interpretation.description());
}

fn render_permutation(out: &mut String, permutation: &MoranPermutationTest) {
    heading(
        out,
        &format!("Permutation test: {} draws", permutation.permutations),
    );
    let _ = writeln!(out, "Seed:        {}", permutation.seed);
    let _ = writeln!(
        out,
        "Simulated:   mean {:.6}, variance {:.6}",
        permutation.simulated_mean, permutation.simulated_variance
    );
    let _ = writeln!(out, "z:           {:.4}", permutation.z_score);
    let _ = writeln!(
        out,
        "Pseudo p ({}): {:.4}",
        permutation.alternative, permutation.p_value
    );
    let _ = writeln!(out, "=> {}", permutation.interpretation.description());
}

fn render_local(out: &mut String, local: &LocalMoranResult) {
    heading(
        out,
        &format!(
            "Local Moran's I: {} (alpha = {})",
            local.variable, local.significance
        ),
    );
    for count in &local.quadrant_counts {
        let _ = writeln!(out, "{:<16} {}", count.quadrant.as_ref(), count.count);
    }
    let _ = writeln!(
        out,
        "\n{:<16} {:>10} {:>10} {:>10}  cluster",
        "id", "Ii", "z", "p"
    );
    for unit in &local.units {
        let z = unit.z_score.map_or_else(|| "-".to_string(), |z| format!("{z:.3}"));
        let p = unit.p_value.map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
        let _ = writeln!(
            out,
            "{:<16} {:>10.4} {:>10} {:>10}  {}",
            unit.id, unit.statistic, z, p, unit.quadrant
        );
    }
}

fn render_regression(out: &mut String, title: &str, model: &RegressionSummary) {
    heading(out, title);
    let _ = writeln!(
        out,
        "{:<24} {:>12} {:>12} {:>10} {:>10}",
        "term", "estimate", "std.error", "t", "p"
    );
    for c in &model.coefficients {
        let _ = writeln!(
            out,
            "{:<24} {:>12.5} {:>12.5} {:>10.3} {:>10.4}",
            c.name, c.estimate, c.std_error, c.t_value, c.p_value
        );
    }
    let _ = writeln!(
        out,
        "\nn = {}, residual df = {}, RSS = {:.4}, sigma = {:.4}",
        model.nobs, model.df_residual, model.rss, model.residual_std_error
    );
    let _ = writeln!(
        out,
        "R² = {:.4}, adjusted R² = {:.4}, logLik = {:.3}, AIC = {:.3}",
        model.r_squared, model.adj_r_squared, model.log_likelihood, model.aic
    );
    if let Some(f) = &model.f_test {
        let _ = writeln!(
            out,
            "F = {:.3} on {} and {} df, p = {:.4}",
            f.statistic, f.df1, f.df2, f.p_value
        );
    }
}

fn render_residual_diagnostics(out: &mut String, regression: &RegressionDiagnostics) {
    let moran = &regression.residual_moran;
    heading(out, "Residual spatial diagnostics");
    let _ = writeln!(
        out,
        "Moran's I = {:.6}, E[I] = {:.6}, z = {:.4}, p ({}) = {:.4}",
        moran.statistic, moran.expectation, moran.z_score, moran.alternative, moran.p_value
    );
    let _ = writeln!(out, "{:<8} {:>12} {:>4} {:>10}", "test", "statistic", "df", "p");
    for test in &regression.lm_tests.tests {
        let _ = writeln!(
            out,
            "{:<8} {:>12.4} {:>4} {:>10.4}",
            test.kind, test.statistic, test.df, test.p_value
        );
    }
    for kind in &regression.lm_tests.undefined {
        let _ = writeln!(out, "{kind:<8} {:>12}", "undefined");
    }
    let _ = writeln!(
        out,
        "=> {} (alpha = {})",
        regression.lm_tests.advice.description(),
        regression.lm_tests.significance
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        Analysis,
        tests::{grid_analysis, grid_geojson, test_config},
    };
    use crime_stats_analytics_models::progress::NullProgress;
    use crime_stats_areas::load::parse_feature_collection;
    use crime_stats_spatial::Contiguity;

    fn full_report() -> Report {
        let analysis = grid_analysis(5, Contiguity::Queen);
        let mut report = Report::new("grid".to_string(), analysis.units());
        let (summary, lists) = analysis.neighbours(true);
        report.neighbours = Some(summary);
        report.neighbour_lists = lists;
        let (summaries, correlations) = analysis.describe().unwrap();
        report.summaries = Some(summaries);
        report.correlations = Some(correlations);
        let (moran, permutation) = analysis.moran("rate", &NullProgress).unwrap();
        report.moran = Some(moran);
        report.moran_permutation = permutation;
        report.local_moran = Some(analysis.local_moran("rate").unwrap());
        report.regression = Some(analysis.regress().unwrap());
        report.slx = Some(analysis.slx().unwrap());
        report
    }

    #[test]
    fn text_has_a_block_per_section() {
        let text = full_report().to_text();
        for heading in [
            "Neighbours",
            "Descriptive statistics",
            "Correlations",
            "Global Moran's I: rate",
            "Permutation test: 99 draws",
            "Local Moran's I: rate",
            "OLS regression",
            "Residual spatial diagnostics",
            "SLX regression",
        ] {
            assert!(text.contains(heading), "missing section {heading}");
        }
        assert!(text.contains("LMerr"));
        assert!(text.contains("SARMA"));
    }

    #[test]
    fn undefined_lm_tests_are_listed_by_name() {
        let mut config = test_config(Contiguity::Rook);
        config.dataset.covariates.clear();
        let areas = parse_feature_collection(&grid_geojson(6), &config.dataset).unwrap();
        let analysis = Analysis::new(areas, config).unwrap();
        let mut report = Report::new("grid".to_string(), analysis.units());
        report.regression = Some(analysis.regress().unwrap());

        let text = report.to_text();
        for kind in ["RLMerr", "RLMlag", "SARMA"] {
            let line = text.lines().find(|l| l.starts_with(kind)).unwrap();
            assert!(line.ends_with("undefined"), "{line}");
        }
    }

    #[test]
    fn json_omits_sections_that_did_not_run() {
        let report = Report::new("grid".to_string(), 4);
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["units"], 4);
        assert!(json.get("moran").is_none());

        let json: serde_json::Value =
            serde_json::from_str(&full_report().to_json().unwrap()).unwrap();
        assert!(json["moran"]["zScore"].is_number());
        assert_eq!(json["regression"]["lmTests"]["tests"][0]["kind"], "LMerr");
    }
}
