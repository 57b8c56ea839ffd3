//! Spatially-lagged-exogenous (SLX) regression.
//!
//! Each covariate `x` is joined by its spatial lag `Wx` and the augmented
//! design is fit by OLS. This is not the simultaneous lag-of-outcome model;
//! no likelihood iteration is involved.
//!
//! Lag columns with no variation (e.g. all zero under an empty weights
//! matrix) cannot be separated from the intercept. They are flagged and
//! left out, and their coefficients are reported as undefined. Under a
//! complete graph the row-standardized lag `(Σx − x) / (n − 1)` is affine
//! in `x` rather than constant, so it is kept and the augmented design
//! fails as [`RegressionError::Singular`].

use crime_stats_spatial::SpatialWeights;
use serde::Serialize;

use crate::{Coefficient, DesignMatrix, FittedModel, RegressionError, RegressionSummary, fit_ols};

/// Relative spread below which a lag column is treated as constant.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// Prefix of lagged column names.
const LAG_PREFIX: &str = "lag.";

/// A covariate and its lagged counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaggedTerm {
    /// Covariate name.
    pub variable: String,
    /// Name of the lagged column (`lag.<variable>`).
    pub lag_name: String,
    /// Whether the lag column had zero variance and was excluded.
    pub degenerate: bool,
}

/// Result of [`fit_slx`].
#[derive(Debug, Clone)]
pub struct LaggedFit {
    model: FittedModel,
    terms: Vec<LaggedTerm>,
}

/// Serializable SLX summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlxSummary {
    /// Summary of the OLS fit on the augmented design.
    pub model: RegressionSummary,
    /// Lag terms, including excluded ones.
    pub lagged_terms: Vec<LaggedTerm>,
}

/// Fits `y = Xβ + WXθ + ε` by least squares.
///
/// # Errors
///
/// Returns [`RegressionError::Spatial`] if the weights do not cover the
/// design rows, or any [`fit_ols`] error for the augmented design
/// (notably [`RegressionError::Singular`]).
pub fn fit_slx(
    y: &[f64],
    design: &DesignMatrix,
    weights: &SpatialWeights,
) -> Result<LaggedFit, RegressionError> {
    let mut terms = Vec::new();
    let mut extra = Vec::new();

    for j in design.regressor_indices() {
        let variable = design.names()[j].clone();
        let lag_name = format!("{LAG_PREFIX}{variable}");
        let lagged = weights.lag(&design.column(j))?;

        let degenerate = is_constant(&lagged);
        if degenerate {
            log::warn!("Lag column {lag_name} has zero variance; excluding it from the SLX fit");
        } else {
            extra.push((lag_name.clone(), lagged));
        }
        terms.push(LaggedTerm {
            variable,
            lag_name,
            degenerate,
        });
    }

    let augmented = design.with_columns(extra)?;
    let model = fit_ols(y, &augmented)?;
    log::info!(
        "SLX fit: {} direct and {} lagged terms, R² = {:.4}",
        terms.len(),
        terms.iter().filter(|t| !t.degenerate).count(),
        model.r_squared()
    );

    Ok(LaggedFit { model, terms })
}

fn is_constant(values: &[f64]) -> bool {
    if values.is_empty() {
        return true;
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = min.abs().max(max.abs()).max(1.0);
    max - min <= DEGENERATE_TOLERANCE * scale
}

impl LaggedFit {
    /// The underlying OLS fit on the augmented design.
    #[must_use]
    pub const fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Lag terms in covariate order.
    #[must_use]
    pub fn terms(&self) -> &[LaggedTerm] {
        &self.terms
    }

    /// Coefficient of the direct (unlagged) term.
    #[must_use]
    pub fn direct(&self, variable: &str) -> Option<&Coefficient> {
        self.model.coefficient(variable)
    }

    /// Coefficient of the lagged term; `None` when the lag was degenerate.
    #[must_use]
    pub fn lagged(&self, variable: &str) -> Option<&Coefficient> {
        self.model.coefficient(&format!("{LAG_PREFIX}{variable}"))
    }

    /// Names of covariates whose lag was excluded.
    #[must_use]
    pub fn degenerate_lags(&self) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|t| t.degenerate)
            .map(|t| t.variable.as_str())
            .collect()
    }

    /// Residual sum of squares.
    #[must_use]
    pub const fn rss(&self) -> f64 {
        self.model.rss()
    }

    /// Coefficient of determination.
    #[must_use]
    pub fn r_squared(&self) -> f64 {
        self.model.r_squared()
    }

    /// Serializable summary.
    #[must_use]
    pub fn summary(&self) -> SlxSummary {
        SlxSummary {
            model: self.model.summary(),
            lagged_terms: self.terms.clone(),
        }
    }
}
