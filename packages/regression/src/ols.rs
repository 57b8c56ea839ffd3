//! Ordinary least squares.
//!
//! Solves the normal equations through a Cholesky factorisation of `X'X`
//! after an SVD rank check, so rank-deficient designs fail loudly instead
//! of producing arbitrary coefficients.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

use crate::{DesignMatrix, RegressionError};

/// Singular values below this fraction of the largest one count as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// One row of a coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coefficient {
    /// Column name.
    pub name: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// t statistic.
    pub t_value: f64,
    /// Two-sided p-value on the residual degrees of freedom.
    pub p_value: f64,
}

/// Overall F test against the intercept-only model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FTest {
    /// F statistic.
    pub statistic: f64,
    /// Numerator degrees of freedom.
    pub df1: usize,
    /// Denominator degrees of freedom.
    pub df2: usize,
    /// Upper-tail p-value.
    pub p_value: f64,
}

/// Serializable summary of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionSummary {
    /// Number of observations.
    pub nobs: usize,
    /// Residual degrees of freedom.
    pub df_residual: usize,
    /// Coefficient table.
    pub coefficients: Vec<Coefficient>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Residual standard error.
    pub residual_std_error: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// R² adjusted for the number of parameters.
    pub adj_r_squared: f64,
    /// Overall F test, absent for models without regressors.
    pub f_test: Option<FTest>,
    /// Gaussian log-likelihood at the estimates.
    pub log_likelihood: f64,
    /// Akaike information criterion.
    pub aic: f64,
}

/// A fitted linear model. Immutable once produced by [`fit_ols`].
#[derive(Debug, Clone)]
pub struct FittedModel {
    names: Vec<String>,
    x: DMatrix<f64>,
    y: DVector<f64>,
    beta: DVector<f64>,
    coefficients: Vec<Coefficient>,
    fitted: DVector<f64>,
    residuals: DVector<f64>,
    xtx_inv: DMatrix<f64>,
    df_residual: usize,
    rss: f64,
    tss: f64,
    intercept: bool,
}

/// Fits `y = Xβ + ε` by least squares.
///
/// # Errors
///
/// Returns [`RegressionError::DimensionMismatch`] if `y` and the design
/// differ in length, [`RegressionError::NonFinite`] for a non-finite
/// response, [`RegressionError::InsufficientData`] when `n <= k` or the
/// design has no columns, or
/// [`RegressionError::Singular`] for a rank-deficient design.
pub fn fit_ols(y: &[f64], design: &DesignMatrix) -> Result<FittedModel, RegressionError> {
    let n = design.nrows();
    let k = design.ncols();
    if y.len() != n {
        return Err(RegressionError::DimensionMismatch {
            expected: n,
            actual: y.len(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFinite {
            column: "response".to_string(),
        });
    }
    if k == 0 || n <= k {
        return Err(RegressionError::InsufficientData {
            observations: n,
            parameters: k,
        });
    }

    let x = design.matrix().clone();
    let rank = numerical_rank(&x);
    if rank < k {
        return Err(RegressionError::Singular { rank, columns: k });
    }

    let xt = x.transpose();
    let xtx_inv = (&xt * &x)
        .cholesky()
        .ok_or(RegressionError::Singular { rank, columns: k })?
        .inverse();

    let y = DVector::from_column_slice(y);
    let beta = &xtx_inv * (&xt * &y);
    let fitted = &x * &beta;
    let residuals = &y - &fitted;

    let df_residual = n - k;
    let rss = residuals.norm_squared();
    let tss = if design.has_intercept() {
        let mean = y.mean();
        y.iter().map(|v| (v - mean).powi(2)).sum()
    } else {
        y.norm_squared()
    };

    #[allow(clippy::cast_precision_loss)]
    let sigma2 = rss / df_residual as f64;
    let coefficients = coefficient_table(design.names(), &beta, &xtx_inv, sigma2, df_residual);

    log::debug!("OLS fit: n={n}, k={k}, rss={rss:.6}");

    Ok(FittedModel {
        names: design.names().to_vec(),
        x,
        y,
        beta,
        coefficients,
        fitted,
        residuals,
        xtx_inv,
        df_residual,
        rss,
        tss,
        intercept: design.has_intercept(),
    })
}

fn numerical_rank(x: &DMatrix<f64>) -> usize {
    let singular_values = x.clone().svd(false, false).singular_values;
    let largest = singular_values.max();
    if largest <= 0.0 {
        return 0;
    }
    singular_values
        .iter()
        .filter(|&&s| s > RANK_TOLERANCE * largest)
        .count()
}

fn coefficient_table(
    names: &[String],
    beta: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    sigma2: f64,
    df_residual: usize,
) -> Vec<Coefficient> {
    #[allow(clippy::cast_precision_loss)]
    let t_dist = StudentsT::new(0.0, 1.0, df_residual as f64).ok();

    names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
            let t_value = estimate / std_error;
            let p_value = t_dist
                .as_ref()
                .map_or(f64::NAN, |t| 2.0 * t.sf(t_value.abs()));
            Coefficient {
                name: name.clone(),
                estimate,
                std_error,
                t_value,
                p_value,
            }
        })
        .collect()
}

impl FittedModel {
    /// Column names in coefficient order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The design matrix `X`.
    #[must_use]
    pub const fn design(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// The response `y`.
    #[must_use]
    pub const fn response(&self) -> &DVector<f64> {
        &self.y
    }

    /// Coefficient vector `β`.
    #[must_use]
    pub const fn beta(&self) -> &DVector<f64> {
        &self.beta
    }

    /// Coefficient table.
    #[must_use]
    pub fn coefficients(&self) -> &[Coefficient] {
        &self.coefficients
    }

    /// Coefficient row by column name.
    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Fitted values `Xβ`.
    #[must_use]
    pub const fn fitted_values(&self) -> &DVector<f64> {
        &self.fitted
    }

    /// Residuals `y − Xβ`.
    #[must_use]
    pub const fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    /// `(X'X)^-1`.
    #[must_use]
    pub const fn xtx_inv(&self) -> &DMatrix<f64> {
        &self.xtx_inv
    }

    /// Number of observations.
    #[must_use]
    pub fn nobs(&self) -> usize {
        self.x.nrows()
    }

    /// Number of estimated coefficients.
    #[must_use]
    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }

    /// Residual degrees of freedom `n − k`.
    #[must_use]
    pub const fn df_residual(&self) -> usize {
        self.df_residual
    }

    /// Residual sum of squares.
    #[must_use]
    pub const fn rss(&self) -> f64 {
        self.rss
    }

    /// Residual standard error `sqrt(RSS / (n − k))`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn residual_std_error(&self) -> f64 {
        (self.rss / self.df_residual as f64).sqrt()
    }

    /// Coefficient of determination (centred when an intercept is present).
    #[must_use]
    pub fn r_squared(&self) -> f64 {
        if self.tss > 0.0 {
            1.0 - self.rss / self.tss
        } else {
            0.0
        }
    }

    /// Adjusted R².
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn adj_r_squared(&self) -> f64 {
        let df_total = (self.nobs() - usize::from(self.intercept)) as f64;
        1.0 - (1.0 - self.r_squared()) * df_total / self.df_residual as f64
    }

    /// Overall F test; `None` when the model has no regressors.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn f_test(&self) -> Option<FTest> {
        let df1 = self.n_params() - usize::from(self.intercept);
        let df2 = self.df_residual;
        if df1 == 0 {
            return None;
        }
        let statistic = ((self.tss - self.rss) / df1 as f64) / (self.rss / df2 as f64);
        let p_value = FisherSnedecor::new(df1 as f64, df2 as f64)
            .map_or(f64::NAN, |f| f.sf(statistic));
        Some(FTest {
            statistic,
            df1,
            df2,
            p_value,
        })
    }

    /// Gaussian log-likelihood at the least-squares estimates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs() as f64;
        -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (self.rss / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting the error variance as a
    /// parameter.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * (self.n_params() + 1) as f64
    }

    /// Serializable summary.
    #[must_use]
    pub fn summary(&self) -> RegressionSummary {
        RegressionSummary {
            nobs: self.nobs(),
            df_residual: self.df_residual,
            coefficients: self.coefficients.clone(),
            rss: self.rss,
            residual_std_error: self.residual_std_error(),
            r_squared: self.r_squared(),
            adj_r_squared: self.adj_r_squared(),
            f_test: self.f_test(),
            log_likelihood: self.log_likelihood(),
            aic: self.aic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design(cols: &[(&str, &[f64])]) -> DesignMatrix {
        DesignMatrix::new(
            cols[0].1.len(),
            cols.iter()
                .map(|(name, values)| ((*name).to_string(), values.to_vec()))
                .collect(),
            true,
        )
        .unwrap()
    }

    #[test]
    fn recovers_exact_linear_relationship() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let model = fit_ols(&y, &design(&[("x", &x)])).unwrap();

        assert!((model.beta()[0] - 2.0).abs() < 1e-10);
        assert!((model.beta()[1] - 3.0).abs() < 1e-10);
        assert!(model.rss() < 1e-18);
        assert!((model.r_squared() - 1.0).abs() < 1e-12);
        assert_eq!(model.df_residual(), 3);
    }

    #[test]
    fn matches_hand_computed_fit() {
        // y = [1, 3, 2, 5]; x = [1, 2, 3, 4] => slope 1.1, intercept 0.0
        let model =
            fit_ols(&[1.0, 3.0, 2.0, 5.0], &design(&[("x", &[1.0, 2.0, 3.0, 4.0])])).unwrap();

        let intercept = model.coefficient(crate::INTERCEPT).unwrap();
        let slope = model.coefficient("x").unwrap();
        assert!(intercept.estimate.abs() < 1e-10);
        assert!((slope.estimate - 1.1).abs() < 1e-10);

        // rss = 0.01 + 0.64 + 1.69 + 0.36 = 2.7; tss = 8.75
        assert!((model.rss() - 2.7).abs() < 1e-10);
        assert!((model.r_squared() - (1.0 - 2.7 / 8.75)).abs() < 1e-10);

        // se(slope) = sqrt(1.35 / 5)
        assert!((slope.std_error - (1.35_f64 / 5.0).sqrt()).abs() < 1e-10);
        assert!(slope.p_value > 0.0 && slope.p_value < 1.0);

        let f = model.f_test().unwrap();
        assert_eq!((f.df1, f.df2), (1, 2));
        assert!((f.statistic - slope.t_value.powi(2)).abs() < 1e-8);
    }

    #[test]
    fn residuals_are_orthogonal_to_design() {
        let x1 = [1.0, 4.0, 2.0, 8.0, 5.0, 7.0];
        let x2 = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0];
        let y = [2.0, 7.0, 1.0, 8.0, 2.0, 8.0];
        let model = fit_ols(&y, &design(&[("x1", &x1), ("x2", &x2)])).unwrap();

        let xte = model.design().transpose() * model.residuals();
        assert!(xte.iter().all(|v| v.abs() < 1e-9), "X'e = {xte}");
    }

    #[test]
    fn collinear_columns_are_singular() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let doubled = [2.0, 4.0, 6.0, 8.0];
        let err =
            fit_ols(&[1.0, 2.0, 2.0, 3.0], &design(&[("x", &x), ("x2", &doubled)])).unwrap_err();
        assert!(matches!(err, RegressionError::Singular { rank: 2, columns: 3 }));
    }

    #[test]
    fn intercept_only_fit_estimates_the_mean() {
        let d = DesignMatrix::new(4, vec![], true).unwrap();
        let model = fit_ols(&[1.0, 2.0, 3.0, 4.0], &d).unwrap();

        assert!((model.beta()[0] - 2.5).abs() < 1e-12);
        assert!((model.rss() - 5.0).abs() < 1e-12);
        assert_eq!(model.df_residual(), 3);
        assert!(model.r_squared().abs() < 1e-12);
        assert!(model.f_test().is_none());
    }

    #[test]
    fn empty_design_is_an_error() {
        let d = DesignMatrix::new(3, vec![], false).unwrap();
        let err = fit_ols(&[1.0, 2.0, 3.0], &d).unwrap_err();
        assert!(matches!(
            err,
            RegressionError::InsufficientData {
                observations: 3,
                parameters: 0
            }
        ));
    }

    #[test]
    fn too_few_observations_is_an_error() {
        let err = fit_ols(&[1.0, 2.0], &design(&[("x", &[1.0, 2.0])])).unwrap_err();
        assert!(matches!(err, RegressionError::InsufficientData { .. }));
    }

    #[test]
    fn response_length_must_match() {
        let err = fit_ols(&[1.0, 2.0], &design(&[("x", &[1.0, 2.0, 3.0])])).unwrap_err();
        assert!(matches!(err, RegressionError::DimensionMismatch { expected: 3, actual: 2 }));
    }
}
