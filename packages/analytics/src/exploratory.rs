//! Descriptive statistics and pairwise correlations.

use crime_stats_analytics_models::{CorrelationTest, VariableSummary};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::{AnalyticsError, centre};

/// Summarizes one variable: mean, sample standard deviation, and the
/// five-number summary (linear-interpolation quantiles).
///
/// # Errors
///
/// Returns [`AnalyticsError::InsufficientData`] for an empty input.
#[allow(clippy::cast_precision_loss)]
pub fn describe(name: &str, values: &[f64]) -> Result<VariableSummary, AnalyticsError> {
    if values.is_empty() {
        return Err(AnalyticsError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std_dev = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(VariableSummary {
        name: name.to_string(),
        n,
        mean,
        std_dev,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Pearson correlation between two variables with a two-sided t test.
///
/// # Errors
///
/// * [`AnalyticsError::DimensionMismatch`] for unequal lengths
/// * [`AnalyticsError::InsufficientData`] with fewer than three pairs
/// * [`AnalyticsError::DegenerateVariance`] if either variable is constant
#[allow(clippy::cast_precision_loss, clippy::similar_names)]
pub fn pearson(
    x_name: &str,
    x: &[f64],
    y_name: &str,
    y: &[f64],
) -> Result<CorrelationTest, AnalyticsError> {
    if x.len() != y.len() {
        return Err(AnalyticsError::DimensionMismatch {
            expected: x.len(),
            actual: y.len(),
        });
    }
    if x.len() < 3 {
        return Err(AnalyticsError::InsufficientData {
            required: 3,
            actual: x.len(),
        });
    }

    let (zx, sxx) = centre(x_name, x)?;
    let (zy, syy) = centre(y_name, y)?;
    let sxy: f64 = zx.iter().zip(&zy).map(|(a, b)| a * b).sum();
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);

    let df = x.len() - 2;
    let t_statistic = if (1.0 - r * r) > 0.0 {
        r * (df as f64 / (1.0 - r * r)).sqrt()
    } else {
        r.signum() * f64::INFINITY
    };
    let p_value = StudentsT::new(0.0, 1.0, df as f64)
        .map_or(f64::NAN, |t| (2.0 * t.sf(t_statistic.abs())).min(1.0));

    Ok(CorrelationTest {
        x: x_name.to_string(),
        y: y_name.to_string(),
        n: x.len(),
        r,
        t_statistic,
        df,
        p_value,
    })
}

/// Correlates the outcome with each covariate in turn.
///
/// # Errors
///
/// Any [`pearson`] error for a covariate.
pub fn correlation_table(
    outcome: &str,
    y: &[f64],
    covariates: &[(String, Vec<f64>)],
) -> Result<Vec<CorrelationTest>, AnalyticsError> {
    covariates
        .iter()
        .map(|(name, values)| pearson(outcome, y, name, values))
        .collect()
}
