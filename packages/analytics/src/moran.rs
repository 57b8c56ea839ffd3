//! Global Moran's I.
//!
//! `I = (n / S0) · Σᵢⱼ wᵢⱼ zᵢ zⱼ / Σᵢ zᵢ²` with `z` the mean-centred
//! variable. Units without neighbours contribute nothing to the cross
//! product and are not counted in `n`.

use crime_stats_analytics_models::{
    Alternative, Autocorrelation, MomentAssumption, MoranPermutationTest, MoranTest,
    ResidualMoranTest, progress::ProgressCallback,
};
use crime_stats_regression::FittedModel;
use crime_stats_spatial::SpatialWeights;
use nalgebra::DMatrix;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{AnalyticsError, DEGENERATE_TOLERANCE, centre};

/// Options for the analytic test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoranOptions {
    pub alternative: Alternative,
    pub assumption: MomentAssumption,
    /// Level used to classify the result.
    pub significance: f64,
}

impl Default for MoranOptions {
    fn default() -> Self {
        Self {
            alternative: Alternative::default(),
            assumption: MomentAssumption::default(),
            significance: 0.05,
        }
    }
}

/// Options for the permutation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationOptions {
    pub permutations: usize,
    pub seed: u64,
    pub alternative: Alternative,
    pub significance: f64,
}

impl Default for PermutationOptions {
    fn default() -> Self {
        Self {
            permutations: 999,
            seed: 42,
            alternative: Alternative::default(),
            significance: 0.05,
        }
    }
}

/// Smallest number of connected units the moment formulas are defined for.
const MIN_UNITS: usize = 4;

/// Centred variable plus the constants shared by both global tests.
struct Prepared {
    z: Vec<f64>,
    zz: f64,
    n: usize,
    s0: f64,
}

impl Prepared {
    fn new(variable: &str, x: &[f64], weights: &SpatialWeights) -> Result<Self, AnalyticsError> {
        if x.len() != weights.len() {
            return Err(AnalyticsError::DimensionMismatch {
                expected: weights.len(),
                actual: x.len(),
            });
        }

        let n = weights.len() - weights.islands().len();
        if n < MIN_UNITS {
            return Err(AnalyticsError::InsufficientData {
                required: MIN_UNITS,
                actual: n,
            });
        }

        let s0 = weights.s0();
        if s0 <= 0.0 {
            return Err(AnalyticsError::EmptyWeights);
        }

        let (z, zz) = centre(variable, x)?;
        Ok(Self { z, zz, n, s0 })
    }

    #[allow(clippy::cast_precision_loss)]
    fn statistic(&self, z: &[f64], weights: &SpatialWeights) -> Result<f64, AnalyticsError> {
        let lag = weights.lag(z)?;
        let cross: f64 = z.iter().zip(&lag).map(|(a, b)| a * b).sum();
        Ok(self.n as f64 / self.s0 * cross / self.zz)
    }
}

/// Converts a standard normal deviate into a p-value.
pub(crate) fn normal_p_value(z: f64, alternative: Alternative) -> f64 {
    let Ok(normal) = Normal::new(0.0, 1.0) else {
        return f64::NAN;
    };
    match alternative {
        Alternative::Greater => normal.sf(z),
        Alternative::Less => normal.cdf(z),
        Alternative::TwoSided => (2.0 * normal.sf(z.abs())).min(1.0),
    }
}

/// Global Moran's I with analytic moments.
///
/// # Errors
///
/// * [`AnalyticsError::DimensionMismatch`] if `x` does not match the weights
/// * [`AnalyticsError::InsufficientData`] with fewer than four connected units
/// * [`AnalyticsError::EmptyWeights`] if no unit has a neighbour
/// * [`AnalyticsError::DegenerateVariance`] if `x` is constant or the null
///   variance is not positive
#[allow(clippy::cast_precision_loss)]
pub fn moran_test(
    variable: &str,
    x: &[f64],
    weights: &SpatialWeights,
    options: &MoranOptions,
) -> Result<MoranTest, AnalyticsError> {
    let prepared = Prepared::new(variable, x, weights)?;
    let statistic = prepared.statistic(&prepared.z, weights)?;

    let n = prepared.n as f64;
    let s0 = prepared.s0;
    let s1 = weights.s1();
    let s2 = weights.s2();
    let expectation = -1.0 / (n - 1.0);

    let variance = match options.assumption {
        MomentAssumption::Normality => {
            (n * n * s1 - n * s2 + 3.0 * s0 * s0) / ((n * n - 1.0) * s0 * s0)
                - expectation * expectation
        }
        MomentAssumption::Randomisation => {
            let z4: f64 = prepared.z.iter().map(|v| v.powi(4)).sum();
            let kurtosis = x.len() as f64 * z4 / (prepared.zz * prepared.zz);
            let numerator = n * ((n * n - 3.0 * n + 3.0) * s1 - n * s2 + 3.0 * s0 * s0)
                - kurtosis * ((n * n - n) * s1 - 2.0 * n * s2 + 6.0 * s0 * s0);
            numerator / ((n - 1.0) * (n - 2.0) * (n - 3.0) * s0 * s0) - expectation * expectation
        }
    };

    if !(variance.is_finite() && variance > 0.0) {
        return Err(AnalyticsError::DegenerateVariance {
            variable: variable.to_string(),
        });
    }

    let z_score = (statistic - expectation) / variance.sqrt();
    let p_value = normal_p_value(z_score, options.alternative);
    let interpretation =
        Autocorrelation::classify(statistic, expectation, p_value, options.significance);

    log::info!(
        "Moran's I for {variable}: I = {statistic:.4}, z = {z_score:.3}, \
         p = {p_value:.4} ({interpretation})"
    );

    Ok(MoranTest {
        variable: variable.to_string(),
        statistic,
        expectation,
        variance,
        z_score,
        p_value,
        alternative: options.alternative,
        assumption: options.assumption,
        n: prepared.n,
        interpretation,
    })
}

/// Global Moran's I against a seeded permutation null.
///
/// The observed values are shuffled across units `permutations` times;
/// the same seed always yields the same draws.
///
/// # Errors
///
/// Same conditions as [`moran_test`], plus
/// [`AnalyticsError::InvalidOption`] when `permutations` is zero.
#[allow(clippy::cast_precision_loss)]
pub fn moran_permutation_test(
    variable: &str,
    x: &[f64],
    weights: &SpatialWeights,
    options: &PermutationOptions,
    progress: &dyn ProgressCallback,
) -> Result<MoranPermutationTest, AnalyticsError> {
    if options.permutations == 0 {
        return Err(AnalyticsError::InvalidOption {
            message: "permutations must be at least 1".to_string(),
        });
    }

    let prepared = Prepared::new(variable, x, weights)?;
    let statistic = prepared.statistic(&prepared.z, weights)?;

    progress.set_total(options.permutations as u64);
    progress.set_message(format!("Permuting {variable}"));

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut shuffled = prepared.z.clone();
    let mut simulated = Vec::with_capacity(options.permutations);
    for _ in 0..options.permutations {
        shuffled.shuffle(&mut rng);
        simulated.push(prepared.statistic(&shuffled, weights)?);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let nsim = simulated.len() as f64;
    let greater = simulated.iter().filter(|&&s| s >= statistic).count() as f64;
    let less = simulated.iter().filter(|&&s| s <= statistic).count() as f64;
    let p_greater = (greater + 1.0) / (nsim + 1.0);
    let p_less = (less + 1.0) / (nsim + 1.0);
    let p_value = match options.alternative {
        Alternative::Greater => p_greater,
        Alternative::Less => p_less,
        Alternative::TwoSided => (2.0 * p_greater.min(p_less)).min(1.0),
    };

    let simulated_mean = simulated.iter().sum::<f64>() / nsim;
    let simulated_variance = if simulated.len() > 1 {
        simulated
            .iter()
            .map(|s| (s - simulated_mean).powi(2))
            .sum::<f64>()
            / (nsim - 1.0)
    } else {
        0.0
    };
    let z_score = if simulated_variance > 0.0 {
        (statistic - simulated_mean) / simulated_variance.sqrt()
    } else {
        0.0
    };
    let interpretation =
        Autocorrelation::classify(statistic, simulated_mean, p_value, options.significance);

    log::info!(
        "Permutation Moran's I for {variable}: I = {statistic:.4}, \
         pseudo p = {p_value:.4} over {} draws",
        options.permutations
    );

    Ok(MoranPermutationTest {
        variable: variable.to_string(),
        statistic,
        permutations: options.permutations,
        seed: options.seed,
        simulated_mean,
        simulated_variance,
        z_score,
        p_value,
        alternative: options.alternative,
        interpretation,
    })
}

/// Moran's I of OLS residuals, with moments conditional on the design.
///
/// `E[I] = −(n / S0) · tr(A) / (n − k)` and the variance from Cliff and
/// Ord, where `A = (X'X)⁻¹ X'UX` and `U = (W + W') / 2`.
///
/// # Errors
///
/// * [`AnalyticsError::DimensionMismatch`] if the model and weights differ
///   in size
/// * [`AnalyticsError::EmptyWeights`] if no unit has a neighbour
/// * [`AnalyticsError::DegenerateVariance`] for a perfect fit or a
///   non-positive variance
#[allow(clippy::cast_precision_loss, clippy::similar_names)]
pub fn residual_moran_test(
    model: &FittedModel,
    weights: &SpatialWeights,
    options: &MoranOptions,
) -> Result<ResidualMoranTest, AnalyticsError> {
    let n_obs = model.nobs();
    if n_obs != weights.len() {
        return Err(AnalyticsError::DimensionMismatch {
            expected: weights.len(),
            actual: n_obs,
        });
    }
    let s0 = weights.s0();
    if s0 <= 0.0 {
        return Err(AnalyticsError::EmptyWeights);
    }

    let residuals = model.residuals().as_slice();
    let ee: f64 = residuals.iter().map(|e| e * e).sum();
    let scale: f64 = model.response().iter().map(|v| v * v).sum();
    if ee <= DEGENERATE_TOLERANCE * scale || ee == 0.0 {
        return Err(AnalyticsError::DegenerateVariance {
            variable: "residuals".to_string(),
        });
    }

    let n = n_obs as f64;
    let k = model.n_params() as f64;
    let lag = weights.lag(residuals)?;
    let cross: f64 = residuals.iter().zip(&lag).map(|(a, b)| a * b).sum();
    let statistic = n / s0 * cross / ee;

    let x = model.design();
    let mut ux = DMatrix::zeros(x.nrows(), x.ncols());
    for j in 0..x.ncols() {
        let column: Vec<f64> = x.column(j).iter().copied().collect();
        let lagged = weights.symmetric_lag(&column)?;
        ux.column_mut(j).copy_from_slice(&lagged);
    }

    let xtx_inv = model.xtx_inv();
    let c1 = x.transpose() * &ux;
    let tr_a = (&c1 * xtx_inv).trace();
    let c3 = xtx_inv * &c1;
    let tr_a2 = (&c3 * &c3).trace();
    let tr_b = 4.0 * (xtx_inv * (ux.transpose() * &ux)).trace();

    let dof = n - k;
    let expectation = -(n * tr_a) / (dof * s0);
    let variance = (n * n / (s0 * s0 * dof * (dof + 2.0)))
        * (weights.s1() + 2.0 * tr_a2 - tr_b - 2.0 * tr_a * tr_a / dof);

    if !(variance.is_finite() && variance > 0.0) {
        return Err(AnalyticsError::DegenerateVariance {
            variable: "residuals".to_string(),
        });
    }

    let z_score = (statistic - expectation) / variance.sqrt();
    let p_value = normal_p_value(z_score, options.alternative);
    let interpretation =
        Autocorrelation::classify(statistic, expectation, p_value, options.significance);

    log::info!("Residual Moran's I = {statistic:.4}, z = {z_score:.3}, p = {p_value:.4}");

    Ok(ResidualMoranTest {
        statistic,
        expectation,
        variance,
        z_score,
        p_value,
        alternative: options.alternative,
        interpretation,
    })
}
