#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial autocorrelation and specification diagnostics.
//!
//! Global Moran's I (analytic and permutation nulls), Moran's I of OLS
//! residuals, the Lagrange Multiplier family for lag and error
//! dependence, local Moran (LISA) cluster maps, and the plain descriptive
//! statistics used by the exploratory report.

pub mod exploratory;
pub mod local;
pub mod moran;

pub use exploratory::{correlation_table, describe, pearson};
pub use lm_tests::lm_diagnostics;
pub use local::local_moran;
pub use moran::{
    MoranOptions, PermutationOptions, moran_permutation_test, moran_test, residual_moran_test,
};

use crime_stats_regression::RegressionError;
use crime_stats_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur while computing a statistic.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The variable (or residual vector) has no variation, so the
    /// statistic is undefined.
    #[error("Variable '{variable}' has zero variance; the statistic is undefined")]
    DegenerateVariance {
        /// Name of the offending variable.
        variable: String,
    },

    /// Too few usable observations.
    #[error("Insufficient data: {actual} usable observations, need at least {required}")]
    InsufficientData {
        /// Minimum number of observations.
        required: usize,
        /// Observations available.
        actual: usize,
    },

    /// A vector does not match the number of units.
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The weights matrix has no links at all.
    #[error("Spatial weights contain no links")]
    EmptyWeights,

    /// An option value is out of range.
    #[error("Invalid option: {message}")]
    InvalidOption {
        /// Description of what went wrong.
        message: String,
    },

    /// Weights error.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// Regression error.
    #[error("Regression error: {0}")]
    Regression(#[from] RegressionError),
}

/// Relative size of `Σz²` below which a centred vector counts as constant.
pub(crate) const DEGENERATE_TOLERANCE: f64 = 1e-20;

/// Sum of squares of `values` about their mean, failing when the vector
/// is (numerically) constant.
pub(crate) fn centre(variable: &str, values: &[f64]) -> Result<(Vec<f64>, f64), AnalyticsError> {
    #[allow(clippy::cast_precision_loss)]
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let z: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let zz: f64 = z.iter().map(|v| v * v).sum();
    let scale: f64 = values.iter().map(|v| v * v).sum();

    if zz <= DEGENERATE_TOLERANCE * scale || zz == 0.0 || !zz.is_finite() {
        return Err(AnalyticsError::DegenerateVariance {
            variable: variable.to_string(),
        });
    }

    Ok((z, zz))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crime_stats_spatial::{IslandPolicy, Neighbours, SpatialWeights};
    use nalgebra::DMatrix;

    /// Row-standardized rook weights on a `rows x cols` lattice, cells in
    /// row-major order.
    pub fn rook_grid(rows: usize, cols: usize) -> SpatialWeights {
        let ids: Vec<String> = (0..rows * cols).map(|i| format!("c{i}")).collect();
        let links: Vec<Vec<usize>> = (0..rows * cols)
            .map(|i| {
                let (r, c) = (i / cols, i % cols);
                let mut row = Vec::new();
                if r > 0 {
                    row.push(i - cols);
                }
                if r + 1 < rows {
                    row.push(i + cols);
                }
                if c > 0 {
                    row.push(i - 1);
                }
                if c + 1 < cols {
                    row.push(i + 1);
                }
                row
            })
            .collect();
        let nb = Neighbours::from_links(ids, &links).unwrap();
        SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap()
    }

    /// 0/1 checkerboard over the same lattice.
    pub fn checkerboard(rows: usize, cols: usize) -> Vec<f64> {
        (0..rows * cols)
            .map(|i| ((i / cols + i % cols) % 2) as f64)
            .collect()
    }

    /// 1 on the left half of the lattice, 0 on the right.
    pub fn halves(rows: usize, cols: usize) -> Vec<f64> {
        (0..rows * cols)
            .map(|i| if i % cols < cols / 2 { 1.0 } else { 0.0 })
            .collect()
    }

    /// Row-standardized weights where every unit neighbours every other.
    pub fn complete_graph(n: usize) -> SpatialWeights {
        let ids: Vec<String> = (0..n).map(|i| format!("k{i}")).collect();
        let links: Vec<Vec<usize>> = (0..n)
            .map(|i| (0..n).filter(|&j| j != i).collect())
            .collect();
        let nb = Neighbours::from_links(ids, &links).unwrap();
        SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap()
    }

    /// `w` as a dense `n x n` matrix.
    pub fn dense(w: &SpatialWeights) -> DMatrix<f64> {
        DMatrix::from_fn(w.len(), w.len(), |i, j| w.weight(i, j))
    }
}
