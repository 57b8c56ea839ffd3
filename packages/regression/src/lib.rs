#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Linear regression of burglary rates on neighbourhood covariates.
//!
//! [`ols::fit_ols`] produces an immutable [`FittedModel`] that the spatial
//! diagnostics consume read-only. [`slx::fit_slx`] refits with every
//! covariate augmented by its spatial lag `Wx`.

pub mod design;
pub mod ols;
pub mod slx;

pub use design::{DesignMatrix, INTERCEPT};
pub use ols::{Coefficient, FTest, FittedModel, RegressionSummary, fit_ols};
pub use slx::{LaggedFit, LaggedTerm, SlxSummary, fit_slx};

use thiserror::Error;

/// Errors that can occur while fitting a regression.
#[derive(Debug, Error)]
pub enum RegressionError {
    /// Response and design differ in row count, or columns differ in length.
    #[error("Dimension mismatch: expected {expected} rows, got {actual}")]
    DimensionMismatch {
        /// Expected number of rows.
        expected: usize,
        /// Actual number of rows.
        actual: usize,
    },

    /// The design matrix is rank deficient.
    #[error("Singular design matrix: rank {rank} with {columns} columns")]
    Singular {
        /// Numerical rank.
        rank: usize,
        /// Number of columns.
        columns: usize,
    },

    /// Too few observations to estimate the residual variance.
    #[error("Insufficient data: {observations} observations for {parameters} parameters")]
    InsufficientData {
        /// Number of observations.
        observations: usize,
        /// Number of estimated coefficients.
        parameters: usize,
    },

    /// Two design columns share a name.
    #[error("Duplicate design column: {name}")]
    DuplicateColumn {
        /// The repeated column name.
        name: String,
    },

    /// A design column or the response contains NaN or infinity.
    #[error("Non-finite value in {column}")]
    NonFinite {
        /// Offending column (or `"response"`).
        column: String,
    },

    /// Spatial lag computation failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] crime_stats_spatial::SpatialError),
}
