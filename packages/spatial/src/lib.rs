#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Polygon contiguity and spatial weights for areal units.
//!
//! Builds queen or rook neighbour relations from shared polygon boundaries
//! (R-tree envelope pruning, then exact segment intersection), and turns
//! them into row-standardized sparse weights used by every spatial
//! statistic downstream.

pub mod contiguity;
pub mod weights;

pub use contiguity::{Contiguity, ContiguityOptions, NeighbourSummary, Neighbours, build_contiguity};
pub use weights::{IslandPolicy, SpatialWeights};

use thiserror::Error;

/// Errors that can occur while building neighbours or weights.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Two inputs that must be indexed by the same units differ in length.
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch {
        /// Number of units in the weights or identifier list.
        expected: usize,
        /// Length of the offending input.
        actual: usize,
    },

    /// A neighbour link refers to a unit that does not exist.
    #[error("Invalid neighbour link {from} -> {to} for {len} units")]
    InvalidLink {
        /// Source unit index.
        from: usize,
        /// Target unit index.
        to: usize,
        /// Number of units.
        len: usize,
    },

    /// Units without neighbours were found under the fail-fast island policy.
    #[error("{} unit(s) have no neighbours: {}", ids.len(), ids.join(", "))]
    Islands {
        /// Identifiers of the isolated units.
        ids: Vec<String>,
    },

    /// An option value is out of range.
    #[error("Invalid option: {message}")]
    InvalidOption {
        /// Description of what went wrong.
        message: String,
    },
}
