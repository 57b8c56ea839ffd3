//! Row-standardized spatial weights.
//!
//! Stored sparsely, one row per unit, aligned with the neighbour lists of
//! the [`Neighbours`] it was built from. Provides the spatial lag and the
//! weight moments (`S0`, `S1`, `S2`, traces) that Moran's I and the
//! Lagrange Multiplier tests need.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{Neighbours, SpatialError};

/// What to do with units that have no neighbours.
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
pub enum IslandPolicy {
    /// Leave the row empty (all zeros) and warn.
    #[default]
    ZeroFill,
    /// Refuse to build weights.
    Fail,
}

/// Sparse row-standardized weights matrix `W`.
///
/// Every non-island row sums to one. Island rows are empty, so their
/// spatial lag is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeights {
    ids: Vec<String>,
    neighbours: Vec<Vec<usize>>,
    weights: Vec<Vec<f64>>,
    islands: Vec<usize>,
}

impl SpatialWeights {
    /// Row-standardizes a neighbour relation: each neighbour of unit `i`
    /// gets weight `1 / |N(i)|`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Islands`] if any unit has no neighbours and
    /// `policy` is [`IslandPolicy::Fail`].
    pub fn row_standardized(
        neighbours: &Neighbours,
        policy: IslandPolicy,
    ) -> Result<Self, SpatialError> {
        let islands = neighbours.islands();
        if !islands.is_empty() {
            let ids: Vec<String> = islands
                .iter()
                .map(|&i| neighbours.ids()[i].clone())
                .collect();
            match policy {
                IslandPolicy::Fail => return Err(SpatialError::Islands { ids }),
                IslandPolicy::ZeroFill => log::warn!(
                    "Zero-filling weight rows for {} island(s): {}",
                    ids.len(),
                    ids.join(", ")
                ),
            }
        }

        let rows: Vec<Vec<usize>> = (0..neighbours.len())
            .map(|i| neighbours.neighbours(i).to_vec())
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let weights = rows
            .iter()
            .map(|row| {
                let w = 1.0 / row.len() as f64;
                vec![w; row.len()]
            })
            .collect();

        Ok(Self {
            ids: neighbours.ids().to_vec(),
            neighbours: rows,
            weights,
            islands,
        })
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Unit identifiers in row order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Indices of zero-filled rows.
    #[must_use]
    pub fn islands(&self) -> &[usize] {
        &self.islands
    }

    /// Identifiers of zero-filled rows.
    #[must_use]
    pub fn island_ids(&self) -> Vec<&str> {
        self.islands.iter().map(|&i| self.ids[i].as_str()).collect()
    }

    /// Column indices and weights of row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        (&self.neighbours[i], &self.weights[i])
    }

    /// Entry `w_ij` (zero when `j` is not a neighbour of `i`).
    #[must_use]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.neighbours[i]
            .binary_search(&j)
            .map_or(0.0, |k| self.weights[i][k])
    }

    /// Sum of row `i`.
    #[must_use]
    pub fn row_sum(&self, i: usize) -> f64 {
        self.weights[i].iter().sum()
    }

    fn check_len(&self, actual: usize) -> Result<(), SpatialError> {
        if actual == self.len() {
            Ok(())
        } else {
            Err(SpatialError::DimensionMismatch {
                expected: self.len(),
                actual,
            })
        }
    }

    /// Spatial lag `Wx`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DimensionMismatch`] if `x` is not one value
    /// per unit.
    pub fn lag(&self, x: &[f64]) -> Result<Vec<f64>, SpatialError> {
        self.check_len(x.len())?;

        Ok(self
            .neighbours
            .iter()
            .zip(&self.weights)
            .map(|(cols, ws)| cols.iter().zip(ws).map(|(&j, w)| w * x[j]).sum())
            .collect())
    }

    /// Transposed spatial lag `W'x`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DimensionMismatch`] if `x` is not one value
    /// per unit.
    pub fn transpose_lag(&self, x: &[f64]) -> Result<Vec<f64>, SpatialError> {
        self.check_len(x.len())?;

        let mut out = vec![0.0; self.len()];
        for (i, (cols, ws)) in self.neighbours.iter().zip(&self.weights).enumerate() {
            for (&j, w) in cols.iter().zip(ws) {
                out[j] += w * x[i];
            }
        }
        Ok(out)
    }

    /// Lag under the symmetrized weights `(W + W') / 2`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DimensionMismatch`] if `x` is not one value
    /// per unit.
    pub fn symmetric_lag(&self, x: &[f64]) -> Result<Vec<f64>, SpatialError> {
        let forward = self.lag(x)?;
        let backward = self.transpose_lag(x)?;
        Ok(forward
            .iter()
            .zip(&backward)
            .map(|(a, b)| 0.5 * (a + b))
            .collect())
    }

    /// `S0 = Σᵢⱼ wᵢⱼ`.
    #[must_use]
    pub fn s0(&self) -> f64 {
        self.weights.iter().flatten().sum()
    }

    /// `S1 = ½ Σᵢⱼ (wᵢⱼ + wⱼᵢ)²`.
    #[must_use]
    pub fn s1(&self) -> f64 {
        let mut total = 0.0;
        for (i, (cols, ws)) in self.neighbours.iter().zip(&self.weights).enumerate() {
            for (&j, &w) in cols.iter().zip(ws) {
                let sum = w + self.weight(j, i);
                total += sum * sum;
                // (j, i) has no stored entry, so its term is counted here.
                if self.neighbours[j].binary_search(&i).is_err() {
                    total += w * w;
                }
            }
        }
        0.5 * total
    }

    /// `S2 = Σᵢ (wᵢ. + w.ᵢ)²`.
    #[must_use]
    pub fn s2(&self) -> f64 {
        let mut col_sums = vec![0.0; self.len()];
        for (cols, ws) in self.neighbours.iter().zip(&self.weights) {
            for (&j, w) in cols.iter().zip(ws) {
                col_sums[j] += w;
            }
        }
        (0..self.len())
            .map(|i| {
                let s = self.row_sum(i) + col_sums[i];
                s * s
            })
            .sum()
    }

    /// `tr(W'W + WW) = Σᵢⱼ wᵢⱼ² + Σᵢⱼ wᵢⱼ wⱼᵢ`.
    #[must_use]
    pub fn trace_wtw_plus_ww(&self) -> f64 {
        let mut total = 0.0;
        for (i, (cols, ws)) in self.neighbours.iter().zip(&self.weights).enumerate() {
            for (&j, &w) in cols.iter().zip(ws) {
                total += w * w + w * self.weight(j, i);
            }
        }
        total
    }

    /// Sum of squared row-wise weights per unit, `Σⱼ wᵢⱼ²`.
    #[must_use]
    pub fn row_sum_of_squares(&self, i: usize) -> f64 {
        self.weights[i].iter().map(|w| w * w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Contiguity;
    use crate::contiguity::tests::grid_neighbours;

    const TOL: f64 = 1e-12;

    #[test]
    fn non_island_rows_sum_to_one() {
        let nb = grid_neighbours(3, 4, Contiguity::Queen);
        let w = SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap();
        for i in 0..w.len() {
            assert!((w.row_sum(i) - 1.0).abs() < TOL, "row {i} sums to {}", w.row_sum(i));
        }
        assert!((w.s0() - 12.0).abs() < TOL);
    }

    #[test]
    fn island_rows_are_zero_filled() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let nb = Neighbours::from_links(ids, &[vec![1], vec![0], vec![]]).unwrap();
        let w = SpatialWeights::row_standardized(&nb, IslandPolicy::ZeroFill).unwrap();

        assert_eq!(w.island_ids(), vec!["c"]);
        assert!(w.row_sum(2).abs() < TOL);
        assert!((w.row_sum(0) - 1.0).abs() < TOL);
        assert_eq!(w.lag(&[1.0, 2.0, 3.0]).unwrap(), vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn fail_policy_rejects_islands() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let nb = Neighbours::from_links(ids, &[vec![], vec![]]).unwrap();
        let err = SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap_err();
        assert!(matches!(err, SpatialError::Islands { ids } if ids.len() == 2));
    }

    #[test]
    fn lag_averages_neighbours() {
        // a - b - c path
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let nb = Neighbours::from_links(ids, &[vec![1], vec![0, 2], vec![1]]).unwrap();
        let w = SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap();

        assert_eq!(w.lag(&[3.0, 6.0, 9.0]).unwrap(), vec![6.0, 6.0, 6.0]);
        assert_eq!(w.transpose_lag(&[3.0, 6.0, 9.0]).unwrap(), vec![3.0, 12.0, 3.0]);
        assert!(matches!(
            w.lag(&[1.0]),
            Err(SpatialError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn moments_match_dense_computation() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let nb = Neighbours::from_links(ids, &[vec![1], vec![0, 2], vec![1]]).unwrap();
        let w = SpatialWeights::row_standardized(&nb, IslandPolicy::Fail).unwrap();

        let n = w.len();
        let mut s1 = 0.0;
        let mut tr = 0.0;
        let mut s2 = 0.0;
        for i in 0..n {
            let mut row = 0.0;
            let mut col = 0.0;
            for j in 0..n {
                let (wij, wji) = (w.weight(i, j), w.weight(j, i));
                s1 += (wij + wji).powi(2);
                tr += wij * wij + wij * wji;
                row += wij;
                col += wji;
            }
            s2 += (row + col).powi(2);
        }

        assert!((w.s1() - 0.5 * s1).abs() < TOL);
        assert!((w.s2() - s2).abs() < TOL);
        assert!((w.trace_wtw_plus_ww() - tr).abs() < TOL);
    }

    #[test]
    fn island_policy_parses_from_string() {
        assert_eq!("zero_fill".parse::<IslandPolicy>().unwrap(), IslandPolicy::ZeroFill);
        assert_eq!(IslandPolicy::Fail.to_string(), "fail");
    }
}
